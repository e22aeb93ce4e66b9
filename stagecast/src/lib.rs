//! Live broadcast session orchestration.
//!
//! Drives the broadcast lifecycle (`Scheduled -> Live <-> Paused -> Ended`)
//! from ingest webhooks and operator commands, and supervises the ffmpeg
//! subprocesses behind composition, recording, audio mixing and thumbnails.

pub mod api;
pub mod composition;
pub mod config;
pub mod database;
pub mod domain;
pub mod encoding;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod mixer;
pub mod notification;
pub mod orchestrator;
pub mod recording;
pub mod services;
pub mod storage;
pub mod testing;
pub mod thumbnail;

pub use error::{Error, Result};
