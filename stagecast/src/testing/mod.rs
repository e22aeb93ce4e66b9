//! Test doubles shared by unit and integration tests.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use process_supervisor::{ExitInfo, Launcher, SpawnSpec, Supervised};

/// Behavior of children produced by a [`FakeLauncher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehavior {
    /// Runs until asked to quit, then exits 0.
    RunUntilQuit,
    /// Exits 0 as soon as it is waited on (short-lived jobs like encodes).
    ExitImmediately,
    /// Ignores quit; only a kill ends it.
    IgnoreQuit,
    /// Exits with the given code as soon as it is waited on.
    ExitWith(i32),
}

/// In-memory stand-in for a spawned subprocess.
pub struct FakeChild {
    behavior: FakeBehavior,
    quit_requested: Arc<AtomicBool>,
    killed: Arc<AtomicBool>,
    exit: Option<ExitInfo>,
}

#[async_trait]
impl Supervised for FakeChild {
    fn id(&self) -> Option<u32> {
        Some(7777)
    }

    async fn signal_quit(&mut self) -> io::Result<()> {
        self.quit_requested.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitInfo>> {
        if self.exit.is_none() {
            if self.killed.load(Ordering::SeqCst) {
                self.exit = Some(ExitInfo { code: None });
            } else {
                match self.behavior {
                    FakeBehavior::ExitImmediately => {
                        self.exit = Some(ExitInfo { code: Some(0) });
                    }
                    FakeBehavior::ExitWith(code) => {
                        self.exit = Some(ExitInfo { code: Some(code) });
                    }
                    FakeBehavior::RunUntilQuit => {
                        if self.quit_requested.load(Ordering::SeqCst) {
                            self.exit = Some(ExitInfo { code: Some(0) });
                        }
                    }
                    FakeBehavior::IgnoreQuit => {}
                }
            }
        }
        Ok(self.exit)
    }

    async fn wait(&mut self) -> io::Result<ExitInfo> {
        loop {
            if let Some(exit) = self.try_wait()? {
                return Ok(exit);
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    async fn kill(&mut self) -> io::Result<()> {
        self.killed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Launcher that records every spawn and returns in-memory children.
pub struct FakeLauncher {
    behavior: FakeBehavior,
    spawned: Mutex<Vec<SpawnSpec>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::with_behavior(FakeBehavior::RunUntilQuit)
    }

    pub fn with_behavior(behavior: FakeBehavior) -> Self {
        Self {
            behavior,
            spawned: Mutex::new(Vec::new()),
        }
    }

    /// Every spec launched so far, in order.
    pub fn spawned(&self) -> Vec<SpawnSpec> {
        self.spawned.lock().clone()
    }

    pub fn spawn_count(&self) -> usize {
        self.spawned.lock().len()
    }
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self, spec: &SpawnSpec) -> process_supervisor::Result<Box<dyn Supervised>> {
        self.spawned.lock().push(spec.clone());
        Ok(Box::new(FakeChild {
            behavior: self.behavior,
            quit_requested: Arc::new(AtomicBool::new(false)),
            killed: Arc::new(AtomicBool::new(false)),
            exit: None,
        }))
    }
}
