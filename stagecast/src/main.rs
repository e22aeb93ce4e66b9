use stagecast::api::{ApiServer, ApiServerConfig, AppState};
use stagecast::config::AppConfig;
use stagecast::services::ServiceContainer;
use stagecast::{database, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before anything reads them
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env_or_default();

    // Initialize logging; keep the guard alive for the process lifetime
    let (logging_config, _guard) = logging::init_logging(&config.log_dir)?;

    // Initialize database
    let pool = database::init_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    // Wire services
    let container = ServiceContainer::new(pool.clone(), config);
    container.start_background_tasks();
    logging_config.start_retention_cleanup(container.cancellation_token());

    // API server
    let api_config = ApiServerConfig::from_env_or_default();
    let state = AppState::new(
        container.orchestrator.clone(),
        container.config.clone(),
        pool,
    )
    .with_logging_config(logging_config);
    let server = ApiServer::new(api_config, state);
    let server_cancel = server.cancel_token();

    // Shut the server down on Ctrl-C
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            server_cancel.cancel();
        }
    });

    server.run().await?;

    // Server is down; stop subprocesses and close the pool
    container.shutdown().await?;

    Ok(())
}
