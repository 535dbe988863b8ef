use anyhow::Context;
use quota_monitor::api::{ApiServer, ApiServerConfig};
use quota_monitor::config::AppConfig;
use quota_monitor::services::ServiceContainer;
use quota_monitor::{database, logging, utils};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let (logging_config, _log_guard) = logging::init_logging(&config.log_dir)?;

    utils::fs::ensure_sqlite_parent_dir(&config.database_url)?;
    let pool = database::init_pool(&config.database_url).await?;
    let write_pool = database::init_write_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    let container = ServiceContainer::new(config.clone(), pool, write_pool)?;
    logging_config.start_retention_cleanup(container.cancellation_token());

    let scheduler = container.start_scheduler();
    tracing::info!(schedule = %config.refresh_schedule, "quota-monitor initialized");

    let server = ApiServer::with_state(
        ApiServerConfig::from_app_config(&config),
        container
            .app_state()
            .with_logging_config(logging_config.clone()),
    );
    let server_token = server.cancel_token();
    let signal_task = tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received");
        server_token.cancel();
    });

    let result = server.run().await;
    signal_task.abort();

    container.shutdown();
    scheduler.stop_and_wait().await;
    result?;

    tracing::info!("quota-monitor stopped");
    Ok(())
}
