use hive_updater::config::AppConfig;
use hive_updater::logging;
use hive_updater::services::ServiceContainer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    let (logging_config, _guard) = logging::init_logging(config.log_dir.as_deref())?;

    let container = ServiceContainer::new(config).await?;
    logging_config.start_retention_cleanup(container.cancellation_token());
    container.start().await?;

    tracing::info!("hive-updater running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    container.shutdown().await?;
    Ok(())
}
