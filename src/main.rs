use property_core::config::Settings;
use property_core::core::{ExportPipeline, ExportTarget};
use property_core::services::{ConnectionManager, ObjectStore, PropertyRepository, S3Store};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load()?;

    // Initialize logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if settings.logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }

    info!("Starting property export (schema: {})", settings.database.schema);

    let store = S3Store::new(&settings.bucket)?;
    if settings.bucket.verify_on_startup {
        store.ensure_bucket().await?;
    }

    let connection = Arc::new(ConnectionManager::connect_lazy(
        &settings.database,
        settings.retry.policy(),
    )?);
    let repository = PropertyRepository::new(Arc::clone(&connection), settings.database.schema_name()?);

    let pipeline = ExportPipeline::new(
        repository,
        Arc::new(store),
        &settings.export,
        settings.bucket.url_expires_in_secs,
    );

    let result = pipeline.export(ExportTarget::Dated).await;

    if let Err(e) = connection.close().await {
        error!("Failed to close database connection: {}", e);
    }

    match result? {
        Some(url) => info!("Export available at {}", url),
        None => info!("Nothing to export"),
    }

    Ok(())
}
