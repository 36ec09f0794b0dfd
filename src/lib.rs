pub mod commands;
pub mod error;
pub mod models;
pub mod services;

use commands::DetectionService;
use error::ConfigError;
use models::config::{DetectorConfig, LoggingConfig};
use services::detector::Detector;
use services::store::{BroadcastHub, JsonlStore, PersistAndBroadcast};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Only the first call
/// has an effect.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::debug!(level = %config.level, json = config.json, "logging initialised");
    }
}

/// Wire the JSONL store, broadcast hub and detector together.
///
/// Builds a blocking HTTP client when the HTTP engine is configured, so call
/// this outside of an async context.
pub fn build_service(config: &DetectorConfig) -> Result<DetectionService, ConfigError> {
    let path = match &config.storage.path {
        Some(path) => path.clone(),
        None => JsonlStore::default_path().ok_or(ConfigError::NoPlatformDir("data"))?,
    };

    let hub = BroadcastHub::default();
    let sink = Arc::new(PersistAndBroadcast::new(JsonlStore::open(&path)?, hub.clone()));
    let detector = Detector::from_config(config, sink.clone())?;

    tracing::info!(store = %path.display(), regions = detector.regions().len(), "detection service ready");

    Ok(DetectionService::new(Arc::new(detector), sink, hub))
}
