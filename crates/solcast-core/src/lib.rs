//! Application core for solcast: configuration and bootstrap.

pub mod config;

pub use config::{ApiConfig, Config, SyncConfig, Units};

use anyhow::Result;

/// Initialize logging for the application.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("solcast core initialized");
    Ok(())
}
