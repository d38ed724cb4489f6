//! Application composition root.
//!
//! Builds the store, network data source, and repository from configuration
//! and owns their lifecycles. Everything downstream receives these by
//! reference; nothing here is a global.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};

use solcast_core::{Config, Units as ConfigUnits};
use solcast_data::{
    ForecastEndpoint, ForecastRepository, ForecastStore, SyncSchedule, Units,
    WeatherNetworkDataSource,
};

const DB_FILE: &str = "forecast.db";

pub struct AppContext {
    pub repository: Arc<ForecastRepository>,
    pub network: Arc<WeatherNetworkDataSource>,
}

impl AppContext {
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("Failed to create data directory: {}", config.data_dir.display())
        })?;

        let store = Arc::new(
            ForecastStore::open(config.data_dir.join(DB_FILE))
                .context("Failed to open forecast store")?,
        );

        let network = Arc::new(
            WeatherNetworkDataSource::new(endpoint_from(config))
                .context("Failed to build forecast HTTP client")?,
        );

        let schedule = SyncSchedule {
            interval: Duration::from_secs(config.sync.interval_hours * 60 * 60),
            flex: Duration::from_secs(config.sync.flex_hours * 60 * 60),
            ..SyncSchedule::default()
        };

        let repository = ForecastRepository::new(store, Arc::clone(&network), schedule);

        Ok(Self { repository, network })
    }
}

fn endpoint_from(config: &Config) -> ForecastEndpoint {
    ForecastEndpoint {
        base_url: config.api.base_url.clone(),
        location: config.api.location.clone(),
        units: match config.api.units {
            ConfigUnits::Metric => Units::Metric,
            ConfigUnits::Imperial => Units::Imperial,
        },
        api_key: config.api.api_key.clone(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn endpoint_carries_config_values() {
        let mut config = Config::default();
        config.api.location = "Oslo,NO".to_string();
        config.api.units = ConfigUnits::Imperial;
        config.api.api_key = Some("key".to_string());

        let endpoint = endpoint_from(&config);
        assert_eq!(endpoint.location, "Oslo,NO");
        assert_eq!(endpoint.units, Units::Imperial);
        assert_eq!(endpoint.api_key.as_deref(), Some("key"));
    }
}
