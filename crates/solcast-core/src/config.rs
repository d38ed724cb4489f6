use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use url::Url;

/// Default forecast API base URL (OpenWeatherMap-compatible).
pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

const DEFAULT_LOCATION: &str = "London,UK";
const DEFAULT_SYNC_INTERVAL_HOURS: u64 = 3;
const DEFAULT_SYNC_FLEX_HOURS: u64 = 1;

/// Unit system sent to the forecast API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

/// Forecast API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the forecast endpoint.
    pub base_url: String,

    /// Location query, e.g. "London,UK".
    pub location: String,

    #[serde(default)]
    pub units: Units,

    /// Optional API key appended to each request.
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            units: Units::default(),
            api_key: None,
        }
    }
}

/// Background sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Hours between scheduled background fetches.
    pub interval_hours: u64,

    /// Extra delivery window after the interval; a fetch landing anywhere in
    /// `[interval, interval + flex]` is on time.
    pub flex_hours: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_hours: DEFAULT_SYNC_INTERVAL_HOURS,
            flex_hours: DEFAULT_SYNC_FLEX_HOURS,
        }
    }
}

/// Top-level configuration stored on disk as TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the forecast database.
    pub data_dir: PathBuf,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub sync: SyncConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api: ApiConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults if no file exists yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "solcast", "solcast")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Check the configuration for values the sync core cannot work with.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api.base_url))?;

        if self.api.location.trim().is_empty() {
            return Err(anyhow!("Location must not be empty"));
        }

        if self.sync.interval_hours == 0 {
            return Err(anyhow!("Sync interval must be at least one hour"));
        }

        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("dev", "solcast", "solcast")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".solcast"))
}
