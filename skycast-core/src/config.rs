use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{model::Coordinates, provider::ProviderId};

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,

    /// Overrides [`ProviderId::default_timeout`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Stand-in for the device's position sensor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub allow_location: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl DeviceConfig {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Example TOML:
    /// [providers.openweather]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Location of the SQLite database. Defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub device: DeviceConfig,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "skycast", "skycast")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the weather database: the configured one, else `weather.db` in the data dir.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("weather.db")),
        }
    }

    /// Set or replace a provider API key, keeping any timeout override.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers
            .entry(provider_id.as_str().to_string())
            .and_modify(|cfg| cfg.api_key = api_key.clone())
            .or_insert(ProviderConfig { api_key, timeout_secs: None });
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers.get(provider_id.as_str()).map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        !provider_id.requires_api_key() || !self.effective_api_key(provider_id).is_empty()
    }

    /// Key actually handed to a provider: the configured one, else a key baked in at build
    /// time, else empty (the provider is then skipped).
    pub fn effective_api_key(&self, provider_id: ProviderId) -> String {
        let configured = self
            .provider_api_key(provider_id)
            .map(str::trim)
            .filter(|key| !key.is_empty());

        if let Some(key) = configured {
            return key.to_string();
        }

        build_time_key(provider_id).unwrap_or_default().to_string()
    }

    pub fn request_timeout(&self, provider_id: ProviderId) -> Duration {
        self.providers
            .get(provider_id.as_str())
            .and_then(|cfg| cfg.timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| provider_id.default_timeout())
    }
}

fn build_time_key(provider_id: ProviderId) -> Option<&'static str> {
    match provider_id {
        ProviderId::OpenMeteo => None,
        ProviderId::WeatherApi => option_env!("SKYCAST_WEATHERAPI_KEY"),
        ProviderId::OpenWeather => option_env!("SKYCAST_OPENWEATHER_KEY"),
    }
}
