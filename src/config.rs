//! Weather panel configuration
//!
//! Settings are read from a TOML file (`config.toml` in the platform config
//! directory unless `--config` points elsewhere). Every field has a default, so
//! a missing file or a partial file is fine. Command-line flags are applied on
//! top by [`crate::cli::StartupConfig`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML for this schema
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Coordinates are outside the valid range
    #[error("Invalid coordinates: latitude must be -90 to 90, longitude must be -180 to 180")]
    InvalidCoordinates,
}

/// Settings for the weather subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Provider base URL, without a trailing endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Provider API key (`appid`)
    #[serde(default)]
    pub api_key: String,

    /// Farm latitude
    #[serde(default = "default_latitude")]
    pub latitude: f64,

    /// Farm longitude
    #[serde(default = "default_longitude")]
    pub longitude: f64,

    /// HTTP timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum cache age before a remote re-fetch, in minutes
    #[serde(default = "default_freshness_minutes")]
    pub freshness_minutes: u64,

    /// Background refresh period, in minutes
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u64,

    /// Whether the background refresh runs at all
    #[serde(default = "default_true")]
    pub refresh_enabled: bool,

    /// Whether successful fetches are written to the record store
    #[serde(default = "default_true")]
    pub persist_snapshots: bool,

    /// Location of the JSON record store; platform data dir when unset
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

fn default_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

// Des Moines, Iowa
const fn default_latitude() -> f64 {
    41.5868
}

const fn default_longitude() -> f64 {
    -93.625
}

const fn default_timeout() -> u64 {
    10
}

const fn default_freshness_minutes() -> u64 {
    15
}

const fn default_refresh_minutes() -> u64 {
    15
}

const fn default_true() -> bool {
    true
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            latitude: default_latitude(),
            longitude: default_longitude(),
            timeout_secs: default_timeout(),
            freshness_minutes: default_freshness_minutes(),
            refresh_minutes: default_refresh_minutes(),
            refresh_enabled: true,
            persist_snapshots: true,
            store_path: None,
        }
    }
}

impl WeatherConfig {
    /// Loads configuration from `path`, or from the default location when `None`
    ///
    /// A missing file yields the defaults. A file that exists but cannot be read
    /// or parsed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        let config: Self =
            toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configured location is a real coordinate pair
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ConfigError::InvalidCoordinates);
        }
        Ok(())
    }

    /// Freshness window as a duration
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_minutes * 60)
    }

    /// Background refresh period as a duration
    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_minutes.max(1) * 60)
    }

    /// Record store location, falling back to the platform data directory
    pub fn resolved_store_path(&self) -> Option<PathBuf> {
        self.store_path.clone().or_else(|| {
            project_dirs().map(|dirs| dirs.data_dir().join("weather.json"))
        })
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "farmcast")
}

/// `<config dir>/farmcast/config.toml`, if a home directory is known
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// `<data dir>/farmcast/farmcast.log`, if a home directory is known
pub fn default_log_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("farmcast.log"))
}
