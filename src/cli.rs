//! Command-line interface parsing for Farmcast
//!
//! This module handles parsing of CLI arguments using clap and merging them
//! over the TOML configuration file.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::config::{default_log_path, ConfigError, WeatherConfig};

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// `--refresh` only makes sense together with `--once`
    #[error("--refresh can only be used together with --once")]
    RefreshWithoutOnce,

    /// The configuration file or an override is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Farmcast - 5-day farm weather outlook in the terminal
#[derive(Parser, Debug)]
#[command(name = "farmcast")]
#[command(about = "Farm dashboard weather panel with cached 5-day forecast")]
#[command(version)]
pub struct Cli {
    /// Print the forecast once as a table and exit instead of opening the TUI
    #[arg(long)]
    pub once: bool,

    /// With --once, bypass the cache and fail if the provider cannot be reached
    #[arg(long)]
    pub refresh: bool,

    /// Path to the TOML configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Farm latitude, overrides the config file
    #[arg(long, allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Farm longitude, overrides the config file
    #[arg(long, allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Provider API key
    #[arg(long, env = "FARMCAST_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Provider base URL, e.g. https://api.openweathermap.org/data/2.5
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Path to the JSON weather record store
    #[arg(long, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Where TUI mode writes its log
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// Weather settings with command-line overrides applied
    pub weather: WeatherConfig,
    /// Print once and exit
    pub once: bool,
    /// Force a provider fetch in `--once` mode
    pub force_refresh: bool,
    /// Log destination for TUI mode
    pub log_file: Option<PathBuf>,
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// Loads the configuration file named by `--config` (or the default
    /// location), then applies each flag that was given on top.
    ///
    /// # Errors
    /// * `CliError::RefreshWithoutOnce` if `--refresh` is given alone
    /// * `CliError::Config` if the file is unreadable or the coordinates are invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let weather = WeatherConfig::load(cli.config.as_deref())?;
        Self::with_config(cli, weather)
    }

    /// Applies CLI overrides to an already loaded configuration
    pub fn with_config(cli: &Cli, mut weather: WeatherConfig) -> Result<Self, CliError> {
        if cli.refresh && !cli.once {
            return Err(CliError::RefreshWithoutOnce);
        }

        if let Some(lat) = cli.lat {
            weather.latitude = lat;
        }
        if let Some(lon) = cli.lon {
            weather.longitude = lon;
        }
        if let Some(api_key) = &cli.api_key {
            weather.api_key = api_key.clone();
        }
        if let Some(base_url) = &cli.base_url {
            weather.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(store) = &cli.store {
            weather.store_path = Some(store.clone());
        }
        weather.validate()?;

        // One-shot runs should not leave a timer behind
        if cli.once {
            weather.refresh_enabled = false;
        }

        Ok(Self {
            weather,
            once: cli.once,
            force_refresh: cli.refresh,
            log_file: cli.log_file.clone().or_else(default_log_path),
        })
    }
}
