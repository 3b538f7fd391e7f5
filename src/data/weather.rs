//! Upstream weather provider client
//!
//! This module fetches current conditions and the 3-hour forecast for the
//! configured farm location and hands both payloads to the normalizer. Any
//! failure on either call fails the whole fetch; there is no retry here.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{FixedOffset, Local, Offset, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use super::normalize::{normalize, CurrentReading, ForecastSample};
use super::DailyWeatherRecord;
use crate::config::WeatherConfig;

/// Errors that can occur when talking to the weather provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// The request never produced a response (DNS, connect, timeout)
    #[error("Weather request failed: {0}")]
    Transport(String),

    /// The provider answered with a non-2xx status
    #[error("Weather provider returned {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },

    /// The response body was not the expected JSON
    #[error("Failed to decode weather response: {0}")]
    Decode(String),
}

impl NetworkError {
    /// Whether the failure was an HTTP status rather than a transport problem
    pub fn is_status(&self) -> bool {
        matches!(self, Self::Status { .. })
    }

    fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Anything that can produce a normalized five-day forecast
#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// Fetches and normalizes a fresh forecast
    async fn fetch_forecast(&self) -> Result<Vec<DailyWeatherRecord>, NetworkError>;
}

/// Current-conditions response (`/weather`)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CurrentResponse {
    main: CurrentMain,
    wind: Wind,
    weather: Vec<Description>,
    rain: Option<Rain>,
    /// Location offset from UTC in seconds
    timezone: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CurrentMain {
    temp_max: f64,
    temp_min: f64,
    humidity: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Wind {
    speed: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Description {
    description: String,
    icon: String,
}

#[derive(Debug, Default, Deserialize)]
struct Rain {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
    #[serde(rename = "3h")]
    three_hours: Option<f64>,
}

/// Forecast response (`/forecast`)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ForecastResponse {
    list: Vec<ForecastEntry>,
    city: Option<City>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ForecastEntry {
    dt: Option<i64>,
    main: ForecastMain,
    weather: Vec<Description>,
    rain: Option<Rain>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ForecastMain {
    temp: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct City {
    timezone: Option<i32>,
}

impl CurrentResponse {
    fn into_reading(self) -> CurrentReading {
        let description = self.weather.into_iter().next().unwrap_or_default();
        CurrentReading {
            temp_max: self.main.temp_max,
            temp_min: self.main.temp_min,
            humidity: self.main.humidity,
            wind_speed: self.wind.speed,
            description: description.description,
            icon: description.icon,
            rain_1h: self.rain.and_then(|rain| rain.one_hour),
        }
    }
}

impl ForecastEntry {
    /// A sample without a timestamp cannot be placed on a day
    fn into_sample(self) -> Option<ForecastSample> {
        let Some(timestamp) = self.dt else {
            debug!("Skipping forecast sample without dt");
            return None;
        };
        let description = self.weather.into_iter().next().unwrap_or_default();
        Some(ForecastSample {
            timestamp,
            temperature: self.main.temp,
            description: description.description,
            icon: description.icon,
            rain_3h: self.rain.and_then(|rain| rain.three_hours),
        })
    }
}

/// Client for the upstream weather provider
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
    latitude: f64,
    longitude: f64,
}

impl WeatherClient {
    /// Creates a client for the location and endpoint in `config`
    ///
    /// # Errors
    /// Returns `NetworkError::Transport` if the HTTP client cannot be built.
    pub fn new(config: &WeatherConfig) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        Ok(Self::with_client(client, config))
    }

    /// Creates a client around an existing HTTP client
    pub fn with_client(client: Client, config: &WeatherConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            latitude: config.latitude,
            longitude: config.longitude,
        }
    }

    /// Issues one GET against `endpoint` and decodes the JSON body
    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, NetworkError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let latitude = self.latitude.to_string();
        let longitude = self.longitude.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", latitude.as_str()),
                ("lon", longitude.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "imperial"),
            ])
            .send()
            .await
            .map_err(NetworkError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(endpoint, status));
        }

        response.json::<T>().await.map_err(NetworkError::from_reqwest)
    }
}

fn status_error(endpoint: &str, status: StatusCode) -> NetworkError {
    NetworkError::Status {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
    }
}

#[async_trait]
impl ForecastSource for WeatherClient {
    #[instrument(skip(self), fields(lat = self.latitude, lon = self.longitude))]
    async fn fetch_forecast(&self) -> Result<Vec<DailyWeatherRecord>, NetworkError> {
        let current: CurrentResponse = self.get_json("weather").await?;
        let forecast: ForecastResponse = self.get_json("forecast").await?;

        let offset = forecast
            .city
            .as_ref()
            .and_then(|city| city.timezone)
            .or(current.timezone)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Local::now().offset().fix());

        let samples: Vec<ForecastSample> = forecast
            .list
            .into_iter()
            .filter_map(ForecastEntry::into_sample)
            .collect();
        debug!(samples = samples.len(), "Fetched forecast samples");

        Ok(normalize(&current.into_reading(), &samples, Utc::now(), offset))
    }
}
