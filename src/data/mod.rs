//! Core data models for the farm weather panel
//!
//! This module contains the daily record every consumer of the weather panel
//! reads, along with the sources that produce it: the upstream provider client,
//! the forecast normalizer, the persisted record store and the default dataset.

pub mod advice;
pub mod defaults;
pub mod normalize;
pub mod records;
pub mod weather;

pub use advice::{farming_advice, todays_record, Advice, AdviceKind, FieldWorkOutlook};
pub use defaults::{default_dataset, template_record};
pub use normalize::{normalize, CurrentReading, ForecastSample};
pub use records::{FileWeatherStore, MemoryWeatherStore, NewWeatherRow, PersistenceError, WeatherRow, WeatherStore};
pub use weather::{ForecastSource, NetworkError, WeatherClient};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Number of records in every dataset handed to a caller (today + 4 days)
pub const FORECAST_DAYS: usize = 5;

/// One day of weather as the rest of the dashboard consumes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyWeatherRecord {
    /// Position within the dataset, 1 = today
    pub id: u32,
    /// Calendar day this record describes
    pub date: NaiveDate,
    /// High temperature in the provider's unit (Fahrenheit), rounded
    pub temp_high: i32,
    /// Low temperature in the provider's unit (Fahrenheit), rounded
    pub temp_low: i32,
    /// Derived precipitation percentage, always within 0..=100
    pub precipitation_chance: u8,
    /// Title-cased description, e.g. "Light Rain"
    pub conditions_label: String,
    /// Provider icon identifier, passed through unchanged
    pub icon_code: String,
    /// True only when produced from the live provider
    pub is_real_time: bool,
    /// When this value was produced
    pub last_updated: DateTime<Utc>,
    /// Relative humidity, only known for the current-conditions reading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<u8>,
    /// Wind speed in mph, only known for the current-conditions reading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
}

/// Clamps a raw percentage into 0..=100 and rounds it
pub fn clamp_percent(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

/// Title-cases a provider description ("light rain" -> "Light Rain")
pub fn title_case(description: &str) -> String {
    description
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case_multiple_words() {
        assert_eq!(title_case("light rain"), "Light Rain");
        assert_eq!(title_case("OVERCAST clouds"), "Overcast Clouds");
    }

    #[test]
    fn test_title_case_collapses_whitespace() {
        assert_eq!(title_case("  scattered   clouds "), "Scattered Clouds");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_clamp_percent_bounds() {
        assert_eq!(clamp_percent(-5.0), 0);
        assert_eq!(clamp_percent(42.4), 42);
        assert_eq!(clamp_percent(250.0), 100);
        assert_eq!(clamp_percent(f64::NAN), 0);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = DailyWeatherRecord {
            id: 1,
            date: NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(),
            temp_high: 80,
            temp_low: 60,
            precipitation_chance: 30,
            conditions_label: "Light Rain".to_string(),
            icon_code: "10d".to_string(),
            is_real_time: true,
            last_updated: Utc::now(),
            humidity: None,
            wind_speed: None,
        };

        let json = serde_json::to_string(&record).expect("Failed to serialize record");

        assert!(json.contains("\"tempHigh\":80"));
        assert!(json.contains("\"precipitationChance\":30"));
        assert!(json.contains("\"isRealTime\":true"));
        assert!(json.contains("\"date\":\"2024-07-15\""));
        assert!(!json.contains("humidity"));
    }
}
