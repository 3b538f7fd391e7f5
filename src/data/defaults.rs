//! Default dataset used when neither the provider nor the record store can
//! supply a forecast
//!
//! This is the terminal tier of the fallback chain, so nothing in here can fail.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::{DailyWeatherRecord, FORECAST_DAYS};

/// Template high temperature (°F)
pub const TEMPLATE_HIGH: i32 = 75;

/// Template low temperature (°F)
pub const TEMPLATE_LOW: i32 = 55;

/// Template precipitation chance (%)
pub const TEMPLATE_PRECIPITATION: u8 = 20;

/// Template conditions label
pub const TEMPLATE_CONDITIONS: &str = "Partly Cloudy";

/// Template icon (provider code for "few clouds, day")
pub const TEMPLATE_ICON: &str = "02d";

/// Builds a single template record for `date`
pub fn template_record(id: u32, date: NaiveDate, now: DateTime<Utc>) -> DailyWeatherRecord {
    DailyWeatherRecord {
        id,
        date,
        temp_high: TEMPLATE_HIGH,
        temp_low: TEMPLATE_LOW,
        precipitation_chance: TEMPLATE_PRECIPITATION,
        conditions_label: TEMPLATE_CONDITIONS.to_string(),
        icon_code: TEMPLATE_ICON.to_string(),
        is_real_time: false,
        last_updated: now,
        humidity: None,
        wind_speed: None,
    }
}

/// Synthesizes five consecutive template days starting at `today`
pub fn default_dataset(today: NaiveDate, now: DateTime<Utc>) -> Vec<DailyWeatherRecord> {
    (0..FORECAST_DAYS)
        .map(|offset| {
            template_record(
                offset as u32 + 1,
                today + Duration::days(offset as i64),
                now,
            )
        })
        .collect()
}
