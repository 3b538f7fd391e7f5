//! Forecast normalizer
//!
//! Turns one current-conditions reading plus a run of 3-hour forecast samples
//! into exactly [`FORECAST_DAYS`] daily records: today from the live reading,
//! then one bucket per following calendar day.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

use super::defaults::template_record;
use super::{clamp_percent, title_case, DailyWeatherRecord, FORECAST_DAYS};

/// Percentage points per millimetre of forecast rain volume
pub const PRECIPITATION_SCALE: f64 = 10.0;

/// The provider's current-conditions reading, already defaulted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentReading {
    pub temp_max: f64,
    pub temp_min: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub description: String,
    pub icon: String,
    /// Rain volume over the last hour in mm, when reported
    pub rain_1h: Option<f64>,
}

/// One fine-grained forecast sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastSample {
    /// Sample time as epoch seconds
    pub timestamp: i64,
    pub temperature: f64,
    pub description: String,
    pub icon: String,
    /// Rain volume over the 3-hour window in mm, when reported
    pub rain_3h: Option<f64>,
}

/// Running aggregate for one calendar day
#[derive(Debug)]
struct DayBucket {
    high: f64,
    low: f64,
    rain_total: f64,
    description: String,
    icon: String,
}

impl DayBucket {
    fn open(sample: &ForecastSample) -> Self {
        Self {
            high: sample.temperature,
            low: sample.temperature,
            rain_total: sample.rain_3h.unwrap_or(0.0),
            description: sample.description.clone(),
            icon: sample.icon.clone(),
        }
    }

    fn absorb(&mut self, sample: &ForecastSample) {
        self.high = self.high.max(sample.temperature);
        self.low = self.low.min(sample.temperature);
        self.rain_total += sample.rain_3h.unwrap_or(0.0);
    }
}

/// Converts the provider payloads into five daily records
///
/// # Arguments
/// * `current` - Today's reading
/// * `samples` - Forecast samples in any order
/// * `now` - Production time, stamped into `last_updated`
/// * `offset` - UTC offset of the forecast location, used to pick calendar days
///
/// # Behavior
/// - Samples falling on today (or earlier) are ignored; today comes from `current`
/// - Label and icon of a bucket come from its earliest sample
/// - Missing rain is treated as zero
/// - If the provider covers fewer than four future days, the tail is padded
///   with template days marked `is_real_time = false`
pub fn normalize(
    current: &CurrentReading,
    samples: &[ForecastSample],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<DailyWeatherRecord> {
    let today = now.with_timezone(&offset).date_naive();
    let mut records = Vec::with_capacity(FORECAST_DAYS);

    records.push(DailyWeatherRecord {
        id: 1,
        date: today,
        temp_high: current.temp_max.round() as i32,
        temp_low: current.temp_min.round() as i32,
        precipitation_chance: clamp_percent(current.rain_1h.unwrap_or(0.0) * PRECIPITATION_SCALE),
        conditions_label: title_case(&current.description),
        icon_code: current.icon.clone(),
        is_real_time: true,
        last_updated: now,
        humidity: Some(clamp_percent(current.humidity)),
        wind_speed: Some(current.wind_speed),
    });

    let mut ordered: Vec<&ForecastSample> = samples.iter().collect();
    ordered.sort_by_key(|sample| sample.timestamp);

    let mut buckets: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();
    for sample in ordered {
        let Some(date) = local_date(sample.timestamp, offset) else {
            continue;
        };
        if date <= today {
            continue;
        }
        buckets
            .entry(date)
            .and_modify(|bucket| bucket.absorb(sample))
            .or_insert_with(|| DayBucket::open(sample));
    }

    for (date, bucket) in buckets.into_iter().take(FORECAST_DAYS - 1) {
        records.push(DailyWeatherRecord {
            id: records.len() as u32 + 1,
            date,
            temp_high: bucket.high.round() as i32,
            temp_low: bucket.low.round() as i32,
            precipitation_chance: clamp_percent(bucket.rain_total * PRECIPITATION_SCALE),
            conditions_label: title_case(&bucket.description),
            icon_code: bucket.icon,
            is_real_time: true,
            last_updated: now,
            humidity: None,
            wind_speed: None,
        });
    }

    while records.len() < FORECAST_DAYS {
        let next_date = records
            .last()
            .map_or(today, |record| record.date + Duration::days(1));
        records.push(template_record(records.len() as u32 + 1, next_date, now));
    }

    records
}

/// Calendar date of an epoch timestamp at the given offset
fn local_date(timestamp: i64, offset: FixedOffset) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0).map(|utc| utc.with_timezone(&offset).date_naive())
}
