//! Farming advice derived from a day's forecast
//!
//! Thresholds are in °F and percent, matching the provider's imperial units.

use chrono::NaiveDate;

use super::DailyWeatherRecord;

/// Severity of a piece of advice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdviceKind {
    Warning,
    Danger,
    Info,
    Success,
}

/// One line of advice for the farmer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advice {
    pub kind: AdviceKind,
    pub message: &'static str,
}

/// Single-word summary of whether a day suits outdoor work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWorkOutlook {
    IndoorWork,
    HighHeat,
    FrostRisk,
    GoodForFieldWork,
}

impl FieldWorkOutlook {
    /// Outlook for a day, first matching rule wins
    pub fn for_day(record: &DailyWeatherRecord) -> Self {
        if record.precipitation_chance > 70 {
            Self::IndoorWork
        } else if record.temp_high > 85 {
            Self::HighHeat
        } else if record.temp_low < 40 {
            Self::FrostRisk
        } else {
            Self::GoodForFieldWork
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::IndoorWork => "Indoor Work",
            Self::HighHeat => "High Heat",
            Self::FrostRisk => "Frost Risk",
            Self::GoodForFieldWork => "Good for Field Work",
        }
    }
}

/// All advice that applies to `record`, in display order
pub fn farming_advice(record: &DailyWeatherRecord) -> Vec<Advice> {
    let mut advice = Vec::new();

    if record.precipitation_chance > 70 {
        advice.push(Advice {
            kind: AdviceKind::Warning,
            message: "High chance of rain - postpone outdoor activities",
        });
    }

    if record.temp_high > 85 {
        advice.push(Advice {
            kind: AdviceKind::Danger,
            message: "High temperature - ensure adequate irrigation",
        });
    }

    if record.temp_low < 40 {
        advice.push(Advice {
            kind: AdviceKind::Info,
            message: "Cold weather - protect sensitive crops",
        });
    }

    if record.precipitation_chance < 20 && record.temp_high > 75 {
        advice.push(Advice {
            kind: AdviceKind::Success,
            message: "Perfect weather for harvesting and field work",
        });
    }

    advice
}

/// The record dated `today`, or the first record if none matches
pub fn todays_record(records: &[DailyWeatherRecord], today: NaiveDate) -> Option<&DailyWeatherRecord> {
    records
        .iter()
        .find(|record| record.date == today)
        .or_else(|| records.first())
}
