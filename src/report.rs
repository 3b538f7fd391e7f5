//! Plain-text forecast table for `--once` mode

use std::fmt::Write;

use crate::data::{DailyWeatherRecord, FieldWorkOutlook};
use crate::service::Tier;

/// Formats the records as an aligned table followed by a source line
pub fn forecast_table(records: &[DailyWeatherRecord], tier: Tier) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10}  {:<3}  {:>4}  {:>4}  {:>4}  {:<20}  {}",
        "Date", "Day", "High", "Low", "Rain", "Conditions", "Outlook"
    );
    for record in records {
        let _ = writeln!(
            out,
            "{:<10}  {:<3}  {:>3}°  {:>3}°  {:>3}%  {:<20}  {}",
            record.date.format("%Y-%m-%d").to_string(),
            record.date.format("%a").to_string(),
            record.temp_high,
            record.temp_low,
            record.precipitation_chance,
            record.conditions_label,
            FieldWorkOutlook::for_day(record).label()
        );
    }
    let _ = writeln!(out, "Source: {}", tier.label());
    out
}
