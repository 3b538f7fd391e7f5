//! Persisted weather rows
//!
//! The dashboard's record store keeps one row per day of weather. The weather
//! panel only reads it as a fallback and writes snapshots of live data into it,
//! but the store itself supports the same create/read/update/delete operations
//! as every other dashboard table.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::defaults::template_record;
use super::{clamp_percent, title_case, DailyWeatherRecord, FORECAST_DAYS};

/// Errors that can occur when using the record store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// No row with this id
    #[error("Weather with ID {0} not found")]
    NotFound(u32),

    /// The backing file could not be read or written
    #[error("Record store I/O failed: {0}")]
    Io(String),

    /// The backing file is not a JSON array of rows
    #[error("Record store is corrupt: {0}")]
    Corrupt(String),

    /// Every id up to the maximum is taken
    #[error("No weather IDs left after {0}")]
    IdsExhausted(u32),
}

/// A stored weather row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRow {
    #[serde(rename = "Id")]
    pub id: u32,
    /// ISO date or RFC 3339 timestamp
    pub date: String,
    pub temp_high: i32,
    pub temp_low: i32,
    /// Precipitation chance in percent
    pub precipitation: i32,
    pub conditions: String,
    #[serde(default)]
    pub icon: String,
    #[serde(rename = "lastUpdated", default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Row contents without an id, used for create and update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWeatherRow {
    pub date: String,
    pub temp_high: i32,
    pub temp_low: i32,
    pub precipitation: i32,
    pub conditions: String,
    pub icon: String,
    pub last_updated: Option<DateTime<Utc>>,
}

impl NewWeatherRow {
    fn with_id(self, id: u32) -> WeatherRow {
        WeatherRow {
            id,
            date: self.date,
            temp_high: self.temp_high,
            temp_low: self.temp_low,
            precipitation: self.precipitation,
            conditions: self.conditions,
            icon: self.icon,
            last_updated: self.last_updated,
        }
    }
}

impl From<&DailyWeatherRecord> for NewWeatherRow {
    fn from(record: &DailyWeatherRecord) -> Self {
        Self {
            date: record.date.format("%Y-%m-%d").to_string(),
            temp_high: record.temp_high,
            temp_low: record.temp_low,
            precipitation: i32::from(record.precipitation_chance),
            conditions: record.conditions_label.clone(),
            icon: record.icon_code.clone(),
            last_updated: Some(record.last_updated),
        }
    }
}

impl WeatherRow {
    /// Calendar date of the row, accepting plain dates and full timestamps
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(&self.date)
                    .ok()
                    .map(|timestamp| timestamp.date_naive())
            })
    }
}

/// Generic CRUD access to the weather table
#[async_trait]
pub trait WeatherStore: Send + Sync {
    /// Returns every stored row
    async fn fetch_all(&self) -> Result<Vec<WeatherRow>, PersistenceError>;

    /// Returns the row with `id`
    async fn get_by_id(&self, id: u32) -> Result<WeatherRow, PersistenceError>;

    /// Inserts a row with the next free id
    async fn create(&self, row: NewWeatherRow) -> Result<WeatherRow, PersistenceError>;

    /// Replaces the row with `id`
    async fn update(&self, id: u32, row: NewWeatherRow) -> Result<WeatherRow, PersistenceError>;

    /// Removes the row with `id`
    async fn delete(&self, id: u32) -> Result<(), PersistenceError>;
}

fn next_id(rows: &[WeatherRow]) -> Result<u32, PersistenceError> {
    let max = rows.iter().map(|row| row.id).max().unwrap_or(0);
    max.checked_add(1).ok_or(PersistenceError::IdsExhausted(max))
}

fn apply_create(
    rows: &mut Vec<WeatherRow>,
    row: NewWeatherRow,
) -> Result<WeatherRow, PersistenceError> {
    let created = row.with_id(next_id(rows)?);
    rows.push(created.clone());
    Ok(created)
}

fn apply_update(
    rows: &mut [WeatherRow],
    id: u32,
    row: NewWeatherRow,
) -> Result<WeatherRow, PersistenceError> {
    let slot = rows
        .iter_mut()
        .find(|existing| existing.id == id)
        .ok_or(PersistenceError::NotFound(id))?;
    *slot = row.with_id(id);
    Ok(slot.clone())
}

fn apply_delete(rows: &mut Vec<WeatherRow>, id: u32) -> Result<(), PersistenceError> {
    let index = rows
        .iter()
        .position(|row| row.id == id)
        .ok_or(PersistenceError::NotFound(id))?;
    rows.remove(index);
    Ok(())
}

/// In-memory store, optionally seeded with rows
#[derive(Debug, Default)]
pub struct MemoryWeatherStore {
    rows: RwLock<Vec<WeatherRow>>,
}

impl MemoryWeatherStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<WeatherRow>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }
}

#[async_trait]
impl WeatherStore for MemoryWeatherStore {
    async fn fetch_all(&self) -> Result<Vec<WeatherRow>, PersistenceError> {
        Ok(self.rows.read().clone())
    }

    async fn get_by_id(&self, id: u32) -> Result<WeatherRow, PersistenceError> {
        self.rows
            .read()
            .iter()
            .find(|row| row.id == id)
            .cloned()
            .ok_or(PersistenceError::NotFound(id))
    }

    async fn create(&self, row: NewWeatherRow) -> Result<WeatherRow, PersistenceError> {
        apply_create(&mut self.rows.write(), row)
    }

    async fn update(&self, id: u32, row: NewWeatherRow) -> Result<WeatherRow, PersistenceError> {
        apply_update(&mut self.rows.write(), id, row)
    }

    async fn delete(&self, id: u32) -> Result<(), PersistenceError> {
        apply_delete(&mut self.rows.write(), id)
    }
}

/// Store backed by a JSON array file
///
/// The file and its parent directory are created on first write; a missing
/// file reads as an empty table. Writes serialize through an async lock so
/// read-modify-write cycles never interleave.
#[derive(Debug)]
pub struct FileWeatherStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FileWeatherStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<WeatherRow>, PersistenceError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistenceError::Io(e.to_string())),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| PersistenceError::Corrupt(e.to_string()))
    }

    async fn save(&self, rows: &[WeatherRow]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PersistenceError::Io(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(rows)
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| PersistenceError::Io(e.to_string()))
    }
}

#[async_trait]
impl WeatherStore for FileWeatherStore {
    async fn fetch_all(&self) -> Result<Vec<WeatherRow>, PersistenceError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn get_by_id(&self, id: u32) -> Result<WeatherRow, PersistenceError> {
        let _guard = self.lock.lock().await;
        self.load()
            .await?
            .into_iter()
            .find(|row| row.id == id)
            .ok_or(PersistenceError::NotFound(id))
    }

    async fn create(&self, row: NewWeatherRow) -> Result<WeatherRow, PersistenceError> {
        let _guard = self.lock.lock().await;
        let mut rows = self.load().await?;
        let created = apply_create(&mut rows, row)?;
        self.save(&rows).await?;
        Ok(created)
    }

    async fn update(&self, id: u32, row: NewWeatherRow) -> Result<WeatherRow, PersistenceError> {
        let _guard = self.lock.lock().await;
        let mut rows = self.load().await?;
        let updated = apply_update(&mut rows, id, row)?;
        self.save(&rows).await?;
        Ok(updated)
    }

    async fn delete(&self, id: u32) -> Result<(), PersistenceError> {
        let _guard = self.lock.lock().await;
        let mut rows = self.load().await?;
        apply_delete(&mut rows, id)?;
        self.save(&rows).await
    }
}

/// Shapes stored rows into the five-day window starting at `today`
///
/// Each day uses the stored row for that date when one exists, otherwise the
/// default template. Returns `None` when no stored row falls inside the
/// window, so the caller can move on to the next source.
pub fn records_from_rows(
    rows: &[WeatherRow],
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Option<Vec<DailyWeatherRecord>> {
    let mut matched = 0;
    let records: Vec<DailyWeatherRecord> = (0..FORECAST_DAYS)
        .map(|offset| {
            let id = offset as u32 + 1;
            let date = today + Duration::days(offset as i64);
            // Latest id wins when a date was stored twice
            let row = rows
                .iter()
                .filter(|row| row.parsed_date() == Some(date))
                .max_by_key(|row| row.id);
            match row {
                Some(row) => {
                    matched += 1;
                    DailyWeatherRecord {
                        id,
                        date,
                        temp_high: row.temp_high,
                        temp_low: row.temp_low,
                        precipitation_chance: clamp_percent(f64::from(row.precipitation)),
                        conditions_label: title_case(&row.conditions),
                        icon_code: row.icon.clone(),
                        is_real_time: false,
                        last_updated: row.last_updated.unwrap_or(now),
                        humidity: None,
                        wind_speed: None,
                    }
                }
                None => template_record(id, date, now),
            }
        })
        .collect();

    let skipped = rows.iter().filter(|row| row.parsed_date().is_none()).count();
    if skipped > 0 {
        warn!(skipped, "Ignoring stored weather rows with unreadable dates");
    }

    (matched > 0).then_some(records)
}
