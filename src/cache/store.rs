//! Single-entry forecast cache
//!
//! Holds the most recent successfully fetched dataset and when it was fetched.
//! A write replaces the whole entry; nothing is ever merged.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::data::DailyWeatherRecord;

/// The cached dataset with its fetch time
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Records exactly as they were fetched
    pub dataset: Vec<DailyWeatherRecord>,
    /// Wall-clock time of the fetch, for display
    pub fetched_at: DateTime<Utc>,
    /// Monotonic time of the fetch, for age checks
    fetched_instant: Instant,
}

impl CacheEntry {
    /// Time elapsed between the fetch and `now`
    pub fn age_since(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_instant)
    }

    /// Whether the entry is younger than `window` at `now`
    pub fn is_fresh(&self, window: Duration, now: Instant) -> bool {
        self.age_since(now) < window
    }
}

/// Process-wide holder for the one cached dataset
#[derive(Debug, Default)]
pub struct CacheStore {
    entry: RwLock<Option<CacheEntry>>,
}

impl CacheStore {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current entry, if any
    pub fn read(&self) -> Option<CacheEntry> {
        self.entry.read().clone()
    }

    /// Replaces the entry with `dataset`, stamped with the current time
    pub fn write(&self, dataset: Vec<DailyWeatherRecord>) -> CacheEntry {
        let entry = CacheEntry {
            dataset,
            fetched_at: Utc::now(),
            fetched_instant: Instant::now(),
        };
        *self.entry.write() = Some(entry.clone());
        entry
    }

    /// Age of the current entry at `now`, or `None` when empty
    pub fn age_since(&self, now: Instant) -> Option<Duration> {
        self.entry.read().as_ref().map(|entry| entry.age_since(now))
    }

    /// Wall-clock time of the last successful write
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.entry.read().as_ref().map(|entry| entry.fetched_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::default_dataset;

    fn dataset(high: i32) -> Vec<DailyWeatherRecord> {
        let mut records = default_dataset(Utc::now().date_naive(), Utc::now());
        for record in &mut records {
            record.temp_high = high;
        }
        records
    }

    #[test]
    fn test_new_cache_is_empty() {
        let cache = CacheStore::new();

        assert!(cache.read().is_none());
        assert!(cache.age_since(Instant::now()).is_none());
        assert!(cache.fetched_at().is_none());
    }

    #[tokio::test]
    async fn test_write_replaces_whole_entry() {
        let cache = CacheStore::new();

        cache.write(dataset(70));
        let mut shorter = dataset(90);
        shorter.truncate(2);
        cache.write(shorter.clone());

        let entry = cache.read().expect("Entry should exist");
        assert_eq!(entry.dataset, shorter);
    }

    #[tokio::test(start_paused = true)]
    async fn test_age_tracks_elapsed_time() {
        let cache = CacheStore::new();
        cache.write(dataset(70));

        tokio::time::advance(Duration::from_secs(600)).await;

        let age = cache.age_since(Instant::now()).expect("Entry should exist");
        assert_eq!(age, Duration::from_secs(600));
        let entry = cache.read().unwrap();
        assert!(entry.is_fresh(Duration::from_secs(900), Instant::now()));

        tokio::time::advance(Duration::from_secs(300)).await;

        let entry = cache.read().unwrap();
        assert!(!entry.is_fresh(Duration::from_secs(900), Instant::now()));
    }

    #[tokio::test]
    async fn test_write_stamps_current_time() {
        let cache = CacheStore::new();

        let before = Utc::now();
        cache.write(dataset(70));
        let after = Utc::now();

        let fetched_at = cache.fetched_at().expect("Entry should exist");
        assert!(fetched_at >= before);
        assert!(fetched_at <= after);
    }
}
