//! Weather retrieval service
//!
//! [`WeatherService`] is the one place the dashboard asks for weather. It owns
//! the forecast cache and the background refresh, and answers every request
//! with five daily records by walking an ordered list of sources:
//!
//! 1. the cache, while younger than the freshness window
//! 2. the remote provider
//! 3. the cache again, however old
//! 4. the dashboard's record store
//! 5. the default template, which cannot fail
//!
//! Concurrent remote fetches are collapsed into one: whoever asks while a fetch
//! is in flight waits on that same fetch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::config::WeatherConfig;
use crate::data::records::records_from_rows;
use crate::data::{
    default_dataset, DailyWeatherRecord, ForecastSource, NetworkError, NewWeatherRow, WeatherStore,
};
use crate::refresh::{RefreshConfig, RefreshHandle, RefreshMessage, RefreshTarget};

type FetchResult = Result<Vec<DailyWeatherRecord>, NetworkError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Capacity of the refresh update channel
const UPDATE_CHANNEL_CAPACITY: usize = 32;

/// Source that served a forecast request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Cache younger than the freshness window
    FreshCache,
    /// Live provider, fetched for this request
    Remote,
    /// Cache older than the freshness window, served because the provider failed
    StaleCache,
    /// Rows from the dashboard's record store
    Persistence,
    /// Synthesized template days
    Default,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Self::FreshCache => "cached",
            Self::Remote => "live",
            Self::StaleCache => "stale cache",
            Self::Persistence => "saved records",
            Self::Default => "default outlook",
        }
    }

    /// True for every source other than a live or fresh fetch
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::FreshCache | Self::Remote)
    }
}

/// A source that may have nothing to serve
#[derive(Debug, Clone, Copy)]
enum Fallback {
    FreshCache,
    Remote,
    StaleCache,
    Persistence,
}

impl Fallback {
    fn tier(self) -> Tier {
        match self {
            Self::FreshCache => Tier::FreshCache,
            Self::Remote => Tier::Remote,
            Self::StaleCache => Tier::StaleCache,
            Self::Persistence => Tier::Persistence,
        }
    }
}

/// Sources tried in order before falling back to the default template
const FALLBACK_ORDER: [Fallback; 4] = [
    Fallback::FreshCache,
    Fallback::Remote,
    Fallback::StaleCache,
    Fallback::Persistence,
];

/// Result of trying one source
#[derive(Debug)]
enum TierOutcome {
    Served(Vec<DailyWeatherRecord>),
    Next,
}

/// A forecast together with the source that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieved {
    pub records: Vec<DailyWeatherRecord>,
    pub tier: Tier,
}

/// State shared between callers and the refresh task
struct ServiceInner {
    source: Arc<dyn ForecastSource>,
    store: Arc<dyn WeatherStore>,
    cache: CacheStore,
    freshness_window: Duration,
    persist_snapshots: bool,
    in_flight: Mutex<Option<SharedFetch>>,
}

/// Empties the in-flight slot when the fetch task ends, however it ends
struct InFlightGuard<'a>(&'a ServiceInner);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.lock().take();
    }
}

impl ServiceInner {
    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    fn default_forecast() -> Vec<DailyWeatherRecord> {
        default_dataset(Self::today(), Utc::now())
    }

    /// Runs the remote fetch, joining one already in flight
    ///
    /// Exactly one cache write happens per upstream call, and only on success.
    /// The fetch runs as its own task, so it completes even when every waiter
    /// is cancelled.
    async fn fetch_remote(self: &Arc<Self>) -> FetchResult {
        let fetch = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(fetch) => {
                    debug!("Joining in-flight weather fetch");
                    fetch.clone()
                }
                None => {
                    let inner = Arc::clone(self);
                    let task = tokio::spawn(async move {
                        let _clear = InFlightGuard(&*inner);
                        let result = inner.source.fetch_forecast().await;
                        if let Ok(records) = &result {
                            inner.cache.write(records.clone());
                            if inner.persist_snapshots {
                                inner.persist_snapshot(records).await;
                            }
                        }
                        result
                    });
                    let fetch = async move {
                        task.await.unwrap_or_else(|e| {
                            Err(NetworkError::Transport(format!("fetch task ended early: {e}")))
                        })
                    }
                    .boxed()
                    .shared();
                    *slot = Some(fetch.clone());
                    fetch
                }
            }
        };
        fetch.await
    }

    /// Upserts fetched records into the store by date; failures are only logged
    async fn persist_snapshot(&self, records: &[DailyWeatherRecord]) {
        let existing = match self.store.fetch_all().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Could not read stored weather, skipping snapshot");
                return;
            }
        };

        for record in records {
            let row = NewWeatherRow::from(record);
            let stored = existing
                .iter()
                .filter(|row| row.parsed_date() == Some(record.date))
                .max_by_key(|row| row.id);
            let result = match stored {
                Some(stored) => self.store.update(stored.id, row).await.map(|_| ()),
                None => self.store.create(row).await.map(|_| ()),
            };
            if let Err(e) = result {
                warn!(error = %e, date = %record.date, "Could not store weather snapshot");
            }
        }
    }

    async fn attempt(self: &Arc<Self>, fallback: Fallback) -> TierOutcome {
        match fallback {
            Fallback::FreshCache => match self.cache.read() {
                Some(entry) if entry.is_fresh(self.freshness_window, Instant::now()) => {
                    TierOutcome::Served(entry.dataset)
                }
                _ => TierOutcome::Next,
            },
            Fallback::Remote => match self.fetch_remote().await {
                Ok(records) => TierOutcome::Served(records),
                Err(e) => {
                    warn!(error = %e, "Remote weather fetch failed, falling back");
                    TierOutcome::Next
                }
            },
            Fallback::StaleCache => self
                .cache
                .read()
                .map_or(TierOutcome::Next, |entry| TierOutcome::Served(entry.dataset)),
            Fallback::Persistence => match self.store.fetch_all().await {
                Ok(rows) => records_from_rows(&rows, Self::today(), Utc::now())
                    .map_or(TierOutcome::Next, TierOutcome::Served),
                Err(e) => {
                    warn!(error = %e, "Stored weather unavailable, falling back");
                    TierOutcome::Next
                }
            },
        }
    }
}

/// Adapter handing the refresh timer the same fetch path callers use
struct ServiceRefresher(Arc<ServiceInner>);

#[async_trait]
impl RefreshTarget for ServiceRefresher {
    async fn refresh(&self) -> Result<Vec<DailyWeatherRecord>, NetworkError> {
        self.0.fetch_remote().await
    }
}

/// Public entry point for weather data
///
/// Construct once per process with [`WeatherService::new`] and call
/// [`WeatherService::dispose`] (or drop it) to stop the background refresh.
pub struct WeatherService {
    inner: Arc<ServiceInner>,
    refresh: Mutex<Option<RefreshHandle>>,
    updates: Mutex<Option<mpsc::Receiver<RefreshMessage>>>,
}

impl std::fmt::Debug for WeatherService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherService")
            .field("freshness_window", &self.inner.freshness_window)
            .field("last_update", &self.inner.cache.fetched_at())
            .finish_non_exhaustive()
    }
}

impl WeatherService {
    /// Creates the service and starts its background refresh
    ///
    /// Must be called from within a tokio runtime when refresh is enabled.
    pub fn new(
        config: &WeatherConfig,
        source: Arc<dyn ForecastSource>,
        store: Arc<dyn WeatherStore>,
    ) -> Self {
        let inner = Arc::new(ServiceInner {
            source,
            store,
            cache: CacheStore::new(),
            freshness_window: config.freshness_window(),
            persist_snapshots: config.persist_snapshots,
            in_flight: Mutex::new(None),
        });

        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let refresh = RefreshHandle::spawn(
            RefreshConfig {
                interval: config.refresh_period(),
                enabled: config.refresh_enabled,
            },
            Arc::new(ServiceRefresher(Arc::clone(&inner))),
            tx,
        );

        Self {
            inner,
            refresh: Mutex::new(Some(refresh)),
            updates: Mutex::new(Some(rx)),
        }
    }

    /// Returns five daily records, never failing
    pub async fn get_current_forecast(&self) -> Vec<DailyWeatherRecord> {
        self.retrieve().await.records
    }

    /// Like [`get_current_forecast`](Self::get_current_forecast), also naming the source
    pub async fn retrieve(&self) -> Retrieved {
        for fallback in FALLBACK_ORDER {
            if let TierOutcome::Served(records) = self.inner.attempt(fallback).await {
                let tier = fallback.tier();
                debug!(tier = tier.label(), records = records.len(), "Serving forecast");
                return Retrieved { records, tier };
            }
        }

        info!("No weather source available, serving default outlook");
        Retrieved {
            records: ServiceInner::default_forecast(),
            tier: Tier::Default,
        }
    }

    /// Fetches from the provider regardless of cache age
    ///
    /// # Errors
    /// Returns the provider failure as-is; the cache is left untouched.
    pub async fn force_refresh(&self) -> Result<Vec<DailyWeatherRecord>, NetworkError> {
        let result = self.inner.fetch_remote().await;
        match &result {
            Ok(records) => info!(records = records.len(), "Forced weather refresh succeeded"),
            Err(e) => warn!(error = %e, "Forced weather refresh failed"),
        }
        result
    }

    /// When the cache was last filled from the provider
    pub fn get_last_update_time(&self) -> Option<DateTime<Utc>> {
        self.inner.cache.fetched_at()
    }

    /// Whether the cache holds data younger than the freshness window
    pub fn is_data_fresh(&self) -> bool {
        self.inner
            .cache
            .read()
            .is_some_and(|entry| entry.is_fresh(self.inner.freshness_window, Instant::now()))
    }

    /// Takes the receiver for background refresh messages (once)
    pub fn take_updates(&self) -> Option<mpsc::Receiver<RefreshMessage>> {
        self.updates.lock().take()
    }

    /// Stops the background refresh; later calls do nothing
    pub fn dispose(&self) {
        if let Some(handle) = self.refresh.lock().take() {
            handle.shutdown();
            info!("Weather service disposed");
        }
    }

    /// Whether the background refresh is still active
    pub fn is_refreshing(&self) -> bool {
        self.refresh
            .lock()
            .as_ref()
            .is_some_and(RefreshHandle::is_running)
    }
}

impl Drop for WeatherService {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MemoryWeatherStore, PersistenceError, WeatherRow};
    use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

    const MINUTE: Duration = Duration::from_secs(60);

    struct FakeSource {
        calls: AtomicUsize,
        fail: AtomicBool,
        high: AtomicI32,
        delay: Duration,
    }

    impl FakeSource {
        fn new() -> Arc<Self> {
            Self::with_delay(Duration::ZERO)
        }

        fn with_delay(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                high: AtomicI32::new(80),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ForecastSource for FakeSource {
        async fn fetch_forecast(&self) -> Result<Vec<DailyWeatherRecord>, NetworkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(NetworkError::Status {
                    endpoint: "weather".to_string(),
                    status: 503,
                });
            }
            let mut records = default_dataset(ServiceInner::today(), Utc::now());
            for record in &mut records {
                record.temp_high = self.high.load(Ordering::SeqCst);
                record.is_real_time = true;
                record.conditions_label = "Clear Sky".to_string();
            }
            Ok(records)
        }
    }

    struct FailingStore;

    #[async_trait]
    impl WeatherStore for FailingStore {
        async fn fetch_all(&self) -> Result<Vec<WeatherRow>, PersistenceError> {
            Err(PersistenceError::Io("store offline".to_string()))
        }

        async fn get_by_id(&self, _id: u32) -> Result<WeatherRow, PersistenceError> {
            Err(PersistenceError::Io("store offline".to_string()))
        }

        async fn create(&self, _row: NewWeatherRow) -> Result<WeatherRow, PersistenceError> {
            Err(PersistenceError::Io("store offline".to_string()))
        }

        async fn update(&self, _id: u32, _row: NewWeatherRow) -> Result<WeatherRow, PersistenceError> {
            Err(PersistenceError::Io("store offline".to_string()))
        }

        async fn delete(&self, _id: u32) -> Result<(), PersistenceError> {
            Err(PersistenceError::Io("store offline".to_string()))
        }
    }

    fn quiet_config() -> WeatherConfig {
        WeatherConfig {
            refresh_enabled: false,
            persist_snapshots: false,
            ..Default::default()
        }
    }

    fn service(source: Arc<FakeSource>, store: Arc<dyn WeatherStore>) -> WeatherService {
        WeatherService::new(&quiet_config(), source, store)
    }

    fn stored_row(id: u32, date: NaiveDate, high: i32) -> WeatherRow {
        WeatherRow {
            id,
            date: date.format("%Y-%m-%d").to_string(),
            temp_high: high,
            temp_low: 50,
            precipitation: 10,
            conditions: "overcast clouds".to_string(),
            icon: "04d".to_string(),
            last_updated: None,
        }
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_remote_success_returns_five_sorted_live_records() {
        let source = FakeSource::new();
        let service = service(source.clone(), Arc::new(MemoryWeatherStore::new()));

        let retrieved = service.retrieve().await;

        assert_eq!(retrieved.tier, Tier::Remote);
        assert_eq!(retrieved.records.len(), 5);
        assert_eq!(retrieved.records[0].date, ServiceInner::today());
        assert!(retrieved.records.windows(2).all(|w| w[0].date < w[1].date));
        assert!(retrieved.records.iter().all(|r| r.is_real_time));
        assert!(service.is_data_fresh());
        assert!(service.get_last_update_time().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_within_window_uses_cache() {
        let source = FakeSource::new();
        let service = service(source.clone(), Arc::new(MemoryWeatherStore::new()));

        let first = service.get_current_forecast().await;
        tokio::time::advance(14 * MINUTE).await;
        let second = service.retrieve().await;

        assert_eq!(source.calls(), 1);
        assert_eq!(second.tier, Tier::FreshCache);
        assert_eq!(second.records, first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_cache_triggers_refetch() {
        let source = FakeSource::new();
        let service = service(source.clone(), Arc::new(MemoryWeatherStore::new()));

        service.get_current_forecast().await;
        tokio::time::advance(15 * MINUTE).await;
        assert!(!service.is_data_fresh());

        let retrieved = service.retrieve().await;

        assert_eq!(source.calls(), 2);
        assert_eq!(retrieved.tier, Tier::Remote);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_cache_served_unchanged_when_remote_fails() {
        let source = FakeSource::new();
        let store = Arc::new(MemoryWeatherStore::with_rows(vec![stored_row(
            1,
            ServiceInner::today(),
            60,
        )]));
        let service = service(source.clone(), store);

        let cached = service.get_current_forecast().await;
        tokio::time::advance(16 * MINUTE).await;
        source.set_failing(true);

        let retrieved = service.retrieve().await;

        assert_eq!(source.calls(), 2);
        assert_eq!(retrieved.tier, Tier::StaleCache);
        assert_eq!(retrieved.records, cached);
        // Staleness is reported by the tier, not by rewriting the records
        assert!(retrieved.records.iter().all(|r| r.is_real_time));
        assert!(!service.is_data_fresh());
    }

    #[tokio::test]
    async fn test_persistence_used_when_no_cache_and_remote_fails() {
        let source = FakeSource::new();
        source.set_failing(true);
        let today = ServiceInner::today();
        let store = Arc::new(MemoryWeatherStore::with_rows(vec![
            stored_row(1, today, 66),
            stored_row(2, today + chrono::Duration::days(1), 68),
            stored_row(3, today + chrono::Duration::days(2), 70),
        ]));
        let service = service(source.clone(), store);

        let retrieved = service.retrieve().await;

        assert_eq!(retrieved.tier, Tier::Persistence);
        assert_eq!(retrieved.records.len(), 5);
        let highs: Vec<i32> = retrieved.records.iter().map(|r| r.temp_high).collect();
        assert_eq!(highs, vec![66, 68, 70, 75, 75]);
        assert!(retrieved.records.iter().all(|r| !r.is_real_time));
        assert_eq!(retrieved.records[0].conditions_label, "Overcast Clouds");
        assert!(service.get_last_update_time().is_none());
    }

    #[tokio::test]
    async fn test_default_template_when_everything_fails() {
        let source = FakeSource::new();
        source.set_failing(true);
        let service = service(source.clone(), Arc::new(MemoryWeatherStore::new()));

        let retrieved = service.retrieve().await;

        assert_eq!(retrieved.tier, Tier::Default);
        assert_eq!(retrieved.records.len(), 5);
        let today = ServiceInner::today();
        for (offset, record) in retrieved.records.iter().enumerate() {
            assert_eq!(record.date, today + chrono::Duration::days(offset as i64));
            assert_eq!(record.temp_high, 75);
            assert_eq!(record.temp_low, 55);
            assert_eq!(record.precipitation_chance, 20);
            assert_eq!(record.conditions_label, "Partly Cloudy");
            assert!(!record.is_real_time);
        }
    }

    #[tokio::test]
    async fn test_store_error_falls_through_to_default() {
        let source = FakeSource::new();
        source.set_failing(true);
        let service = service(source.clone(), Arc::new(FailingStore));

        let retrieved = service.retrieve().await;

        assert_eq!(retrieved.tier, Tier::Default);
    }

    #[tokio::test]
    async fn test_degraded_results_are_not_cached() {
        let source = FakeSource::new();
        source.set_failing(true);
        let service = service(source.clone(), Arc::new(MemoryWeatherStore::new()));

        service.get_current_forecast().await;
        service.get_current_forecast().await;

        assert_eq!(source.calls(), 2);
        assert!(service.get_last_update_time().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_refresh_failure_keeps_cache() {
        let source = FakeSource::new();
        let service = service(source.clone(), Arc::new(MemoryWeatherStore::new()));
        let cached = service.get_current_forecast().await;
        let updated_at = service.get_last_update_time();

        source.set_failing(true);
        tokio::time::advance(MINUTE).await;
        let result = service.force_refresh().await;

        assert!(matches!(result, Err(NetworkError::Status { status: 503, .. })));
        assert_eq!(service.get_last_update_time(), updated_at);

        let retrieved = service.retrieve().await;
        assert_eq!(retrieved.tier, Tier::FreshCache);
        assert_eq!(retrieved.records, cached);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_fresh_cache() {
        let source = FakeSource::new();
        let service = service(source.clone(), Arc::new(MemoryWeatherStore::new()));
        service.get_current_forecast().await;

        source.high.store(95, Ordering::SeqCst);
        let refreshed = service.force_refresh().await.expect("Refresh should succeed");

        assert_eq!(source.calls(), 2);
        assert_eq!(refreshed[0].temp_high, 95);
        assert_eq!(service.get_current_forecast().await[0].temp_high, 95);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_one_fetch() {
        let source = FakeSource::with_delay(Duration::from_secs(2));
        let service = service(source.clone(), Arc::new(MemoryWeatherStore::new()));

        let (a, b, c) = tokio::join!(
            service.force_refresh(),
            service.get_current_forecast(),
            service.force_refresh()
        );

        assert_eq!(source.calls(), 1);
        let a = a.expect("Shared fetch should succeed");
        assert_eq!(a, b);
        assert_eq!(Ok(a), c);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_failure_reaches_every_waiter() {
        let source = FakeSource::with_delay(Duration::from_secs(2));
        source.set_failing(true);
        let service = service(source.clone(), Arc::new(MemoryWeatherStore::new()));

        let (a, b) = tokio::join!(service.force_refresh(), service.force_refresh());

        assert_eq!(source.calls(), 1);
        assert!(a.is_err());
        assert_eq!(a, b);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_fetch_after_completion_is_new() {
        let source = FakeSource::with_delay(Duration::from_secs(2));
        let service = service(source.clone(), Arc::new(MemoryWeatherStore::new()));

        service.force_refresh().await.expect("First fetch");
        service.force_refresh().await.expect("Second fetch");

        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_snapshots_upsert_by_date() {
        let source = FakeSource::new();
        let store = Arc::new(MemoryWeatherStore::new());
        let config = WeatherConfig {
            refresh_enabled: false,
            ..Default::default()
        };
        let service = WeatherService::new(&config, source.clone(), store.clone());

        service.force_refresh().await.expect("First fetch");
        source.high.store(91, Ordering::SeqCst);
        service.force_refresh().await.expect("Second fetch");

        let rows = store.fetch_all().await.unwrap();
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|row| row.temp_high == 91));
        assert!(rows.iter().all(|row| row.last_updated.is_some()));
    }

    #[tokio::test]
    async fn test_snapshot_failure_does_not_fail_fetch() {
        let source = FakeSource::new();
        let config = WeatherConfig {
            refresh_enabled: false,
            ..Default::default()
        };
        let service = WeatherService::new(&config, source.clone(), Arc::new(FailingStore));

        let result = service.force_refresh().await;

        assert!(result.is_ok());
        assert!(service.is_data_fresh());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_keeps_cache_warm() {
        let source = FakeSource::new();
        let config = WeatherConfig {
            persist_snapshots: false,
            ..Default::default()
        };
        let service = WeatherService::new(&config, source.clone(), Arc::new(MemoryWeatherStore::new()));
        let mut updates = service.take_updates().expect("Updates available once");
        assert!(service.take_updates().is_none());

        tokio::time::sleep(15 * MINUTE + Duration::from_secs(1)).await;
        settle().await;

        assert_eq!(source.calls(), 1);
        assert!(service.is_data_fresh());
        assert_eq!(updates.try_recv().ok(), Some(RefreshMessage::RefreshStarted));
        assert!(matches!(updates.try_recv(), Ok(RefreshMessage::ForecastUpdated(_))));

        // The scheduled fetch already filled the cache
        let retrieved = service.retrieve().await;
        assert_eq!(retrieved.tier, Tier::FreshCache);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_failure_does_not_cascade() {
        let source = FakeSource::new();
        let store = Arc::new(MemoryWeatherStore::with_rows(vec![stored_row(
            1,
            ServiceInner::today(),
            60,
        )]));
        let config = WeatherConfig {
            persist_snapshots: false,
            ..Default::default()
        };
        let service = WeatherService::new(&config, source.clone(), store);
        let cached = service.get_current_forecast().await;

        source.set_failing(true);
        tokio::time::sleep(15 * MINUTE + Duration::from_secs(1)).await;
        settle().await;

        assert_eq!(source.calls(), 2);
        let entry = service.inner.cache.read().expect("Cache kept");
        assert_eq!(entry.dataset, cached);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_background_refresh() {
        let source = FakeSource::new();
        let config = WeatherConfig {
            persist_snapshots: false,
            ..Default::default()
        };
        let service = WeatherService::new(&config, source.clone(), Arc::new(MemoryWeatherStore::new()));
        settle().await;
        assert!(service.is_refreshing());

        service.dispose();
        service.dispose();
        tokio::time::sleep(60 * MINUTE).await;
        settle().await;

        assert!(!service.is_refreshing());
        assert_eq!(source.calls(), 0);
    }

    fn scheduled_service(source: Arc<FakeSource>) -> WeatherService {
        let config = WeatherConfig {
            persist_snapshots: false,
            ..Default::default()
        };
        WeatherService::new(&config, source, Arc::new(MemoryWeatherStore::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_service_mid_fetch_releases_it_when_fetch_ends() {
        let source = FakeSource::with_delay(Duration::from_secs(30));
        let service = scheduled_service(source.clone());
        let inner = Arc::downgrade(&service.inner);

        // The first scheduled fetch is now waiting on the provider
        tokio::time::sleep(15 * MINUTE + Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(source.calls(), 1);

        drop(service);
        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;

        assert_eq!(inner.strong_count(), 0);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_refresh_after_dispose_mid_fetch_calls_provider() {
        let source = FakeSource::with_delay(Duration::from_secs(30));
        let service = scheduled_service(source.clone());

        tokio::time::sleep(15 * MINUTE + Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(source.calls(), 1);

        service.dispose();
        tokio::time::sleep(60 * MINUTE).await;
        settle().await;

        // The abandoned scheduled fetch still finished and filled the cache
        assert!(service.get_last_update_time().is_some());

        let result = service.force_refresh().await;

        assert!(result.is_ok());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_caller_does_not_cancel_shared_fetch() {
        let source = FakeSource::with_delay(Duration::from_secs(30));
        let service = service(source.clone(), Arc::new(MemoryWeatherStore::new()));

        let cancelled = tokio::time::timeout(Duration::from_secs(5), service.force_refresh()).await;
        assert!(cancelled.is_err());

        let joined = service.force_refresh().await;

        assert!(joined.is_ok());
        assert_eq!(source.calls(), 1);
        assert!(service.is_data_fresh());
    }

    #[test]
    fn test_tier_degradation() {
        assert!(!Tier::FreshCache.is_degraded());
        assert!(!Tier::Remote.is_degraded());
        assert!(Tier::StaleCache.is_degraded());
        assert!(Tier::Persistence.is_degraded());
        assert!(Tier::Default.is_degraded());
    }
}
