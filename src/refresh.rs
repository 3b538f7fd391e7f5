//! Background forecast refresh
//!
//! Keeps the forecast cache warm by re-fetching on a fixed period, independent
//! of whether anyone is asking for the forecast. Progress is reported over a
//! tokio channel so the front end can redraw when new data lands.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::data::{DailyWeatherRecord, NetworkError};

/// Messages sent from the background refresh to the front end
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshMessage {
    /// Refresh started
    RefreshStarted,
    /// A fresh forecast was fetched and cached
    ForecastUpdated(Vec<DailyWeatherRecord>),
    /// The fetch failed; the cached forecast was left as it was
    RefreshError(String),
    /// Refresh completed
    RefreshCompleted,
}

/// Configuration for the refresh timer
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Time between refreshes
    pub interval: Duration,
    /// Whether auto-refresh is enabled
    pub enabled: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            enabled: true,
        }
    }
}

/// Whatever the timer refreshes on each tick
#[async_trait]
pub trait RefreshTarget: Send + Sync + 'static {
    /// Fetches a fresh forecast and stores it on success
    async fn refresh(&self) -> Result<Vec<DailyWeatherRecord>, NetworkError>;
}

/// Handle owning the background refresh task
///
/// The task is stopped exactly once: by [`RefreshHandle::shutdown`] or, failing
/// that, when the handle is dropped.
#[derive(Debug)]
pub struct RefreshHandle {
    /// Signals the loop to exit; taken on the first stop
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// The spawned loop, absent when refresh is disabled
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Spawns the refresh loop on the current tokio runtime
    ///
    /// The first refresh happens one full `interval` after spawning; the
    /// immediate tick is skipped because callers fetch on demand at startup.
    pub fn spawn(
        config: RefreshConfig,
        target: Arc<dyn RefreshTarget>,
        updates: mpsc::Sender<RefreshMessage>,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        if !config.enabled {
            debug!("Background weather refresh disabled");
            return Self {
                shutdown_tx: Some(shutdown_tx),
                task: None,
            };
        }

        let period = config.interval;
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Skip the first tick (immediate)
            interval.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                    _ = interval.tick() => {
                        notify(&updates, RefreshMessage::RefreshStarted);

                        match target.refresh().await {
                            Ok(records) => {
                                info!(records = records.len(), "Background weather refresh succeeded");
                                notify(&updates, RefreshMessage::ForecastUpdated(records));
                            }
                            Err(e) => {
                                warn!(error = %e, "Background weather refresh failed, keeping cached forecast");
                                notify(&updates, RefreshMessage::RefreshError(e.to_string()));
                            }
                        }

                        notify(&updates, RefreshMessage::RefreshCompleted);
                    }
                }
            }
            debug!("Background weather refresh stopped");
        });

        Self {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Whether the loop has not been stopped yet
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Shuts down the background refresh task
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(shutdown_tx) = self.shutdown_tx.take() else {
            return;
        };
        let _ = shutdown_tx.try_send(());
        if let Some(task) = self.task.take() {
            // Stops waiting on an in-progress fetch; the fetch itself runs to completion
            task.abort();
        }
        debug!("Background weather refresh cancelled");
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sends without waiting; a slow or absent reader must not stall the timer
fn notify(updates: &mpsc::Sender<RefreshMessage>, message: RefreshMessage) {
    let _ = updates.try_send(message);
}
