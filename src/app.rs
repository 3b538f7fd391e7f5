//! Application state management for Farmcast
//!
//! This module contains the main application state, handling keyboard input,
//! forecast loading, and messages from the background refresh.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use tokio::sync::mpsc;

use crate::data::{todays_record, DailyWeatherRecord};
use crate::refresh::RefreshMessage;
use crate::service::{Tier, WeatherService};

/// Application state enum representing the current view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    /// Initial loading state while fetching data
    Loading,
    /// Five-day outlook with the selected day expanded
    Forecast,
}

/// Status line severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Error,
}

/// One-line message shown in the footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusMessage {
    fn info(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            text: text.into(),
        }
    }
}

/// Main application struct managing state and data
pub struct App {
    /// Current application state/view
    pub state: AppState,
    /// Records currently on screen
    pub forecast: Vec<DailyWeatherRecord>,
    /// Source of the records on screen
    pub tier: Option<Tier>,
    /// When the cache was last filled from the provider
    pub last_update: Option<DateTime<Utc>>,
    /// Footer message from the last refresh
    pub status: Option<StatusMessage>,
    /// Index of the expanded day
    pub selected_day: usize,
    /// Flag to show help overlay
    pub show_help: bool,
    /// Flag indicating a refresh has been requested
    pub refresh_requested: bool,
    /// A background refresh is in progress
    pub refreshing: bool,
    /// Flag indicating the application should quit
    pub should_quit: bool,
    service: Arc<WeatherService>,
    updates: Option<mpsc::Receiver<RefreshMessage>>,
}

impl App {
    /// Creates a new App in the loading state
    ///
    /// Takes the service's background refresh receiver, if nobody else has.
    pub fn new(service: Arc<WeatherService>) -> Self {
        let updates = service.take_updates();
        Self {
            state: AppState::Loading,
            forecast: Vec::new(),
            tier: None,
            last_update: None,
            status: None,
            selected_day: 0,
            show_help: false,
            refresh_requested: false,
            refreshing: false,
            should_quit: false,
            service,
            updates,
        }
    }

    /// Returns the expanded day, if any data is loaded
    pub fn selected_record(&self) -> Option<&DailyWeatherRecord> {
        self.forecast.get(self.selected_day)
    }

    /// Whether the service still considers its cache fresh
    pub fn is_data_fresh(&self) -> bool {
        self.service.is_data_fresh()
    }

    /// Loads the forecast through the normal fallback chain
    ///
    /// Transitions to Forecast state when complete.
    pub async fn load_forecast(&mut self) {
        let retrieved = self.service.retrieve().await;
        self.show_records(retrieved.records, retrieved.tier);
        self.state = AppState::Forecast;
    }

    /// Forces a provider fetch, keeping the current forecast on failure
    pub async fn refresh(&mut self) {
        self.refresh_requested = false;
        match self.service.force_refresh().await {
            Ok(records) => {
                self.show_records(records, Tier::Remote);
                self.status = Some(StatusMessage::info("Forecast refreshed"));
            }
            Err(e) => {
                self.status = Some(StatusMessage::error(format!("Refresh failed: {}", e)));
            }
        }
        self.state = AppState::Forecast;
    }

    /// Applies every message the background refresh has sent so far
    pub fn drain_updates(&mut self) {
        let mut messages = Vec::new();
        if let Some(updates) = self.updates.as_mut() {
            while let Ok(message) = updates.try_recv() {
                messages.push(message);
            }
        }
        for message in messages {
            self.apply_refresh_message(message);
        }
    }

    /// Updates the view for one background refresh message
    pub fn apply_refresh_message(&mut self, message: RefreshMessage) {
        match message {
            RefreshMessage::RefreshStarted => {
                self.refreshing = true;
            }
            RefreshMessage::ForecastUpdated(records) => {
                self.show_records(records, Tier::Remote);
                self.status = None;
                self.state = AppState::Forecast;
            }
            RefreshMessage::RefreshError(e) => {
                self.status = Some(StatusMessage::error(format!("Auto-refresh failed: {}", e)));
            }
            RefreshMessage::RefreshCompleted => {
                self.refreshing = false;
            }
        }
    }

    fn show_records(&mut self, records: Vec<DailyWeatherRecord>, tier: Tier) {
        self.forecast = records;
        self.tier = Some(tier);
        self.last_update = self.service.get_last_update_time();
        if self.selected_day >= self.forecast.len() {
            self.selected_day = self.today_index();
        }
    }

    /// Index of today's record, or the first record
    fn today_index(&self) -> usize {
        todays_record(&self.forecast, Local::now().date_naive())
            .and_then(|today| self.forecast.iter().position(|record| record.date == today.date))
            .unwrap_or(0)
    }

    /// Handles keyboard input and updates state accordingly
    ///
    /// # Key Bindings
    /// - `q` or `Esc`: Quit the application
    /// - `Left`/`h`, `Right`/`l`: Select previous/next day
    /// - `Home`: Select today
    /// - `r`: Force a refresh from the provider
    /// - `?`: Toggle help
    pub fn handle_key(&mut self, key_event: KeyEvent) {
        // Help overlay intercepts all keys when shown
        if self.show_help {
            if matches!(
                key_event.code,
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')
            ) {
                self.show_help = false;
            }
            return;
        }

        match self.state {
            AppState::Loading => {
                if matches!(key_event.code, KeyCode::Char('q') | KeyCode::Esc) {
                    self.should_quit = true;
                }
            }
            AppState::Forecast => match key_event.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    self.should_quit = true;
                }
                KeyCode::Left | KeyCode::Char('h') => {
                    self.select_previous_day();
                }
                KeyCode::Right | KeyCode::Char('l') => {
                    self.select_next_day();
                }
                KeyCode::Home => {
                    self.selected_day = self.today_index();
                }
                KeyCode::Char('r') => {
                    self.refresh_requested = true;
                }
                KeyCode::Char('?') => {
                    self.show_help = true;
                }
                _ => {}
            },
        }
    }

    fn select_previous_day(&mut self) {
        self.selected_day = self.selected_day.saturating_sub(1);
    }

    fn select_next_day(&mut self) {
        if self.selected_day + 1 < self.forecast.len() {
            self.selected_day += 1;
        }
    }
}
