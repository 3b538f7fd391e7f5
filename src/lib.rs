//! Farmcast Library
//!
//! The weather panel of the farm dashboard: a five-day forecast that is cached,
//! refreshed in the background and always available, even when the provider
//! is not. The binary is a thin terminal front end over [`service::WeatherService`].

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod refresh;
pub mod report;
pub mod service;
pub mod ui;
