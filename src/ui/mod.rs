//! UI rendering module for Farmcast
//!
//! This module contains all the rendering logic for the terminal user interface,
//! using the ratatui library for TUI components.

pub mod forecast;
pub mod help_overlay;
pub mod widgets;

pub use forecast::render as render_forecast;
pub use help_overlay::render as render_help_overlay;
