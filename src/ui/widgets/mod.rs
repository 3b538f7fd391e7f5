//! Reusable widgets

pub mod precipitation_bar;

pub use precipitation_bar::PrecipitationBar;
