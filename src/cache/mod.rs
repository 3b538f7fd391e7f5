//! Cache module for the latest fetched forecast
//!
//! This module provides a single-entry, in-memory store for the most recent
//! successful remote fetch. Freshness is judged by the caller against the
//! entry's age; a stale entry is still returned so the service can serve it
//! when the provider is down.

mod store;

pub use store::{CacheEntry, CacheStore};
