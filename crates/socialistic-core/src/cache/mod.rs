//! Local caching module for slowly-changing data.
//!
//! This module provides the `CacheManager` for storing the programming
//! language catalog and the last fetched feed page. Data is cached in JSON
//! format and considered stale after 60 minutes.

pub mod manager;

pub use manager::{CacheManager, CachedData};
