//! Cache module for storing serialized responses in memory
//!
//! This module provides an expiring cache that maps an opaque string key to a
//! byte payload with a fixed TTL (time-to-live). Expired entries are hidden on
//! read but never swept; they stay in the table until the same key is written
//! again.

mod manager;

pub use manager::ExpiringCache;
