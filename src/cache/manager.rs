//! Expiring cache for serialized responses
//!
//! Provides an `ExpiringCache` that stores byte payloads keyed by string with an
//! absolute expiry instant, guarded by a readers-writer lock.

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Default TTL used by the server when none is configured
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// A cached payload together with the instant it stops being served
#[derive(Debug, Clone)]
struct CacheEntry {
    /// The cached bytes
    payload: Bytes,
    /// When the cache entry expires
    expires_at: Instant,
}

/// In-memory key/value store with a fixed TTL
///
/// Many readers may call [`ExpiringCache::get`] at once; [`ExpiringCache::set`]
/// takes the table exclusively. There is no capacity bound and no eviction
/// task: an expired entry occupies memory until its key is written again.
#[derive(Debug)]
pub struct ExpiringCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl Default for ExpiringCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ExpiringCache {
    /// Creates an empty cache whose entries live for `ttl` after each write
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the TTL applied on every write
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Reads the payload stored under `key`
    ///
    /// Returns `None` for unknown keys and for entries whose expiry has passed.
    /// The returned `Bytes` is a cheap view; the entry itself never leaves the table.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;

        if Instant::now() > entry.expires_at {
            return None;
        }

        Some(entry.payload.clone())
    }

    /// Inserts or overwrites the entry for `key`, resetting its expiry to now + TTL
    pub fn set(&self, key: impl Into<String>, payload: impl Into<Bytes>) {
        let entry = CacheEntry {
            payload: payload.into(),
            expires_at: Instant::now() + self.ttl,
        };

        self.entries.write().insert(key.into(), entry);
    }

    /// Number of entries in the table, expired ones included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the table holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
