//! Cache Entry Module
//!
//! Defines the payload record handed back by a cache store and the
//! freshness policy the coalescing engine applies to it.

use std::time::Duration;

use axum::body::Bytes;
use chrono::{DateTime, Utc};

// == Cache Entry ==
/// A cached payload together with the time it was written.
///
/// `stored_at` is always the write time, never the read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Serialized JSON payload
    pub payload: Bytes,
    /// When the payload was written to the store
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self::stored_at(payload, Utc::now())
    }

    /// Creates an entry with an explicit write time.
    pub fn stored_at(payload: impl Into<Bytes>, stored_at: DateTime<Utc>) -> Self {
        Self {
            payload: payload.into(),
            stored_at,
        }
    }

    // == Age ==
    /// Time elapsed since the entry was written.
    ///
    /// Entries stamped in the future (clock skew between proxies) have zero age.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.stored_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    // == Is Stale ==
    /// True once the entry is strictly older than `stale_after`.
    pub fn is_stale(&self, stale_after: Duration) -> bool {
        self.age() > stale_after
    }
}

// == Cache Policy ==
/// TTL and staleness threshold for one cached lookup.
///
/// `stale_after` must be below `ttl` for a background refresh to ever fire
/// before the store itself expires the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub stale_after: Duration,
}

impl CachePolicy {
    pub fn new(ttl: Duration, stale_after: Duration) -> Self {
        Self { ttl, stale_after }
    }
}
