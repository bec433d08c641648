//! Cache Store Module
//!
//! The narrow Get/Set capability the coalescing engine consumes, plus the
//! no-op implementation used when caching is disabled.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;

use crate::cache::CacheEntry;
use crate::error::StoreError;

// == Cache Store ==
/// Opaque key/value store of payloads with a write timestamp and TTL.
///
/// Implementations own expiry; the engine only reads and writes. A single
/// key's value must be read and written atomically.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Name for logs, e.g. "redis".
    fn name(&self) -> &'static str;

    /// Returns the entry for `key`, `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError>;

    /// Writes `payload` under `key`, stamping it with the current time.
    async fn set(&self, key: &str, payload: Bytes, ttl: Duration) -> Result<(), StoreError>;
}

// == Noop Store ==
/// Store that never holds anything; every lookup is a miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

#[async_trait]
impl CacheStore for NoopStore {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn get(&self, _key: &str) -> Result<Option<CacheEntry>, StoreError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _payload: Bytes, _ttl: Duration) -> Result<(), StoreError> {
        Ok(())
    }
}
