//! Cache backend selection
//!
//! Maps the configured cache URL onto a store:
//! - empty: caching disabled ([`NoopStore`])
//! - `memory://`: bounded in-process store swept by a background task
//! - anything else: redis, falling back to disabled caching when unreachable

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use super::{CacheStore, MemoryStore, NoopStore, RedisStore, MEMORY_CACHE_URL};

/// Store chosen at startup.
#[derive(Clone)]
pub enum CacheBackend {
    Disabled,
    Memory(Arc<MemoryStore>),
    Redis(RedisStore),
}

impl CacheBackend {
    /// Opens the backend named by `cache_url`.
    ///
    /// # Arguments
    /// * `cache_url` - Connection string, trimmed by the caller
    /// * `store_timeout` - Deadline of each redis call
    /// * `memory_max_entries` - Capacity of the in-process store
    pub async fn open(cache_url: &str, store_timeout: Duration, memory_max_entries: usize) -> Self {
        if cache_url.is_empty() {
            info!("cache disabled");
            return CacheBackend::Disabled;
        }

        if cache_url.eq_ignore_ascii_case(MEMORY_CACHE_URL) {
            info!(max_entries = memory_max_entries, "using in-process cache store");
            return CacheBackend::Memory(Arc::new(MemoryStore::new(memory_max_entries)));
        }

        match RedisStore::connect(cache_url, store_timeout).await {
            Ok(store) => {
                info!("connected to redis cache store");
                CacheBackend::Redis(store)
            }
            Err(err) => {
                error!(error = %err, "redis unavailable, caching disabled");
                CacheBackend::Disabled
            }
        }
    }

    /// The store handed to the coalescing engine.
    pub fn store(&self) -> Arc<dyn CacheStore> {
        match self {
            CacheBackend::Disabled => Arc::new(NoopStore),
            CacheBackend::Memory(store) => store.clone(),
            CacheBackend::Redis(store) => Arc::new(store.clone()),
        }
    }

    /// In-process store needing a cleanup task, if that is the backend.
    pub fn memory(&self) -> Option<Arc<MemoryStore>> {
        match self {
            CacheBackend::Memory(store) => Some(Arc::clone(store)),
            _ => None,
        }
    }
}
