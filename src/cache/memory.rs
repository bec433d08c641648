//! Memory Store Module
//!
//! In-process cache store combining HashMap storage with recency tracking
//! and TTL expiration. Suited to single-node runs and tests.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Bytes;
use tokio::sync::RwLock;

use crate::cache::{CacheEntry, CacheStore, RecencyIndex};
use crate::error::StoreError;

/// A stored entry plus its expiry deadline.
#[derive(Debug, Clone)]
struct Slot {
    entry: CacheEntry,
    expires_at: Instant,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    slots: HashMap<String, Slot>,
    recency: RecencyIndex,
}

impl MemoryState {
    fn remove(&mut self, key: &str) {
        self.slots.remove(key);
        self.recency.remove(key);
    }
}

// == Memory Store ==
/// Capacity-bounded in-process store with LRU eviction.
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    max_entries: usize,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates a store holding at most `max_entries` keys (minimum one).
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            max_entries: max_entries.max(1),
        }
    }

    // == Insert Entry ==
    /// Writes a prepared entry, keeping its `stored_at` as given.
    ///
    /// If the store is at capacity, the least recently used key is evicted.
    pub async fn insert_entry(&self, key: &str, entry: CacheEntry, ttl: Duration) {
        let mut state = self.state.write().await;

        if !state.slots.contains_key(key) && state.slots.len() >= self.max_entries {
            if let Some(evicted) = state.recency.evict_oldest() {
                state.slots.remove(&evicted);
                tracing::debug!(key = %evicted, "memory store evicted entry");
            }
        }

        state.slots.insert(
            key.to_string(),
            Slot {
                entry,
                expires_at: Instant::now() + ttl,
            },
        );
        state.recency.touch(key);
    }

    // == Cleanup Expired ==
    /// Removes all expired entries and returns how many were dropped.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.write().await;

        let expired: Vec<String> = state
            .slots
            .iter()
            .filter(|(_, slot)| slot.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.remove(key);
        }

        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let now = Instant::now();
        // Write lock: a hit updates recency, an expired hit is removed.
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let Some(slot) = state.slots.get(key) else {
            return Ok(None);
        };

        if slot.is_expired(now) {
            state.remove(key);
            return Ok(None);
        }

        let entry = slot.entry.clone();
        state.recency.touch(key);
        Ok(Some(entry))
    }

    async fn set(&self, key: &str, payload: Bytes, ttl: Duration) -> Result<(), StoreError> {
        self.insert_entry(key, CacheEntry::new(payload), ttl).await;
        Ok(())
    }
}
