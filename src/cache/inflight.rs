//! In-flight Registry Module
//!
//! Key-indexed registry of pending fetches. Callers asking for a key that is
//! already being fetched join the existing computation instead of starting
//! their own. Slots live exactly as long as their fetch.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};

use crate::error::FetchError;

/// Result shared between every waiter of one fetch.
pub type FetchResult = Result<Bytes, FetchError>;

/// A fetch that any number of waiters can await.
pub type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Whether a caller started the computation or joined one in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Leader,
    Joined,
}

// == Inflight Registry ==
/// Owned map of key -> pending shared fetch.
///
/// Holds weak handles only, so when every waiter of a fetch is dropped the
/// computation is dropped with them. A fetch clears its own slot both when it
/// completes and when it is dropped unfinished.
#[derive(Default)]
pub struct InflightRegistry {
    calls: DashMap<String, Slot>,
    next_id: AtomicU64,
}

/// Registered fetch plus the id its guard uses to recognise it.
struct Slot {
    id: u64,
    fetch: WeakShared<BoxFuture<'static, FetchResult>>,
}

/// Removes its fetch's slot when the fetch finishes or is dropped.
///
/// Matches on id so a replacement slot for the same key is left alone.
struct SlotGuard {
    registry: Arc<InflightRegistry>,
    key: String,
    id: u64,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.registry
            .calls
            .remove_if(&self.key, |_, slot| slot.id == self.id);
    }
}

impl InflightRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // == Join ==
    /// Returns the in-flight fetch for `key`, starting one from `start` if none is live.
    ///
    /// `start` is only invoked by the leader, so at most one computation per
    /// key is ever outstanding.
    pub fn join<F, Fut>(self: &Arc<Self>, key: &str, start: F) -> (SharedFetch, Admission)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        match self.calls.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if let Some(live) = entry.get().fetch.upgrade() {
                    return (live, Admission::Joined);
                }
                let (fetch, slot) = self.launch(key, start);
                if let Some(slot) = slot {
                    entry.insert(slot);
                }
                (fetch, Admission::Leader)
            }
            Entry::Vacant(entry) => {
                let (fetch, slot) = self.launch(key, start);
                if let Some(slot) = slot {
                    entry.insert(slot);
                }
                (fetch, Admission::Leader)
            }
        }
    }

    fn launch<F, Fut>(self: &Arc<Self>, key: &str, start: F) -> (SharedFetch, Option<Slot>)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let work = start();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let guard = SlotGuard {
            registry: Arc::clone(self),
            key: key.to_string(),
            id,
        };

        let fetch = async move {
            let result = work.await;
            // Later callers must start a fresh fetch.
            drop(guard);
            result
        }
        .boxed()
        .shared();

        let slot = fetch.downgrade().map(|weak| Slot { id, fetch: weak });
        (fetch, slot)
    }

    /// Number of keys with a registered fetch.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// True while a live fetch is registered for `key`.
    pub fn is_pending(&self, key: &str) -> bool {
        // Upgrade outside the map guard: dropping the last handle runs SlotGuard.
        let live = self.calls.get(key).and_then(|slot| slot.fetch.upgrade());
        live.is_some()
    }
}
