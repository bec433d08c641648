//! Cache Module
//!
//! Cache store capability, its backends, and the coalescing read-through
//! engine layered on top.

mod backend;
mod coalesce;
mod entry;
pub mod inflight;
mod memory;
mod recency;
mod redis_store;
mod store;

// Re-export public types
pub use backend::CacheBackend;
pub use coalesce::{CoalescingCache, Lookup, RefreshHandle, REFRESH_SUFFIX};
pub use entry::{CacheEntry, CachePolicy};
pub use inflight::InflightRegistry;
pub use memory::MemoryStore;
pub(crate) use recency::RecencyIndex;
pub use redis_store::RedisStore;
pub use store::{CacheStore, NoopStore};

// == Public Constants ==
/// Cache URL selecting the in-process store
pub const MEMORY_CACHE_URL: &str = "memory://";
