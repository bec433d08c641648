//! Routing Module
//!
//! Upstream targets, deterministic selection for the member role, and the
//! round-robin pool used by the provider role.

mod pool;
mod selector;
mod target;

#[cfg(test)]
mod property_tests;

pub use pool::ProviderPool;
pub use selector::{fnv1a_32, routing_key, select, TargetSelector};
pub use target::{join_url_path, Target, DIRECT_SENTINEL};
