//! Roblox Proxy - A clustering reverse proxy for the Roblox web API
//!
//! Shards traffic across member clusters by FNV-1a modulo selection and
//! shields the upstream with a coalescing, stale-while-revalidate cache.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod proxy;
pub mod routing;
pub mod tasks;
pub mod upstream;

pub use api::{create_member_router, create_provider_router, MemberState, ProviderState};
pub use config::{Config, Role};
pub use tasks::spawn_cleanup_task;
