//! API Module
//!
//! HTTP handlers and routing for both proxy roles.
//!
//! # Surfaces
//! - member: `?userId=`, `?search=`, otherwise passthrough to a member target
//! - provider: round-robin passthrough to provider targets

pub mod handlers;
pub mod routes;

pub use handlers::{member_handler, provider_handler, LookupParams, MemberState, ProviderState};
pub use routes::{create_member_router, create_provider_router, PROXY_ROLE_HEADER};
