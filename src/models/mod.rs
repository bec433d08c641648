//! Request and Response models for the proxy
//!
//! Upstream API shapes and the JSON bodies the member handler returns.

pub mod roblox;
pub mod responses;

// Re-export commonly used types
pub use roblox::{AvatarResponse, SearchContent, SearchResponse, UserResponse};
pub use responses::{AvatarPayload, ErrorResponse, SearchEntry, UserProfile};
