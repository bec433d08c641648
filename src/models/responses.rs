//! Response DTOs for the member handler
//!
//! Defines the JSON bodies cached and returned to clients.

use serde::{Deserialize, Serialize};

use super::UserResponse;

/// Body of an entity lookup (`?userId=`)
///
/// Field order is part of the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub description: String,
    pub created: String,
    pub is_banned: bool,
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub avatar_url: String,
}

impl UserProfile {
    /// Merges a user record with its avatar URL.
    pub fn new(user: UserResponse, avatar_url: String) -> Self {
        Self {
            description: user.description,
            created: user.created,
            is_banned: user.is_banned,
            id: user.id,
            name: user.name,
            display_name: user.display_name,
            avatar_url,
        }
    }
}

/// One element of a search response (`?search=`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntry {
    pub player_id: String,
    pub name: String,
    pub avatar_url: String,
}

/// Cached avatar record stored under `roblox:avatar:<id>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvatarPayload {
    pub url: String,
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
