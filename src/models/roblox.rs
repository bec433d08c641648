//! Upstream DTOs
//!
//! Shapes of the Roblox web API responses the member handler consumes.
//! Missing fields default so partial upstream payloads still decode.

use serde::Deserialize;

/// `GET users/v1/users/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserResponse {
    pub description: String,
    pub created: String,
    pub is_banned: bool,
    pub id: i64,
    pub name: String,
    pub display_name: String,
}

/// `GET thumbnails/v1/users/avatar-bust`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AvatarResponse {
    pub data: Vec<AvatarImage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AvatarImage {
    pub image_url: String,
}

impl AvatarResponse {
    /// URL of the first image, empty when none was returned.
    pub fn first_url(self) -> String {
        self.data
            .into_iter()
            .next()
            .map(|image| image.image_url)
            .unwrap_or_default()
    }
}

/// `GET apis/search-api/omni-search`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchResponse {
    pub search_results: Vec<SearchGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchGroup {
    pub contents: Vec<SearchContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchContent {
    pub content_id: i64,
    pub username: String,
}

impl SearchResponse {
    /// Contents of the first result group.
    pub fn into_first_contents(self) -> Vec<SearchContent> {
        self.search_results
            .into_iter()
            .next()
            .map(|group| group.contents)
            .unwrap_or_default()
    }
}
