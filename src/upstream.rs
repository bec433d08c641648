//! Upstream API client
//!
//! Issues the JSON lookups behind the member role's cached endpoints. Every
//! call is routed through the same target selector as passthrough traffic,
//! so a lookup for `/users/v1/users/5` lands on the same cluster a raw request
//! for that path would.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::header;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Config;
use crate::error::FetchError;
use crate::models::{AvatarPayload, AvatarResponse, SearchContent, SearchResponse, UserProfile, UserResponse};
use crate::routing::TargetSelector;

/// User-Agent sent on API lookups.
pub const USER_AGENT: &str = "RobloxProxyCluster/1.0";

/// Thumbnail size embedded in entity lookups.
pub const PROFILE_AVATAR_SIZE: &str = "48x48";

/// Thumbnail size used for search results.
pub const SEARCH_AVATAR_SIZE: &str = "420x420";

/// Builds the shared upstream HTTP client from the pool settings.
///
/// No default User-Agent is set so passthrough requests keep the client's own.
pub fn build_http_client(config: &Config) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build()
}

// == Roblox Client ==
/// JSON client for the Roblox web API.
#[derive(Debug, Clone)]
pub struct RobloxClient {
    http: reqwest::Client,
    selector: TargetSelector,
    request_timeout: Duration,
}

impl RobloxClient {
    pub fn new(http: reqwest::Client, selector: TargetSelector, request_timeout: Duration) -> Self {
        Self {
            http,
            selector,
            request_timeout,
        }
    }

    /// GETs `/{service}/{path}?{params}` on the selected target and decodes the body.
    ///
    /// # Arguments
    /// * `service` - First path segment, the API subdomain for direct targets
    /// * `path` - Remainder of the path, without a leading slash
    /// * `params` - Query pairs, form-encoded in order
    pub async fn fetch_json<T>(
        &self,
        service: &str,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let request_path = format!("/{service}/{path}");
        let query = (!params.is_empty()).then(|| {
            url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params)
                .finish()
        });
        let url = self.selector.resolve(&request_path, query.as_deref())?;

        debug!(%url, "roblox api request");

        let response = self
            .http
            .get(url)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, "application/json")
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.to_string()));
        }

        Ok(response.json::<T>().await?)
    }

    pub async fn user(&self, user_id: &str) -> Result<UserResponse, FetchError> {
        self.fetch_json("users", &format!("v1/users/{user_id}"), &[])
            .await
    }

    /// First avatar bust thumbnail URL for `user_id`, empty when none exists.
    pub async fn avatar_url(&self, user_id: &str, size: &str) -> Result<String, FetchError> {
        let avatar: AvatarResponse = self
            .fetch_json(
                "thumbnails",
                "v1/users/avatar-bust",
                &[
                    ("userIds", user_id),
                    ("size", size),
                    ("format", "Png"),
                    ("isCircular", "false"),
                ],
            )
            .await?;
        Ok(avatar.first_url())
    }

    /// Contents of the first user result group for `query`.
    pub async fn search_users(&self, query: &str) -> Result<Vec<SearchContent>, FetchError> {
        let search: SearchResponse = self
            .fetch_json(
                "apis",
                "search-api/omni-search",
                &[
                    ("verticalType", "user"),
                    ("searchQuery", query),
                    ("globalSessionId", "TridentBot"),
                    ("sessionId", "TridentBot"),
                ],
            )
            .await?;
        Ok(search.into_first_contents())
    }

    // == Cacheable Payloads ==
    /// Serialized [`UserProfile`]; user record and avatar are fetched concurrently.
    pub async fn profile_payload(&self, user_id: &str) -> Result<Bytes, FetchError> {
        let (user, avatar_url) = tokio::try_join!(
            self.user(user_id),
            self.avatar_url(user_id, PROFILE_AVATAR_SIZE)
        )?;
        let body = serde_json::to_vec(&UserProfile::new(user, avatar_url))?;
        Ok(Bytes::from(body))
    }

    /// Serialized [`AvatarPayload`] for a search result.
    pub async fn avatar_payload(&self, user_id: &str) -> Result<Bytes, FetchError> {
        let url = self.avatar_url(user_id, SEARCH_AVATAR_SIZE).await?;
        let body = serde_json::to_vec(&AvatarPayload { url })?;
        Ok(Bytes::from(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Target;
    use wiremock::matchers::{header as header_eq, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> RobloxClient {
        let selector = TargetSelector::new(vec![Target::parse(&server.uri()).unwrap()], "roblox.com");
        RobloxClient::new(reqwest::Client::new(), selector, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_profile_payload_merges_avatar() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/v1/users/5"))
            .and(header_eq("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "description": "hi",
                "created": "2020-01-01T00:00:00Z",
                "isBanned": false,
                "id": 5,
                "name": "five",
                "displayName": "Five"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/thumbnails/v1/users/avatar-bust"))
            .and(query_param("userIds", "5"))
            .and(query_param("size", PROFILE_AVATAR_SIZE))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"imageUrl": "http://img/5.png"}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let payload = client.profile_payload("5").await.unwrap();
        let profile: UserProfile = serde_json::from_slice(&payload).unwrap();

        assert_eq!(profile.id, 5);
        assert_eq!(profile.display_name, "Five");
        assert_eq!(profile.avatar_url, "http://img/5.png");
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/v1/users/404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.user("404").await.unwrap_err();
        assert_eq!(err.to_string(), "roblox request failed: 404 Not Found");
    }

    #[tokio::test]
    async fn test_search_users_encodes_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apis/search-api/omni-search"))
            .and(query_param("searchQuery", "two words"))
            .and(query_param("verticalType", "user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "searchResults": [{"contents": [{"contentId": 9, "username": "nine"}]}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let contents = client.search_users("two words").await.unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].content_id, 9);
    }

    #[tokio::test]
    async fn test_undecodable_body_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/v1/users/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(matches!(
            client.user("1").await,
            Err(FetchError::Decode(_))
        ));
    }
}
