//! API Handlers
//!
//! Catch-all handlers for the two proxy roles.
//!
//! Member dispatch, in order:
//! - `?userId=<digits>` - cached entity lookup
//! - `?search=<text>` - cached search with per-result avatar fan-out
//! - otherwise - uncached passthrough to the selected member target

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures::future::join_all;
use tracing::{error, warn};

use crate::cache::{CachePolicy, CoalescingCache};
use crate::error::{CacheError, FetchError, ProxyError, Result};
use crate::models::{AvatarPayload, SearchEntry};
use crate::proxy::Forwarder;
use crate::routing::{ProviderPool, TargetSelector};
use crate::upstream::RobloxClient;

/// Shortest search query served.
pub const MIN_SEARCH_LEN: usize = 3;

/// `Cache-Control` value of cached JSON responses.
pub const CACHED_MAX_AGE: &str = "max-age=18000";

// == Cache Keys ==
pub fn user_cache_key(user_id: &str) -> String {
    format!("roblox:user:{user_id}")
}

pub fn search_cache_key(query: &str) -> String {
    format!("roblox:search:{}", query.to_lowercase())
}

pub fn avatar_cache_key(user_id: &str) -> String {
    format!("roblox:avatar:{user_id}")
}

// == Member State ==
/// Application state shared by member handlers.
#[derive(Clone)]
pub struct MemberState {
    pub selector: TargetSelector,
    pub cache: CoalescingCache,
    pub roblox: RobloxClient,
    pub forwarder: Forwarder,
    pub policy: CachePolicy,
    /// Budget of one cached lookup, fan-out included
    pub request_timeout: Duration,
}

// == Provider State ==
/// Application state shared by provider handlers.
#[derive(Clone)]
pub struct ProviderState {
    pub pool: Arc<ProviderPool>,
    pub forwarder: Forwarder,
}

/// Lookup parameters recognised on member requests.
///
/// Values are trimmed and an empty value counts as absent.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LookupParams {
    pub user_id: Option<String>,
    pub search: Option<String>,
}

impl LookupParams {
    /// Takes the first occurrence of each parameter from a raw query string.
    ///
    /// Later occurrences are ignored even when the first one is blank.
    pub fn from_query(query: Option<&str>) -> Self {
        let Some(query) = query else {
            return Self::default();
        };

        let mut user_id = None;
        let mut search = None;
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match name.as_ref() {
                "userId" => &mut user_id,
                "search" => &mut search,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.trim().to_string());
            }
        }

        Self {
            user_id: user_id.filter(|v| !v.is_empty()),
            search: search.filter(|v| !v.is_empty()),
        }
    }
}

// == Member Handler ==
/// Fallback handler for every member request.
pub async fn member_handler(State(state): State<MemberState>, request: Request) -> Response {
    let params = LookupParams::from_query(request.uri().query());

    let result = if let Some(user_id) = params.user_id {
        user_lookup(&state, user_id).await
    } else if let Some(search) = params.search {
        search_lookup(&state, search).await
    } else {
        member_passthrough(&state, request).await
    };

    result.unwrap_or_else(IntoResponse::into_response)
}

async fn user_lookup(state: &MemberState, user_id: String) -> Result<Response> {
    if !user_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProxyError::InvalidUserId);
    }

    let roblox = state.roblox.clone();
    let id = user_id.clone();
    let key = user_cache_key(&user_id);
    let lookup = state.cache.get(&key, state.policy, move || async move {
        roblox.profile_payload(&id).await
    });

    let payload = within(state.request_timeout, lookup).await.map_err(|err| {
        error!(user_id = %user_id, error = %err, "user lookup failed");
        err
    })?;
    Ok(cached_json(payload))
}

async fn search_lookup(state: &MemberState, search: String) -> Result<Response> {
    if search.len() < MIN_SEARCH_LEN {
        return Err(ProxyError::SearchTooShort);
    }

    let roblox = state.roblox.clone();
    let cache = state.cache.clone();
    let policy = state.policy;
    let query = search.clone();
    let key = search_cache_key(&search);
    let lookup = state.cache.get(&key, policy, move || async move {
        search_payload(roblox, cache, policy, query).await
    });

    let payload = within(state.request_timeout, lookup).await.map_err(|err| {
        error!(query = %search, error = %err, "search failed");
        err
    })?;
    Ok(cached_json(payload))
}

/// Builds the search response, resolving every result's avatar concurrently.
async fn search_payload(
    roblox: RobloxClient,
    cache: CoalescingCache,
    policy: CachePolicy,
    query: String,
) -> std::result::Result<Bytes, FetchError> {
    let contents = roblox.search_users(&query).await?;

    let entries = contents.into_iter().map(|content| {
        let roblox = roblox.clone();
        let cache = cache.clone();
        async move {
            let user_id = content.content_id.to_string();
            let avatar_url = match lookup_avatar_url(&cache, &roblox, policy, &user_id).await {
                Ok(url) => url,
                Err(err) => {
                    warn!(user_id = %user_id, error = %err, "avatar lookup failed");
                    String::new()
                }
            };
            SearchEntry {
                player_id: user_id,
                name: content.username,
                avatar_url,
            }
        }
    });
    let entries = join_all(entries).await;

    Ok(Bytes::from(serde_json::to_vec(&entries)?))
}

async fn lookup_avatar_url(
    cache: &CoalescingCache,
    roblox: &RobloxClient,
    policy: CachePolicy,
    user_id: &str,
) -> std::result::Result<String, CacheError> {
    let roblox = roblox.clone();
    let id = user_id.to_string();
    let key = avatar_cache_key(user_id);
    let payload = cache
        .get(&key, policy, move || async move {
            roblox.avatar_payload(&id).await
        })
        .await?;

    let avatar: AvatarPayload = serde_json::from_slice(&payload).map_err(FetchError::from)?;
    Ok(avatar.url)
}

async fn member_passthrough(state: &MemberState, request: Request) -> Result<Response> {
    let target = state
        .selector
        .resolve(request.uri().path(), request.uri().query())?;
    forward(&state.forwarder, request, target).await
}

// == Provider Handler ==
/// Fallback handler for every provider request.
pub async fn provider_handler(State(state): State<ProviderState>, request: Request) -> Response {
    let result = match state
        .pool
        .resolve(request.uri().path(), request.uri().query())
    {
        Ok(target) => forward(&state.forwarder, request, target).await,
        Err(err) => Err(err.into()),
    };
    result.unwrap_or_else(IntoResponse::into_response)
}

async fn forward(forwarder: &Forwarder, request: Request, target: url::Url) -> Result<Response> {
    let path = request.uri().path().to_string();
    forwarder.forward(request, target).await.map_err(|err| {
        error!(path = %path, error = %err, "proxy request failed");
        ProxyError::from(err)
    })
}

// == Helpers ==
/// Bounds a cached lookup; on expiry the waiter is dropped.
async fn within<Fut>(budget: Duration, lookup: Fut) -> std::result::Result<Bytes, CacheError>
where
    Fut: Future<Output = std::result::Result<Bytes, CacheError>>,
{
    tokio::time::timeout(budget, lookup)
        .await
        .unwrap_or(Err(CacheError::Fetch(FetchError::Timeout)))
}

fn cached_json(payload: Bytes) -> Response {
    let mut response = Response::new(Body::from(payload));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHED_MAX_AGE));
    response
}
