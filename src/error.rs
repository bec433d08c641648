//! Error types for the proxy
//!
//! Provides one thiserror enum per concern. Engine-level errors are `Clone`
//! so a single coalesced result can be handed to every waiter.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::ErrorResponse;

// == Configuration Error ==
/// Fatal startup errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A target list was empty
    #[error("no {0} targets provided")]
    NoTargets(&'static str),

    /// A target could not be parsed as a URL
    #[error("parse target {target:?}: {source}")]
    InvalidUrl {
        target: String,
        #[source]
        source: url::ParseError,
    },

    /// A target used something other than http or https
    #[error("target {0:?} must use http or https scheme")]
    UnsupportedScheme(String),

    /// Unknown `PROXY_ROLE`
    #[error("unsupported role {0:?}")]
    UnsupportedRole(String),
}

// == Routing Error ==
/// Target selection and resolution failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("no upstream target available")]
    NoTargets,

    #[error("unable to determine Roblox upstream from path")]
    BadPath,
}

// == Store Error ==
/// Failures of the external cache store.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("cache store timed out")]
    Timeout,

    #[error("cache store: {0}")]
    Backend(String),

    #[error("encode cached payload {key:?}: {reason}")]
    Encode { key: String, reason: String },

    #[error("decode cached payload {key:?}: {reason}")]
    Decode { key: String, reason: String },
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

// == Upstream Fetch Error ==
/// Failures of a single upstream API fetch. Never cached.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("roblox request failed: {0}")]
    Status(String),

    #[error("roblox request failed: {0}")]
    Transport(String),

    #[error("decode roblox response: {0}")]
    Decode(String),

    #[error("roblox request timed out")]
    Timeout,

    #[error(transparent)]
    Route(#[from] RouteError),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

// == Coalescing Cache Error ==
/// Errors surfaced by the coalescing cache engine.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

// == Forward Error ==
/// Transport failures while relaying passthrough traffic.
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("upstream request timed out")]
    Timeout,
}

// == Proxy Error ==
/// Errors rendered to the client by the HTTP handlers.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Invalid or missing userId")]
    InvalidUserId,

    #[error("search query too short")]
    SearchTooShort,

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl ProxyError {
    /// HTTP status the error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidUserId | ProxyError::SearchTooShort => StatusCode::BAD_REQUEST,
            ProxyError::Route(_) | ProxyError::Forward(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();

        let mut response = match self {
            ProxyError::SearchTooShort => (status, Json(json!([]))).into_response(),
            other => {
                let body = ErrorResponse::new(sanitize_message(&other.to_string()));
                (status, Json(body)).into_response()
            }
        };

        response.headers_mut().insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        response
    }
}

/// Replaces embedded double quotes so messages stay readable once embedded in JSON.
pub fn sanitize_message(message: &str) -> String {
    message.replace('"', "'")
}

// == Result Type Alias ==
/// Convenience Result type for the HTTP handlers.
pub type Result<T> = std::result::Result<T, ProxyError>;
