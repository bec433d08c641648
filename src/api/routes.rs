//! API Routes
//!
//! Builds the Axum router for each proxy role. Both roles accept any method
//! and path, so each router is a single fallback handler plus middleware.

use axum::{
    http::{HeaderName, HeaderValue},
    Router,
};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use super::handlers::{member_handler, provider_handler, MemberState, ProviderState};
use crate::config::Role;

/// Response header naming the role that served a request.
pub const PROXY_ROLE_HEADER: &str = "x-proxy-role";

/// Creates the member router.
///
/// # Middleware
/// - `X-Proxy-Role: member` on every response
/// - Tracing: Logs all requests for debugging
pub fn create_member_router(state: MemberState) -> Router {
    Router::new()
        .fallback(member_handler)
        .layer(role_header(Role::Member))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Creates the provider router.
pub fn create_provider_router(state: ProviderState) -> Router {
    Router::new()
        .fallback(provider_handler)
        .layer(role_header(Role::Provider))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn role_header(role: Role) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        HeaderName::from_static(PROXY_ROLE_HEADER),
        HeaderValue::from_static(role.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    use crate::cache::{CachePolicy, CoalescingCache, NoopStore};
    use crate::proxy::Forwarder;
    use crate::routing::{ProviderPool, Target, TargetSelector};
    use crate::upstream::RobloxClient;

    fn create_test_app(targets: Vec<Target>) -> Router {
        let http = reqwest::Client::new();
        let selector = TargetSelector::new(targets, "roblox.com");
        let timeout = Duration::from_secs(1);
        let state = MemberState {
            selector: selector.clone(),
            cache: CoalescingCache::new(Arc::new(NoopStore), timeout),
            roblox: RobloxClient::new(http.clone(), selector, timeout),
            forwarder: Forwarder::new(http, timeout),
            policy: CachePolicy::new(Duration::from_secs(60), Duration::from_secs(10)),
            request_timeout: timeout,
        };
        create_member_router(state)
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_user_id() {
        let app = create_test_app(vec![Target::Direct]);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/?userId=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[PROXY_ROLE_HEADER], "member");
        assert_eq!(
            body_string(response).await,
            r#"{"error":"Invalid or missing userId"}"#
        );
    }

    #[tokio::test]
    async fn test_search_too_short() {
        let app = create_test_app(vec![Target::Direct]);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/?search=ab")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "[]");
    }

    #[tokio::test]
    async fn test_direct_passthrough_without_segment() {
        let app = create_test_app(vec![Target::Direct]);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            body_string(response).await,
            r#"{"error":"unable to determine Roblox upstream from path"}"#
        );
    }

    #[tokio::test]
    async fn test_empty_provider_pool() {
        let http = reqwest::Client::new();
        let state = ProviderState {
            pool: Arc::new(ProviderPool::new(Vec::new())),
            forwarder: Forwarder::new(http, Duration::from_secs(1)),
        };
        let app = create_provider_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/anything")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()[PROXY_ROLE_HEADER], "provider");
    }
}
