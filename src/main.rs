//! Roblox Proxy - A clustering reverse proxy for the Roblox web API
//!
//! Runs as either a member (caching, sharding ingress) or a provider
//! (round-robin egress), chosen by `PROXY_ROLE`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roblox_proxy::cache::{CacheBackend, CachePolicy, CoalescingCache};
use roblox_proxy::proxy::Forwarder;
use roblox_proxy::routing::{ProviderPool, Target, TargetSelector};
use roblox_proxy::upstream::{build_http_client, RobloxClient};
use roblox_proxy::{
    create_member_router, create_provider_router, spawn_cleanup_task, Config, MemberState,
    ProviderState, Role,
};

/// Main entry point for the proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the role's router (member: targets, cache backend, cleanup task)
/// 4. Start HTTP server on configured port
/// 5. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roblox_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("load configuration")?;
    info!(
        role = %config.role,
        port = config.server_port,
        request_timeout_ms = config.request_timeout.as_millis() as u64,
        "configuration loaded"
    );

    let (app, cleanup_handle) = match config.role {
        Role::Member => build_member(&config).await?,
        Role::Provider => (build_provider(&config)?, None),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(role = %config.role, "proxy listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(cleanup_handle))
    .await
    .context("serve")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn build_member(config: &Config) -> anyhow::Result<(Router, Option<JoinHandle<()>>)> {
    let targets = Target::parse_member_list(&config.member_clusters)?;
    info!(targets = targets.len(), "member targets loaded");

    if !config.refresh_window_is_valid() {
        warn!(
            refresh_after_secs = config.refresh_after.as_secs(),
            cache_ttl_secs = config.cache_ttl.as_secs(),
            "REFRESH_AFTER_SECS is not below CACHE_TTL_SECS; background refresh will never run"
        );
    }

    let backend = CacheBackend::open(
        &config.cache_url,
        config.store_timeout,
        config.memory_max_entries,
    )
    .await;
    let cleanup_handle = backend
        .memory()
        .map(|store| spawn_cleanup_task(store, config.cleanup_interval));

    let http = build_http_client(config).context("build upstream client")?;
    let selector = TargetSelector::new(targets, config.upstream_domain.clone());

    let state = MemberState {
        selector: selector.clone(),
        cache: CoalescingCache::new(backend.store(), config.request_timeout),
        roblox: RobloxClient::new(http.clone(), selector, config.request_timeout),
        forwarder: Forwarder::new(http, config.request_timeout),
        policy: CachePolicy::new(config.cache_ttl, config.refresh_after),
        request_timeout: config.request_timeout,
    };
    Ok((create_member_router(state), cleanup_handle))
}

fn build_provider(config: &Config) -> anyhow::Result<Router> {
    let targets = Target::parse_provider_list(&config.provider_targets)?;
    info!(targets = targets.len(), "provider targets loaded");

    let http = build_http_client(config).context("build upstream client")?;
    let state = ProviderState {
        pool: Arc::new(ProviderPool::new(targets)),
        forwarder: Forwarder::new(http, config.request_timeout),
    };
    Ok(create_provider_router(state))
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the cleanup task and allows graceful shutdown.
async fn shutdown_signal(cleanup_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }
}
