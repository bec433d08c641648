//! Configuration Module
//!
//! Handles loading and managing proxy configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Role a proxy process plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Ingests client traffic, caches API lookups, shards across member clusters
    Member,
    /// Round-robins raw traffic across provider targets
    Provider,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Provider => "provider",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "member" => Ok(Role::Member),
            "provider" => Ok(Role::Provider),
            other => Err(ConfigError::UnsupportedRole(other.to_string())),
        }
    }
}

/// Proxy configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Role of this process
    pub role: Role,
    /// HTTP server port
    pub server_port: u16,
    /// Raw member targets (`direct://` or http(s) base URLs)
    pub member_clusters: Vec<String>,
    /// Raw provider targets (http(s) base URLs)
    pub provider_targets: Vec<String>,
    /// Cache store connection string; empty disables caching
    pub cache_url: String,
    /// Budget of one upstream call, also used for background refreshes
    pub request_timeout: Duration,
    /// Deadline of a single cache store Get/Set
    pub store_timeout: Duration,
    /// TTL of cached payloads
    pub cache_ttl: Duration,
    /// Age after which a cached payload is refreshed in the background
    pub refresh_after: Duration,
    /// Root domain that `direct://` targets rewrite into
    pub upstream_domain: String,
    /// Upstream connect timeout
    pub connect_timeout: Duration,
    /// Idle upstream connection lifetime
    pub pool_idle_timeout: Duration,
    /// Idle upstream connections kept per host
    pub pool_max_idle_per_host: usize,
    /// Capacity of the in-process store
    pub memory_max_entries: usize,
    /// Sweep interval of the in-process store
    pub cleanup_interval: Duration,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `PROXY_ROLE` - `member` or `provider` (default: member)
    /// - `SERVER_PORT` - HTTP server port (default: 8080)
    /// - `MEMBER_CLUSTERS` - Comma separated member targets (default: direct://)
    /// - `PROVIDER_TARGETS` - Comma separated provider targets (default: empty)
    /// - `CACHE_URL` or `REDIS_URL` - Cache store; `memory://` for in-process (default: disabled)
    /// - `REQUEST_TIMEOUT_MS` - Upstream request budget (default: 10000)
    /// - `STORE_TIMEOUT_MS` - Cache store call deadline (default: 600)
    /// - `CACHE_TTL_SECS` - Cached payload TTL (default: 3600)
    /// - `REFRESH_AFTER_SECS` - Stale-after threshold (default: 300)
    /// - `UPSTREAM_DOMAIN` - Root domain for direct targets (default: roblox.com)
    /// - `CONNECT_TIMEOUT_MS`, `POOL_IDLE_TIMEOUT_SECS`, `POOL_MAX_IDLE_PER_HOST`
    /// - `MEMORY_MAX_ENTRIES`, `CLEANUP_INTERVAL_SECS`
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let role = match env::var("PROXY_ROLE") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.role,
        };

        let cache_url = env::var("CACHE_URL")
            .or_else(|_| env::var("REDIS_URL"))
            .map(|v| v.trim().to_string())
            .unwrap_or_default();

        Ok(Self {
            role,
            server_port: parse_or("SERVER_PORT", defaults.server_port),
            member_clusters: env::var("MEMBER_CLUSTERS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.member_clusters),
            provider_targets: env::var("PROVIDER_TARGETS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.provider_targets),
            cache_url,
            request_timeout: millis_or("REQUEST_TIMEOUT_MS", defaults.request_timeout),
            store_timeout: millis_or("STORE_TIMEOUT_MS", defaults.store_timeout),
            cache_ttl: secs_or("CACHE_TTL_SECS", defaults.cache_ttl),
            refresh_after: secs_or("REFRESH_AFTER_SECS", defaults.refresh_after),
            upstream_domain: env::var("UPSTREAM_DOMAIN")
                .ok()
                .map(|v| v.trim().trim_matches('.').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.upstream_domain),
            connect_timeout: millis_or("CONNECT_TIMEOUT_MS", defaults.connect_timeout),
            pool_idle_timeout: secs_or("POOL_IDLE_TIMEOUT_SECS", defaults.pool_idle_timeout),
            pool_max_idle_per_host: parse_or(
                "POOL_MAX_IDLE_PER_HOST",
                defaults.pool_max_idle_per_host,
            ),
            memory_max_entries: parse_or("MEMORY_MAX_ENTRIES", defaults.memory_max_entries),
            cleanup_interval: secs_or("CLEANUP_INTERVAL_SECS", defaults.cleanup_interval),
        })
    }

    /// Returns true when background refresh can fire before the store expires an entry.
    ///
    /// A stale-after threshold at or above the TTL silently disables refreshes;
    /// callers log it, the engine does not correct it.
    pub fn refresh_window_is_valid(&self) -> bool {
        self.refresh_after < self.cache_ttl
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            role: Role::Member,
            server_port: 8080,
            member_clusters: vec!["direct://".to_string()],
            provider_targets: Vec::new(),
            cache_url: String::new(),
            request_timeout: Duration::from_millis(10_000),
            store_timeout: Duration::from_millis(600),
            cache_ttl: Duration::from_secs(3600),
            refresh_after: Duration::from_secs(300),
            upstream_domain: "roblox.com".to_string(),
            connect_timeout: Duration::from_millis(3_000),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 64,
            memory_max_entries: 10_000,
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn millis_or(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

fn secs_or(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

/// Splits a comma separated list, dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}
