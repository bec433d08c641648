//! Upstream targets
//!
//! A member target either derives its destination from the request path
//! (`direct://`) or prefixes a fixed base URL.

use url::Url;

use crate::error::{ConfigError, RouteError};

/// Sentinel meaning "derive the destination from the path".
pub const DIRECT_SENTINEL: &str = "direct://";

/// One upstream destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// First path segment becomes a subdomain of the upstream root domain.
    Direct,
    /// Absolute base URL; the request path is appended to its path.
    Static(Url),
}

impl Target {
    /// Parses one member target: the direct sentinel or an http(s) URL.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().eq_ignore_ascii_case(DIRECT_SENTINEL) {
            return Ok(Target::Direct);
        }
        parse_base_url(raw).map(Target::Static)
    }

    /// Parses a member target list; fails on an empty list or any bad entry.
    pub fn parse_member_list(raw: &[String]) -> Result<Vec<Self>, ConfigError> {
        if raw.is_empty() {
            return Err(ConfigError::NoTargets("member"));
        }
        raw.iter().map(|v| Self::parse(v)).collect()
    }

    /// Parses a provider target list; only http(s) base URLs are accepted.
    pub fn parse_provider_list(raw: &[String]) -> Result<Vec<Self>, ConfigError> {
        if raw.is_empty() {
            return Err(ConfigError::NoTargets("provider"));
        }
        raw.iter()
            .map(|v| parse_base_url(v).map(Target::Static))
            .collect()
    }

    // == Resolve ==
    /// Builds the absolute URL for `path` and the verbatim `query`.
    ///
    /// `upstream_domain` is only consulted by direct targets.
    pub fn resolve(
        &self,
        path: &str,
        query: Option<&str>,
        upstream_domain: &str,
    ) -> Result<Url, RouteError> {
        let mut url = match self {
            Target::Static(base) => {
                let mut url = base.clone();
                url.set_path(&join_url_path(base.path(), path));
                url
            }
            Target::Direct => {
                let (subdomain, rest) = split_direct_path(path)?;
                Url::parse(&format!("https://{subdomain}.{upstream_domain}{rest}"))
                    .map_err(|_| RouteError::BadPath)?
            }
        };

        url.set_query(query.filter(|q| !q.is_empty()));
        Ok(url)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    let mut url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
        target: raw.to_string(),
        source,
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::UnsupportedScheme(raw.to_string()));
    }

    // Stable joins: drop the trailing slash from the base path.
    let trimmed = url.path().trim_end_matches('/').to_string();
    url.set_path(&trimmed);
    Ok(url)
}

/// Splits `/users/v1/x` into (`users`, `/v1/x`); `/users` yields (`users`, `/`).
fn split_direct_path(path: &str) -> Result<(&str, String), RouteError> {
    let mut segments = path.strip_prefix('/').unwrap_or(path).splitn(2, '/');

    let subdomain = segments.next().unwrap_or_default();
    if subdomain.is_empty() {
        return Err(RouteError::BadPath);
    }

    let rest = match segments.next() {
        Some(rest) if !rest.is_empty() => format!("/{rest}"),
        _ => "/".to_string(),
    };
    Ok((subdomain, rest))
}

/// Joins a base path and a request path with exactly one slash at the seam.
pub fn join_url_path(base: &str, path: &str) -> String {
    match (base.is_empty() || base == "/", path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => ensure_leading_slash(path),
        (false, true) => ensure_leading_slash(base),
        (false, false) => {
            let base = ensure_leading_slash(base);
            let path = ensure_leading_slash(path);
            format!("{}{}", base.trim_end_matches('/'), path)
        }
    }
}

fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
