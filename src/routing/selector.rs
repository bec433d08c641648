//! Target selection
//!
//! Deterministic modulo sharding of routing keys over a fixed target list.
//! Not consistent hashing: changing the target count remaps most keys.

use std::sync::Arc;

use url::Url;

use super::Target;
use crate::error::RouteError;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a hash.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Picks the target for `key`; total for any non-empty list.
pub fn select<'a>(key: &str, targets: &'a [Target]) -> Result<&'a Target, RouteError> {
    if targets.is_empty() {
        return Err(RouteError::NoTargets);
    }
    let index = fnv1a_32(key.as_bytes()) as usize % targets.len();
    Ok(&targets[index])
}

/// Routing key of a request: path plus `?query` when a query is present.
pub fn routing_key(path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{path}?{q}"),
        _ => path.to_string(),
    }
}

// == Target Selector ==
/// Immutable target list plus the root domain direct targets rewrite into.
#[derive(Debug, Clone)]
pub struct TargetSelector {
    targets: Arc<[Target]>,
    upstream_domain: String,
}

impl TargetSelector {
    pub fn new(targets: Vec<Target>, upstream_domain: impl Into<String>) -> Self {
        Self {
            targets: targets.into(),
            upstream_domain: upstream_domain.into(),
        }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    // == Resolve ==
    /// Selects a target from path + query and builds the absolute upstream URL.
    pub fn resolve(&self, path: &str, query: Option<&str>) -> Result<Url, RouteError> {
        let key = routing_key(path, query);
        let target = select(&key, &self.targets)?;
        target.resolve(path, query, &self.upstream_domain)
    }
}
