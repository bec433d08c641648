//! Round-robin provider pool
//!
//! Lock-free rotation over static targets, used by the provider role.

use std::sync::atomic::{AtomicUsize, Ordering};

use url::Url;

use super::Target;
use crate::error::RouteError;

/// Rotates through targets in order, one per request.
#[derive(Debug)]
pub struct ProviderPool {
    targets: Vec<Target>,
    cursor: AtomicUsize,
}

impl ProviderPool {
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            targets,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Returns the next target.
    pub fn next(&self) -> Result<&Target, RouteError> {
        if self.targets.is_empty() {
            return Err(RouteError::NoTargets);
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.targets.len();
        Ok(&self.targets[index])
    }

    /// Resolves `path` and `query` against the next target.
    pub fn resolve(&self, path: &str, query: Option<&str>) -> Result<Url, RouteError> {
        // Provider targets are static, the domain is never consulted.
        self.next()?.resolve(path, query, "")
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
