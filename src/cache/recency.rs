//! Recency Index Module
//!
//! Tracks access order for least-recently-used eviction in the in-process store.

use std::collections::{BTreeMap, HashMap};

// == Recency Index ==
/// Orders keys by last access using a monotonically increasing tick.
///
/// `ticks` maps key -> tick, `order` maps tick -> key; the smallest tick is
/// the least recently used key. Touch and evict are O(log n).
///
/// Internal to the in-process store:
///
/// ```compile_fail
/// use roblox_proxy::cache::RecencyIndex;
/// ```
#[derive(Debug, Default)]
pub(crate) struct RecencyIndex {
    clock: u64,
    ticks: HashMap<String, u64>,
    order: BTreeMap<u64, String>,
}

impl RecencyIndex {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used.
    pub fn touch(&mut self, key: &str) {
        self.clock += 1;
        if let Some(previous) = self.ticks.insert(key.to_string(), self.clock) {
            self.order.remove(&previous);
        }
        self.order.insert(self.clock, key.to_string());
    }

    // == Remove ==
    pub fn remove(&mut self, key: &str) {
        if let Some(tick) = self.ticks.remove(key) {
            self.order.remove(&tick);
        }
    }

    // == Evict Oldest ==
    /// Removes and returns the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.ticks.remove(&key);
        Some(key)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_in_insertion_order() {
        let mut index = RecencyIndex::new();
        index.touch("a");
        index.touch("b");
        index.touch("c");

        assert_eq!(index.evict_oldest().as_deref(), Some("a"));
        assert_eq!(index.evict_oldest().as_deref(), Some("b"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_touch_moves_key_to_front() {
        let mut index = RecencyIndex::new();
        index.touch("a");
        index.touch("b");
        index.touch("a");

        assert_eq!(index.len(), 2);
        assert_eq!(index.evict_oldest().as_deref(), Some("b"));
    }

    #[test]
    fn test_remove_and_empty() {
        let mut index = RecencyIndex::new();
        index.touch("a");
        index.remove("a");
        index.remove("missing");

        assert!(index.is_empty());
        assert!(index.evict_oldest().is_none());
    }
}
