//! Operator table configuration.

use crate::cache::CachePolicy;

/// Settings shared by every operator an [`crate::Ops`] table builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpsConfig {
    /// Maximum specializations kept per operator; `None` keeps all of them.
    pub cache_capacity: Option<usize>,
}

impl OpsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every operator cache to `capacity` entries (LRU eviction).
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    pub fn cache_policy(&self) -> CachePolicy {
        match self.cache_capacity {
            Some(capacity) => CachePolicy::Lru { capacity },
            None => CachePolicy::Unbounded,
        }
    }
}
