use crate::types::{AnalysisResult, CacheKey};
use std::collections::HashMap;

/// Caches analysis results per genre selection.
///
/// Switching back to an already-computed genre reuses the stored views
/// instead of re-running the aggregation over the whole dataset.
#[derive(Clone)]
pub struct CacheManager {
    cache: HashMap<CacheKey, AnalysisResult>,
}

impl CacheManager {
    /// Create a new cache manager
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Store a result for a selection
    pub fn store(&mut self, key: CacheKey, result: AnalysisResult) {
        self.cache.insert(key, result);
    }

    /// Retrieve the result stored for a selection
    pub fn get(&self, key: &CacheKey) -> Option<&AnalysisResult> {
        self.cache.get(key)
    }

    /// Number of cached selections
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether no selection has been cached yet
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Drop all cached results, e.g. after loading a different dataset
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}
