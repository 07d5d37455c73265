// ── Translation cache ──
//
// Bounded memo of completed translations, consulted before any network
// call. Entries never expire by age alone -- only capacity pressure
// evicts, oldest 10% at a time so eviction work is amortized.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::model::{CacheEntry, CacheKey, TranslationResult};

/// Hard cap on cached translations.
pub const MAX_CACHE_SIZE: usize = 1000;

/// Fraction of the cache evicted when an insert would exceed the cap.
const EVICT_BATCH: usize = MAX_CACHE_SIZE / 10;

/// Keyed store of completed translations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranslationCache {
    entries: HashMap<String, CacheEntry>,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(&key.storage_key())
    }

    /// Insert or overwrite. When inserting a new key at capacity, the
    /// oldest 10% of entries by `cached_at` are evicted first.
    pub fn put(&mut self, key: &CacheKey, result: TranslationResult) {
        let storage_key = key.storage_key();
        if !self.entries.contains_key(&storage_key) && self.entries.len() >= MAX_CACHE_SIZE {
            self.evict_oldest(EVICT_BATCH);
        }
        self.entries.insert(
            storage_key,
            CacheEntry {
                result,
                cached_at: Utc::now(),
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&mut self, count: usize) {
        let mut by_age: Vec<(String, chrono::DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.cached_at))
            .collect();
        by_age.sort_by_key(|(_, at)| *at);

        for (key, _) in by_age.into_iter().take(count) {
            self.entries.remove(&key);
        }
    }
}
