//! Engine tuning knobs.

use serde::{Deserialize, Serialize};

const DEFAULT_VALUE_CACHE_CAPACITY: usize = 1024;
const DEFAULT_HASH_CACHE_CONTEXTS: usize = 256;

/// Configuration for a [`Graph`](crate::graph::Graph)'s evaluation caches.
///
/// Every field has a default, so a partial TOML/JSON section is enough.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of computed leaf values kept in the LRU value cache.
    pub value_cache_capacity: usize,
    /// Memoize hashes per `(plug, context)`. Disabling forces every hash to
    /// be re-derived, which is only useful when debugging.
    pub hash_cache_enabled: bool,
    /// Contexts remembered per plug in the hash cache. The least recently
    /// used context is evicted beyond this.
    pub hash_cache_contexts_per_plug: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            value_cache_capacity: DEFAULT_VALUE_CACHE_CAPACITY,
            hash_cache_enabled: true,
            hash_cache_contexts_per_plug: DEFAULT_HASH_CACHE_CONTEXTS,
        }
    }
}
