//! Memoization for the evaluation engine.
//!
//! Hashes are cached per plug, keyed by context hash, in a small LRU per plug,
//! and dropped by dirty propagation. Values are content addressed by hash, so
//! they never go stale and are only bounded by the LRU capacity.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use dashmap::DashMap;
use lru::LruCache;
use uuid::Uuid;

use crate::evaluation::PlugHash;
use crate::model::Value;

pub type HashKey = (Uuid, PlugHash);

pub struct EvalCache {
    /// Per plug: context hash to plug hash.
    hashes: DashMap<Uuid, LruCache<PlugHash, PlugHash>>,
    contexts_per_plug: NonZeroUsize,
    values: Mutex<LruCache<PlugHash, Value>>,
}

impl EvalCache {
    pub fn new(value_capacity: usize, contexts_per_plug: usize) -> Self {
        Self {
            hashes: DashMap::new(),
            contexts_per_plug: NonZeroUsize::new(contexts_per_plug).unwrap_or(NonZeroUsize::MIN),
            values: Mutex::new(LruCache::new(
                NonZeroUsize::new(value_capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    pub fn get_hash(&self, key: &HashKey) -> Option<PlugHash> {
        let (plug, context) = key;
        self.hashes.get_mut(plug)?.get(context).copied()
    }

    /// Cache a hash. The least recently used context of the plug is evicted
    /// once the plug holds `contexts_per_plug` entries.
    pub fn put_hash(&self, key: HashKey, hash: PlugHash) {
        let (plug, context) = key;
        self.hashes
            .entry(plug)
            .or_insert_with(|| LruCache::new(self.contexts_per_plug))
            .put(context, hash);
    }

    pub fn get_value(&self, hash: &PlugHash) -> Option<Value> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(hash)
            .cloned()
    }

    pub fn put_value(&self, hash: PlugHash, value: Value) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(hash, value);
    }

    /// Drop every cached hash of the given plugs, in any context.
    pub fn invalidate_plugs(&self, plugs: &HashSet<Uuid>) {
        for plug in plugs {
            self.hashes.remove(plug);
        }
    }

    pub fn clear(&self) {
        self.hashes.clear();
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn hash_count(&self) -> usize {
        self.hashes.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn value_count(&self) -> usize {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
