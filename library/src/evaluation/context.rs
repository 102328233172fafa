//! Evaluation context: the "which variant of the computation" environment
//! threaded through every hash/compute request.
//!
//! A [`Context`] is a persistent map: [`Context::set`] branches a new context
//! that shares every untouched entry with its parent, and never mutates the
//! original. [`Context::scope`] installs a context as the ambient one for the
//! calling thread until the returned guard is dropped.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use log::warn;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::hash::{PlugHash, PlugHasher};

/// Conventional name of the time-sample variable.
pub const FRAME: &str = "frame";

/// Chains deeper than this are flattened on the next `set`.
const MAX_CHAIN_DEPTH: usize = 32;

/// A typed context variable.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum ContextValue {
    Int(i64),
    Float(OrderedFloat<f64>),
    Bool(bool),
    String(String),
}

impl ContextValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ContextValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ContextValue::Float(v) => Some(v.0),
            ContextValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ContextValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Parse command-line style text: integer, then float, then bool,
    /// otherwise a string.
    pub fn parse(text: &str) -> Self {
        if let Ok(v) = text.parse::<i64>() {
            ContextValue::Int(v)
        } else if let Ok(v) = text.parse::<f64>() {
            ContextValue::Float(OrderedFloat(v))
        } else if let Ok(v) = text.parse::<bool>() {
            ContextValue::Bool(v)
        } else {
            ContextValue::String(text.to_string())
        }
    }

    pub(crate) fn hash_into(&self, h: &mut PlugHasher) {
        match self {
            ContextValue::Int(v) => h.append_i64(*v),
            ContextValue::Float(v) => h.append_f64(v.0),
            ContextValue::Bool(v) => h.append_bool(*v),
            ContextValue::String(s) => h.append_str(s),
        };
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Int(v) => write!(f, "{}", v),
            ContextValue::Float(v) => write!(f, "{}", v.0),
            ContextValue::Bool(v) => write!(f, "{}", v),
            ContextValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Int(value)
    }
}

impl From<i32> for ContextValue {
    fn from(value: i32) -> Self {
        ContextValue::Int(value as i64)
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        ContextValue::Float(OrderedFloat(value))
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Bool(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::String(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::String(value)
    }
}

/// One override in the persistent chain. The newest entry for a key wins.
#[derive(Debug)]
struct Entry {
    key: String,
    value: ContextValue,
    parent: Option<Arc<Entry>>,
}

/// Immutable key/value environment for one evaluation request.
#[derive(Clone)]
pub struct Context {
    head: Option<Arc<Entry>>,
    depth: usize,
    hash: PlugHash,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::from_head(None, 0)
    }

    pub fn from_entries<K: Into<String>>(
        entries: impl IntoIterator<Item = (K, ContextValue)>,
    ) -> Self {
        let map: BTreeMap<String, ContextValue> =
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::from_map(map)
    }

    fn from_map(map: BTreeMap<String, ContextValue>) -> Self {
        let mut head = None;
        let depth = map.len();
        for (key, value) in map {
            head = Some(Arc::new(Entry {
                key,
                value,
                parent: head,
            }));
        }
        Self::from_head(head, depth)
    }

    fn from_head(head: Option<Arc<Entry>>, depth: usize) -> Self {
        let mut context = Self {
            head,
            depth,
            hash: PlugHasher::new().finish(),
        };
        let mut h = PlugHasher::new();
        h.append_str("context");
        for (key, value) in context.entries() {
            h.append_str(&key);
            value.hash_into(&mut h);
        }
        context.hash = h.finish();
        context
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        let mut entry = self.head.as_deref();
        while let Some(e) = entry {
            if e.key == key {
                return Some(&e.value);
            }
            entry = e.parent.as_deref();
        }
        None
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(ContextValue::as_int).unwrap_or(default)
    }

    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(ContextValue::as_float).unwrap_or(default)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Branch a new context with `key` overridden. `self` is untouched.
    pub fn set(&self, key: &str, value: impl Into<ContextValue>) -> Context {
        let value = value.into();
        if self.depth >= MAX_CHAIN_DEPTH {
            let mut map = self.entries();
            map.insert(key.to_string(), value);
            return Self::from_map(map);
        }
        let head = Arc::new(Entry {
            key: key.to_string(),
            value,
            parent: self.head.clone(),
        });
        Self::from_head(Some(head), self.depth + 1)
    }

    pub fn frame(&self) -> f64 {
        self.get_float(FRAME, 1.0)
    }

    pub fn with_frame(&self, frame: f64) -> Context {
        self.set(FRAME, frame)
    }

    /// Effective entries, sorted by key.
    pub fn entries(&self) -> BTreeMap<String, ContextValue> {
        let mut map = BTreeMap::new();
        let mut entry = self.head.as_deref();
        while let Some(e) = entry {
            map.entry(e.key.clone()).or_insert_with(|| e.value.clone());
            entry = e.parent.as_deref();
        }
        map
    }

    pub fn names(&self) -> Vec<String> {
        self.entries().into_keys().collect()
    }

    /// Digest of the effective entries; equal contents give equal hashes.
    pub fn content_hash(&self) -> PlugHash {
        self.hash
    }

    /// Make this the ambient context of the calling thread until the guard
    /// is dropped.
    pub fn scope(&self) -> ContextScope {
        let depth = SCOPE_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(self.clone());
            stack.len()
        });
        ContextScope {
            depth,
            _not_send: PhantomData,
        }
    }

    /// The ambient context of the calling thread, or an empty one.
    pub fn current() -> Context {
        SCOPE_STACK
            .with(|stack| stack.borrow().last().cloned())
            .unwrap_or_default()
    }

    /// Number of scopes currently active on the calling thread.
    pub fn scope_depth() -> usize {
        SCOPE_STACK.with(|stack| stack.borrow().len())
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.entries() == other.entries()
    }
}

impl Eq for Context {}

impl Hash for Context {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

thread_local! {
    /// Ambient contexts of this thread, innermost last.
    static SCOPE_STACK: RefCell<Vec<Context>> = const { RefCell::new(Vec::new()) };
}

/// Guard returned by [`Context::scope`]. Restores the previous ambient
/// context when dropped, including during unwinding.
#[must_use = "the context is only ambient while the scope is alive"]
pub struct ContextScope {
    depth: usize,
    // Scopes belong to the thread whose stack they pushed onto.
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        let _ = SCOPE_STACK.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.len() != self.depth {
                warn!(
                    "Context scope closed at depth {} while {} scopes are active",
                    self.depth,
                    stack.len()
                );
            }
            stack.truncate(self.depth.saturating_sub(1));
        });
    }
}
