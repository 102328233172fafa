//! Content hashes describing "what a plug would evaluate to".

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::Value;

/// A 256-bit digest. Two evaluations with equal hashes are substitutable.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlugHash([u8; 32]);

impl PlugHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl fmt::Display for PlugHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PlugHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlugHash({})", &self.to_hex()[..12])
    }
}

/// Incremental hasher. Every `append_*` is tagged and length-prefixed so
/// that different sequences of appends never collide by concatenation.
#[derive(Clone)]
pub struct PlugHasher {
    inner: blake3::Hasher,
}

impl Default for PlugHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PlugHasher {
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }

    fn tag(&mut self, tag: u8) -> &mut Self {
        self.inner.update(&[tag]);
        self
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.tag(b'b');
        self.inner.update(&(bytes.len() as u64).to_le_bytes());
        self.inner.update(bytes);
        self
    }

    pub fn append_str(&mut self, s: &str) -> &mut Self {
        self.tag(b's');
        self.inner.update(&(s.len() as u64).to_le_bytes());
        self.inner.update(s.as_bytes());
        self
    }

    pub fn append_i64(&mut self, v: i64) -> &mut Self {
        self.tag(b'i');
        self.inner.update(&v.to_le_bytes());
        self
    }

    pub fn append_u64(&mut self, v: u64) -> &mut Self {
        self.tag(b'u');
        self.inner.update(&v.to_le_bytes());
        self
    }

    pub fn append_f64(&mut self, v: f64) -> &mut Self {
        self.tag(b'f');
        self.inner.update(&v.to_bits().to_le_bytes());
        self
    }

    pub fn append_bool(&mut self, v: bool) -> &mut Self {
        self.tag(b'o');
        self.inner.update(&[v as u8]);
        self
    }

    pub fn append_hash(&mut self, h: &PlugHash) -> &mut Self {
        self.tag(b'h');
        self.inner.update(&h.0);
        self
    }

    pub fn append_value(&mut self, value: &Value) -> &mut Self {
        match value {
            Value::Int(v) => self.append_i64(*v),
            Value::Float(v) => self.append_f64(v.0),
            Value::Bool(v) => self.append_bool(*v),
            Value::String(s) => self.append_str(s),
            Value::Compound(fields) => {
                self.tag(b'c');
                self.append_u64(fields.len() as u64);
                for (name, field) in fields {
                    self.append_str(name);
                    self.append_value(field);
                }
                self
            }
        }
    }

    /// Append hashes whose order carries no meaning.
    pub fn append_unordered(&mut self, hashes: impl IntoIterator<Item = PlugHash>) -> &mut Self {
        let mut sorted: Vec<PlugHash> = hashes.into_iter().collect();
        sorted.sort_unstable();
        self.tag(b'U');
        self.append_u64(sorted.len() as u64);
        for h in &sorted {
            self.append_hash(h);
        }
        self
    }

    pub fn finish(&self) -> PlugHash {
        PlugHash(*self.inner.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(f: impl Fn(&mut PlugHasher)) -> PlugHash {
        let mut h = PlugHasher::new();
        f(&mut h);
        h.finish()
    }

    #[test]
    fn test_append_is_order_sensitive() {
        let ab = hash_of(|h| {
            h.append_str("a").append_str("b");
        });
        let ba = hash_of(|h| {
            h.append_str("b").append_str("a");
        });
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_concatenation_does_not_collide() {
        let split = hash_of(|h| {
            h.append_str("ab").append_str("c");
        });
        let joined = hash_of(|h| {
            h.append_str("a").append_str("bc");
        });
        assert_ne!(split, joined);
    }

    #[test]
    fn test_unordered_ignores_order() {
        let x = hash_of(|h| {
            h.append_i64(1);
        });
        let y = hash_of(|h| {
            h.append_i64(2);
        });
        let xy = hash_of(|h| {
            h.append_unordered([x, y]);
        });
        let yx = hash_of(|h| {
            h.append_unordered([y, x]);
        });
        assert_eq!(xy, yx);
    }

    #[test]
    fn test_int_and_float_values_differ() {
        let i = hash_of(|h| {
            h.append_value(&Value::Int(1));
        });
        let f = hash_of(|h| {
            h.append_value(&Value::from(1.0));
        });
        assert_ne!(i, f);
    }
}
