//! Parameterized Cache - Get-or-Create Map with Single Construction
//!
//! Values are created on first request for a key and shared afterwards.
//! The map lock is held while a value is constructed, so concurrent
//! requests for the same key construct it at most once and every caller
//! receives the same handle.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::hash::Hash;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached entries.
    pub entries: usize,
    /// Lookups served from the cache.
    pub hits: usize,
    /// Lookups that constructed a new entry.
    pub constructions: usize,
}

#[derive(Debug)]
struct Inner<K, V> {
    entries: FxHashMap<K, V>,
    hits: usize,
    constructions: usize,
}

/// A get-or-create cache whose entries live as long as the cache.
#[derive(Debug)]
pub struct ParameterizedCache<K, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K: Eq + Hash, V: Clone> ParameterizedCache<K, V> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: FxHashMap::default(),
                hits: 0,
                constructions: 0,
            }),
        }
    }

    /// Returns the cached value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Returns the value for `key`, constructing it with `create` on a miss.
    ///
    /// A failed construction caches nothing.
    pub fn get_or_try_insert_with<F, E>(&self, key: K, create: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        let mut inner = self.inner.lock();
        if let Some(value) = inner.entries.get(&key).cloned() {
            inner.hits += 1;
            return Ok(value);
        }
        let value = create(&key)?;
        inner.constructions += 1;
        inner.entries.insert(key, value.clone());
        Ok(value)
    }

    /// Returns true if `key` has a cached value.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.len(),
            hits: inner.hits,
            constructions: inner.constructions,
        }
    }
}

impl<K: Eq + Hash, V: Clone> Default for ParameterizedCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
