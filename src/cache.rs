//! Background image cache.
//!
//! The pipeline only ever needs single-key `get`/`set`, so anything that can
//! do that (a bounded LRU, something with a TTL) can stand in for the
//! in-memory map used by the server.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Storage for acquired background images, keyed by cache key.
pub trait ImageCache: Send + Sync + std::fmt::Debug {
    /// Returns the bytes stored under `key`, if any.
    fn get(&self, key: &str) -> Option<Arc<[u8]>>;

    /// Stores `bytes` under `key`, replacing anything already there.
    fn set(&self, key: &str, bytes: Arc<[u8]>);
}

/// Process-lifetime cache with no eviction.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true when nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ImageCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Arc<[u8]>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, bytes: Arc<[u8]>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), bytes);
    }
}
