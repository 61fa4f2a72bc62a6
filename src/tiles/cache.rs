//! Byte-budgeted LRU cache for decoded tile payloads.
//!
//! Payloads are decoded GPU textures, so the budget is bytes rather than
//! entry count. Every entry carries the load generation it was admitted
//! under; a zoom change invalidates whole generations in one sweep instead
//! of waiting for eviction to cycle them out.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    payload: T,
    size_bytes: usize,
    /// Cache-local access stamp; larger means more recently used.
    last_access: u64,
    generation: u64,
}

/// Snapshot of cache occupancy and effectiveness counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: usize,
    pub max_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// LRU cache over opaque payloads, keyed by canonical tile key.
#[derive(Debug)]
pub struct TileCache<T> {
    entries: HashMap<String, CacheEntry<T>>,
    max_bytes: usize,
    total_bytes: usize,
    access_counter: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<T> TileCache<T> {
    /// Creates an empty cache with a budget of `max_size_mb` mebibytes.
    pub fn new(max_size_mb: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_bytes: max_size_mb << 20,
            total_bytes: 0,
            access_counter: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Looks up a payload, refreshing its recency on hit.
    pub fn get(&mut self, key: &str) -> Option<&T> {
        match self.entries.get_mut(key) {
            Some(entry) => {
                self.access_counter += 1;
                entry.last_access = self.access_counter;
                self.hits += 1;
                Some(&entry.payload)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Inserts or replaces a payload, then evicts least-recently-used
    /// entries until the budget holds.
    ///
    /// A single entry larger than the whole budget is admitted as-is; the
    /// cache never evicts down to empty.
    pub fn set(&mut self, key: String, payload: T, size_bytes: usize, generation: u64) {
        self.access_counter += 1;
        let entry = CacheEntry {
            payload,
            size_bytes,
            last_access: self.access_counter,
            generation,
        };

        if let Some(old) = self.entries.insert(key, entry) {
            self.total_bytes -= old.size_bytes;
        }
        self.total_bytes += size_bytes;

        self.evict_to_budget();
    }

    /// Membership check; does not count as an access.
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes one entry, returning its payload.
    pub fn remove(&mut self, key: &str) -> Option<T> {
        let entry = self.entries.remove(key)?;
        self.total_bytes -= entry.size_bytes;
        Some(entry.payload)
    }

    /// Drops everything; counters and statistics survive.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
    }

    /// Removes every entry admitted under a generation older than
    /// `current`.
    pub fn invalidate_old_generations(&mut self, current: u64) {
        let before = self.entries.len();
        let mut freed = 0;
        self.entries.retain(|_, entry| {
            if entry.generation < current {
                freed += entry.size_bytes;
                false
            } else {
                true
            }
        });
        self.total_bytes -= freed;

        let removed = before - self.entries.len();
        if removed > 0 {
            log::debug!(
                "cache invalidated {} entries older than generation {}",
                removed,
                current
            );
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            total_bytes: self.total_bytes,
            max_bytes: self.max_bytes,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }

    fn evict_to_budget(&mut self) {
        while self.total_bytes > self.max_bytes && self.entries.len() > 1 {
            let victim = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(key, _)| key.clone());

            match victim {
                Some(key) => {
                    if let Some(entry) = self.entries.remove(&key) {
                        self.total_bytes -= entry.size_bytes;
                        self.evictions += 1;
                        log::debug!("evicted tile {} ({} bytes)", key, entry.size_bytes);
                    }
                }
                None => break,
            }
        }
    }
}
