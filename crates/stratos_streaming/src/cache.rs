//! # Tile Cache
//!
//! Recently generated or unloaded tile data, keyed by tile id.
//!
//! Eviction runs once per `update` and has two passes:
//!
//! 1. **Age**: entries inserted more than `max_age` ago, however recently
//!    they were read
//! 2. **LRU**: least recently read entries until the count fits
//!    `max_entries`
//!
//! The cache is mutated only by the orchestrator, so there is no locking.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use stratos_procedural::TerrainData;

use crate::tile::TileId;

/// One cached tile.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    /// The data, shared with any tile holding it.
    pub data: Arc<TerrainData>,
    /// When the entry was inserted.
    pub inserted_at: Instant,
    /// Reads since insertion.
    pub access_count: u32,
    /// Last read (or insertion).
    pub last_access: Instant,
}

/// LRU tile cache with a maximum entry age.
pub struct TileCache {
    entries: LruCache<TileId, CacheEntry>,
    max_entries: usize,
    max_age: Duration,
    hits: u64,
    misses: u64,
}

impl TileCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(max_entries: usize, max_age: Duration) -> Self {
        Self {
            entries: LruCache::unbounded(),
            max_entries,
            max_age,
            hits: 0,
            misses: 0,
        }
    }

    /// Looks up `tile`, marking it most recently used.
    pub fn get(&mut self, tile: TileId, now: Instant) -> Option<Arc<TerrainData>> {
        match self.entries.get_mut(&tile) {
            Some(entry) => {
                entry.access_count = entry.access_count.saturating_add(1);
                entry.last_access = now;
                self.hits += 1;
                Some(Arc::clone(&entry.data))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Whether `tile` is cached, without touching recency or counters.
    #[must_use]
    pub fn contains(&self, tile: TileId) -> bool {
        self.entries.contains(&tile)
    }

    /// Inserts or refreshes `tile`.
    pub fn insert(&mut self, tile: TileId, data: Arc<TerrainData>, now: Instant) {
        self.entries.put(
            tile,
            CacheEntry {
                data,
                inserted_at: now,
                access_count: 0,
                last_access: now,
            },
        );
    }

    /// Removes `tile`.
    pub fn remove(&mut self, tile: TileId) -> Option<CacheEntry> {
        self.entries.pop(&tile)
    }

    /// Runs both eviction passes. Returns the number of entries removed.
    pub fn evict(&mut self, now: Instant) -> usize {
        let expired: Vec<TileId> = self
            .entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.inserted_at) > self.max_age)
            .map(|(tile, _)| *tile)
            .collect();
        for tile in &expired {
            self.entries.pop(tile);
        }

        let mut evicted = expired.len();
        while self.entries.len() > self.max_entries {
            if self.entries.pop_lru().is_none() {
                break;
            }
            evicted += 1;
        }

        if evicted > 0 {
            tracing::debug!(
                "Evicted {} cache entries ({} expired), {} remain",
                evicted,
                expired.len(),
                self.entries.len()
            );
        }
        evicted
    }

    /// Entry count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookups that found an entry.
    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that found nothing.
    #[must_use]
    pub const fn misses(&self) -> u64 {
        self.misses
    }

    /// Hits over lookups, 0 before the first lookup.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Approximate footprint of the cached data.
    #[must_use]
    pub fn memory_bytes(&self) -> usize {
        self.entries.iter().map(|(_, e)| e.data.memory_bytes()).sum()
    }

    /// Drops every entry; counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
