//! # Request Queue
//!
//! Pending tile requests ordered by priority (lower value = more urgent),
//! then by submission order. At most one request per tile.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use stratos_procedural::TerrainData;

use crate::error::StreamingError;
use crate::tile::TileId;

/// Called once with the tile's data when a request succeeds.
pub type SuccessCallback = Box<dyn FnOnce(TileId, Arc<TerrainData>) + Send>;

/// Called once when a request fails for good.
pub type ErrorCallback = Box<dyn FnOnce(TileId, &StreamingError) + Send>;

/// A pending or in-flight tile request.
pub struct TileRequest {
    /// The tile.
    pub tile: TileId,
    /// Lower is more urgent.
    pub priority: u32,
    /// When the request was first submitted.
    pub submitted_at: Instant,
    /// Failed attempts so far.
    pub retries: u32,
    /// Success callbacks, in submission order.
    pub on_success: Vec<SuccessCallback>,
    /// Error callbacks, in submission order.
    pub on_error: Vec<ErrorCallback>,
}

impl TileRequest {
    /// Creates a request with optional callbacks.
    #[must_use]
    pub fn new(
        tile: TileId,
        priority: u32,
        submitted_at: Instant,
        on_success: Option<SuccessCallback>,
        on_error: Option<ErrorCallback>,
    ) -> Self {
        Self {
            tile,
            priority,
            submitted_at,
            retries: 0,
            on_success: on_success.into_iter().collect(),
            on_error: on_error.into_iter().collect(),
        }
    }

    /// Fires every success callback.
    pub fn succeed(self, data: &Arc<TerrainData>) {
        for callback in self.on_success {
            callback(self.tile, Arc::clone(data));
        }
    }

    /// Fires every error callback.
    pub fn fail(self, error: &StreamingError) {
        for callback in self.on_error {
            callback(self.tile, error);
        }
    }
}

impl fmt::Debug for TileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileRequest")
            .field("tile", &self.tile)
            .field("priority", &self.priority)
            .field("retries", &self.retries)
            .field("on_success", &self.on_success.len())
            .field("on_error", &self.on_error.len())
            .finish_non_exhaustive()
    }
}

/// Result of [`RequestQueue::push`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// New entry.
    Queued,
    /// Replaced a less urgent entry for the same tile.
    Replaced,
    /// An entry at least as urgent already exists.
    Rejected,
    /// Queue full.
    Dropped,
}

/// Bounded priority queue of tile requests.
#[derive(Debug)]
pub struct RequestQueue {
    order: BTreeSet<(u32, u64, TileId)>,
    requests: HashMap<TileId, (u64, TileRequest)>,
    capacity: usize,
    next_seq: u64,
}

impl RequestQueue {
    /// Creates an empty queue holding at most `capacity` requests.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            order: BTreeSet::new(),
            requests: HashMap::new(),
            capacity,
            next_seq: 0,
        }
    }

    /// Adds a request.
    ///
    /// A request for a tile already queued replaces it only when strictly
    /// more urgent; the old callbacks are carried over so every caller is
    /// still answered.
    pub fn push(&mut self, mut request: TileRequest) -> PushOutcome {
        if let Some((seq, existing)) = self.requests.get(&request.tile) {
            if request.priority >= existing.priority {
                return PushOutcome::Rejected;
            }
            let key = (existing.priority, *seq, request.tile);
            self.order.remove(&key);
            if let Some((_, old)) = self.requests.remove(&request.tile) {
                request.submitted_at = old.submitted_at.min(request.submitted_at);
                request.on_success.splice(0..0, old.on_success);
                request.on_error.splice(0..0, old.on_error);
            }
            self.insert(request);
            return PushOutcome::Replaced;
        }

        if self.requests.len() >= self.capacity {
            return PushOutcome::Dropped;
        }
        self.insert(request);
        PushOutcome::Queued
    }

    /// Re-adds a request that is waiting on a retry, ignoring capacity.
    pub fn push_retry(&mut self, request: TileRequest) {
        if let Some((seq, existing)) = self.requests.remove(&request.tile) {
            self.order.remove(&(existing.priority, seq, existing.tile));
        }
        self.insert(request);
    }

    fn insert(&mut self, request: TileRequest) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert((request.priority, seq, request.tile));
        self.requests.insert(request.tile, (seq, request));
    }

    /// Removes and returns the most urgent request.
    pub fn pop(&mut self) -> Option<TileRequest> {
        let (_, _, tile) = self.order.pop_first()?;
        self.requests.remove(&tile).map(|(_, request)| request)
    }

    /// Removes the request for `tile`.
    pub fn remove(&mut self, tile: TileId) -> Option<TileRequest> {
        let (seq, request) = self.requests.remove(&tile)?;
        self.order.remove(&(request.priority, seq, tile));
        Some(request)
    }

    /// Whether `tile` is queued.
    #[must_use]
    pub fn contains(&self, tile: TileId) -> bool {
        self.requests.contains_key(&tile)
    }

    /// Priority of the queued request for `tile`.
    #[must_use]
    pub fn priority_of(&self, tile: TileId) -> Option<u32> {
        self.requests.get(&tile).map(|(_, r)| r.priority)
    }

    /// Queued request count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Maximum queued requests for new submissions.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(x: i32, priority: u32) -> TileRequest {
        TileRequest::new(TileId::new(0, x, 0), priority, Instant::now(), None, None)
    }

    #[test]
    fn test_pops_by_priority_then_fifo() {
        let mut queue = RequestQueue::new(8);
        queue.push(request(0, 5));
        queue.push(request(1, 1));
        queue.push(request(2, 5));
        queue.push(request(3, 0));

        let order: Vec<i32> = std::iter::from_fn(|| queue.pop()).map(|r| r.tile.x).collect();
        assert_eq!(order, vec![3, 1, 0, 2]);
    }

    #[test]
    fn test_capacity_drops_new_tiles() {
        let mut queue = RequestQueue::new(2);
        assert_eq!(queue.push(request(0, 1)), PushOutcome::Queued);
        assert_eq!(queue.push(request(1, 1)), PushOutcome::Queued);
        assert_eq!(queue.push(request(2, 0)), PushOutcome::Dropped);
        assert_eq!(queue.len(), 2);

        // Replacement and retries still work when full
        assert_eq!(queue.push(request(0, 0)), PushOutcome::Replaced);
        queue.push_retry(request(9, 3));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_replacement_rules() {
        let mut queue = RequestQueue::new(8);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = |calls: &Arc<AtomicUsize>| -> SuccessCallback {
            let calls = Arc::clone(calls);
            Box::new(move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        let tile = TileId::new(0, 4, 4);

        let first = TileRequest::new(tile, 10, Instant::now(), Some(counter(&calls)), None);
        assert_eq!(queue.push(first), PushOutcome::Queued);

        let same = TileRequest::new(tile, 10, Instant::now(), None, None);
        assert_eq!(queue.push(same), PushOutcome::Rejected);

        let urgent = TileRequest::new(tile, 2, Instant::now(), Some(counter(&calls)), None);
        assert_eq!(queue.push(urgent), PushOutcome::Replaced);
        assert_eq!(queue.priority_of(tile), Some(2));
        assert_eq!(queue.len(), 1);

        let merged = queue.pop().unwrap();
        assert_eq!(merged.on_success.len(), 2);
        let data = Arc::new(
            stratos_procedural::TerrainGenerator::new(
                stratos_procedural::WorldSeed::new(1),
                stratos_procedural::GeneratorConfig::default(),
            )
            .generate(4, 4, 0, 2, 10.0)
            .unwrap(),
        );
        merged.succeed(&data);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut queue = RequestQueue::new(4);
        queue.push(request(0, 1));
        queue.push(request(1, 2));
        assert!(queue.remove(TileId::new(0, 0, 0)).is_some());
        assert!(!queue.contains(TileId::new(0, 0, 0)));
        assert_eq!(queue.pop().unwrap().tile.x, 1);
        assert!(queue.pop().is_none());
    }
}
