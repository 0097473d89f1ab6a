//! Streaming statistics snapshot, refreshed at the end of every `update`.

use std::time::Duration;

/// Weight of the newest sample in the load-time moving average.
const LOAD_TIME_SMOOTHING: f64 = 0.1;

/// Aggregate pipeline state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StreamingStats {
    /// Tiles tracked by the pipeline.
    pub tiles_in_memory: usize,
    /// Tiles queued, waiting on a retry or generating.
    pub tiles_loading: usize,
    /// Tiles with data and mesh.
    pub tiles_ready: usize,
    /// Tiles that failed for good.
    pub tiles_failed: usize,
    /// Requests waiting in the queue.
    pub queued_requests: usize,
    /// Requests dispatched to workers.
    pub in_flight_requests: usize,
    /// Cache entry count.
    pub cache_entries: usize,
    /// Cache hits over lookups.
    pub cache_hit_rate: f64,
    /// Moving average of worker generation time (milliseconds).
    pub average_load_ms: f64,
    /// Approximate bytes held by tiles, meshes and cache.
    pub memory_bytes: usize,
    /// Successful generations since start.
    pub total_loaded: u64,
    /// Permanent failures since start.
    pub total_failed: u64,
    /// Timeouts since start.
    pub total_timeouts: u64,
    /// Retries scheduled since start.
    pub total_retries: u64,
    /// Requests dropped by a full queue since start.
    pub total_dropped: u64,
}

impl StreamingStats {
    /// Folds one generation time into the moving average.
    pub fn record_load_time(&mut self, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        self.average_load_ms = if self.total_loaded == 0 {
            ms
        } else {
            self.average_load_ms + LOAD_TIME_SMOOTHING * (ms - self.average_load_ms)
        };
        self.total_loaded += 1;
    }
}
