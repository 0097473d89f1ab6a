//! # Terrain Streamer
//!
//! The orchestrator. Owns the request queue, the in-flight set, the cache
//! and the tile map, and is the only code that mutates them. Workers talk
//! to it through messages that are merged during [`TerrainStreamer::update`].
//!
//! ## Request Lifecycle
//!
//! ```text
//! request_tile ─▶ cache hit ──────────────────────────▶ Ready
//!      │
//!      ▼
//!   queued ──dispatch──▶ in flight ──Result──▶ Ready
//!      ▲                     │
//!      │                     ├──Error──▶ retry wait ──(delay)──┘
//!      │                     │              └─(exhausted)─▶ Error
//!      │                     └──timeout──▶ Error
//!      └── more urgent request replaces a queued one
//! ```
//!
//! A tile has at most one queued, waiting or in-flight request. Each
//! dispatch gets a fresh attempt id; worker messages whose id does not
//! match the current in-flight record are dropped, which is how timeouts
//! and cancellations ignore late results.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use stratos_procedural::TerrainData;

use crate::cache::TileCache;
use crate::config::StreamingConfig;
use crate::error::{StreamingError, StreamingResult};
use crate::mesh::MeshBuilder;
use crate::prediction::Predictor;
use crate::queue::{ErrorCallback, PushOutcome, RequestQueue, SuccessCallback, TileRequest};
use crate::source::TerrainSource;
use crate::stats::StreamingStats;
use crate::tile::{TerrainTile, TileId, TileLayout, TileState};
use crate::worker::{WorkerMessage, WorkerPool};

/// What happened to a [`TerrainStreamer::request_tile`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Already loaded, failed, pending, or an invalid request.
    Rejected,
    /// Served from the cache; the tile is ready and `on_success` has run.
    CacheHit,
    /// Added to the queue.
    Queued,
    /// Replaced a less urgent queued request for the same tile.
    Replaced,
    /// Queue full; dropped without a callback.
    Dropped,
}

/// A dispatched request.
struct InFlight {
    request: TileRequest,
    attempt: u64,
}

/// A failed request waiting to be queued again.
struct PendingRetry {
    request: TileRequest,
    due: Instant,
}

/// Tile streaming orchestrator. Drive it with `update` once per frame.
pub struct TerrainStreamer {
    config: StreamingConfig,
    layout: TileLayout,
    pool: WorkerPool,
    mesher: Box<dyn MeshBuilder>,
    predictor: Predictor,
    queue: RequestQueue,
    in_flight: HashMap<TileId, InFlight>,
    retries: HashMap<TileId, PendingRetry>,
    cache: TileCache,
    tiles: HashMap<TileId, TerrainTile>,
    next_attempt: u64,
    sea_level: f32,
    stats: StreamingStats,
}

impl TerrainStreamer {
    /// Creates a streamer and starts its worker threads.
    ///
    /// # Errors
    ///
    /// `StreamingError::InvalidInput` for an invalid config and
    /// `StreamingError::WorkerSpawn` if a worker cannot start.
    pub fn new(
        config: StreamingConfig,
        source: Arc<dyn TerrainSource>,
        mesher: Box<dyn MeshBuilder>,
    ) -> StreamingResult<Self> {
        config
            .validate()
            .map_err(|err| StreamingError::InvalidInput(err.to_string()))?;
        let pool = WorkerPool::new(config.worker_count, source)?;

        Ok(Self {
            layout: config.layout(),
            predictor: Predictor::new(&config),
            queue: RequestQueue::new(config.queue_capacity),
            cache: TileCache::new(config.cache_max_entries, config.cache_max_age()),
            in_flight: HashMap::new(),
            retries: HashMap::new(),
            tiles: HashMap::new(),
            next_attempt: 0,
            sea_level: 0.0,
            stats: StreamingStats::default(),
            pool,
            mesher,
            config,
        })
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Tile geometry.
    #[must_use]
    pub const fn layout(&self) -> TileLayout {
        self.layout
    }

    /// Elevation reported where no tile has data.
    pub fn set_sea_level(&mut self, sea_level: f32) {
        self.sea_level = sea_level;
    }

    /// Requests a tile.
    ///
    /// Rejected when the tile is tracked (loaded, failed or pending) unless
    /// it is queued and this request is strictly more urgent. A cached tile
    /// is applied synchronously without dispatching work.
    pub fn request_tile(
        &mut self,
        level: u8,
        x: i32,
        z: i32,
        priority: u32,
        on_success: Option<SuccessCallback>,
        on_error: Option<ErrorCallback>,
    ) -> RequestOutcome {
        if level > self.layout.max_level {
            tracing::warn!(
                "Rejected tile request at level {} (max {})",
                level,
                self.layout.max_level
            );
            return RequestOutcome::Rejected;
        }
        let tile = TileId::new(level, x, z);
        let now = Instant::now();

        if self.queue.contains(tile) {
            let request = TileRequest::new(tile, priority, now, on_success, on_error);
            return match self.queue.push(request) {
                PushOutcome::Replaced => RequestOutcome::Replaced,
                _ => RequestOutcome::Rejected,
            };
        }
        if self.in_flight.contains_key(&tile)
            || self.retries.contains_key(&tile)
            || self.tiles.contains_key(&tile)
        {
            return RequestOutcome::Rejected;
        }

        if let Some(data) = self.cache.get(tile, now) {
            self.install(tile, &data);
            if let Some(callback) = on_success {
                callback(tile, data);
            }
            return RequestOutcome::CacheHit;
        }

        let request = TileRequest::new(tile, priority, now, on_success, on_error);
        match self.queue.push(request) {
            PushOutcome::Queued => {
                let mut node = TerrainTile::new(tile, self.layout);
                node.set_state(TileState::Loading);
                self.tiles.insert(tile, node);
                RequestOutcome::Queued
            }
            PushOutcome::Dropped => {
                self.stats.total_dropped += 1;
                tracing::trace!("Request queue full, dropped {}", tile);
                RequestOutcome::Dropped
            }
            PushOutcome::Replaced => RequestOutcome::Replaced,
            PushOutcome::Rejected => RequestOutcome::Rejected,
        }
    }

    /// Per-frame update at the current time. Never blocks and never fails.
    pub fn update(&mut self) {
        self.update_at(Instant::now());
    }

    /// Per-frame update with an explicit clock reading for timeouts,
    /// retries and cache ages. Message merging is bounded by the frame
    /// budget on the real clock.
    ///
    /// A dispatched request times out once `request_timeout` has passed
    /// since it was submitted, so time spent queued counts. A retry
    /// restarts the clock when it re-enters the queue.
    pub fn update_at(&mut self, now: Instant) {
        self.expire_timeouts(now);
        self.promote_retries(now);
        self.drain_messages(now);
        self.dispatch();
        self.cache.evict(now);
        self.refresh_stats();
    }

    fn expire_timeouts(&mut self, now: Instant) {
        let timeout = self.config.request_timeout();
        let expired: Vec<TileId> = self
            .in_flight
            .iter()
            .filter(|(_, f)| now.saturating_duration_since(f.request.submitted_at) > timeout)
            .map(|(tile, _)| *tile)
            .collect();

        for tile in expired {
            let Some(flight) = self.in_flight.remove(&tile) else {
                continue;
            };
            let elapsed = now.saturating_duration_since(flight.request.submitted_at);
            tracing::warn!("Tile {} timed out after {:?}", tile, elapsed);
            self.stats.total_timeouts += 1;
            let error = StreamingError::Timeout {
                tile,
                elapsed_ms: elapsed.as_millis() as u64,
            };
            self.fail(flight.request, &error);
        }
    }

    fn promote_retries(&mut self, now: Instant) {
        let due: Vec<TileId> = self
            .retries
            .iter()
            .filter(|(_, r)| r.due <= now)
            .map(|(tile, _)| *tile)
            .collect();

        for tile in due {
            if let Some(mut retry) = self.retries.remove(&tile) {
                // Each attempt gets the full timeout window
                retry.request.submitted_at = now;
                self.queue.push_retry(retry.request);
                if let Some(node) = self.tiles.get_mut(&tile) {
                    node.set_state(TileState::Loading);
                }
            }
        }
    }

    fn drain_messages(&mut self, now: Instant) {
        let deadline = Instant::now() + self.config.frame_budget();
        while Instant::now() < deadline {
            let Some(message) = self.pool.try_recv() else {
                break;
            };
            self.handle_message(message, now);
        }
    }

    fn handle_message(&mut self, message: WorkerMessage, now: Instant) {
        let tile = message.tile();
        let current = self.in_flight.get(&tile).map(|f| f.attempt);
        if current != Some(message.attempt()) {
            tracing::debug!(
                "Dropped stale result for {} (attempt {})",
                tile,
                message.attempt()
            );
            return;
        }
        let Some(flight) = self.in_flight.remove(&tile) else {
            return;
        };

        match message {
            WorkerMessage::Result { data, elapsed, .. } => {
                self.stats.record_load_time(elapsed);
                self.cache.insert(tile, Arc::clone(&data), now);
                self.install(tile, &data);
                tracing::debug!("Loaded {} in {:?}", tile, elapsed);
                flight.request.succeed(&data);
            }
            WorkerMessage::Error { reason, .. } => {
                let mut request = flight.request;
                request.retries += 1;
                if request.retries <= self.config.retry_attempts {
                    tracing::debug!(
                        "Generation of {} failed ({}), retry {}/{}",
                        tile,
                        reason,
                        request.retries,
                        self.config.retry_attempts
                    );
                    self.stats.total_retries += 1;
                    if let Some(node) = self.tiles.get_mut(&tile) {
                        node.set_state(TileState::Loading);
                    }
                    self.retries.insert(
                        tile,
                        PendingRetry {
                            request,
                            due: now + self.config.retry_delay(),
                        },
                    );
                } else {
                    tracing::warn!("Generation of {} failed: {}", tile, reason);
                    let error = StreamingError::GenerationFailed {
                        tile,
                        attempts: request.retries,
                        reason,
                    };
                    self.fail(request, &error);
                }
            }
        }
    }

    fn dispatch(&mut self) {
        let mut dispatched = 0;
        while dispatched < self.config.max_requests_per_frame
            && self.in_flight.len() < self.config.max_concurrent_requests
        {
            let Some(request) = self.queue.pop() else {
                break;
            };
            let tile = request.tile;
            let attempt = self.next_attempt;
            self.next_attempt += 1;

            let submitted = self.pool.submit(
                tile,
                attempt,
                self.config.resolution,
                self.layout.tile_size(tile.level),
            );
            if let Err(error) = submitted {
                tracing::error!("Could not dispatch {}: {}", tile, error);
                self.fail(request, &error);
                continue;
            }

            if let Some(node) = self.tiles.get_mut(&tile) {
                node.set_state(TileState::Generating);
            }
            self.in_flight.insert(
                tile,
                InFlight { request, attempt },
            );
            dispatched += 1;
        }
    }

    /// Marks the tile failed and fires the request's error callbacks.
    fn fail(&mut self, request: TileRequest, error: &StreamingError) {
        let layout = self.layout;
        self.tiles
            .entry(request.tile)
            .or_insert_with(|| TerrainTile::new(request.tile, layout))
            .set_state(TileState::Error);
        self.stats.total_failed += 1;
        request.fail(error);
    }

    /// Attaches data and a freshly built mesh to the tile.
    fn install(&mut self, tile: TileId, data: &Arc<TerrainData>) {
        let layout = self.layout;
        let node = self
            .tiles
            .entry(tile)
            .or_insert_with(|| TerrainTile::new(tile, layout));
        node.set_terrain_data(Arc::clone(data));
        let mesh = self.mesher.build(tile, data);
        node.set_mesh(Arc::new(mesh));
    }

    fn refresh_stats(&mut self) {
        let mut loading = 0;
        let mut ready = 0;
        let mut failed = 0;
        let mut memory = 0;
        for node in self.tiles.values() {
            match node.state() {
                TileState::Loading | TileState::Generating => loading += 1,
                TileState::Ready => ready += 1,
                TileState::Error => failed += 1,
                TileState::Unloaded | TileState::Loaded => {}
            }
            memory += node.data().map_or(0, |d| d.memory_bytes());
            memory += node.mesh().map_or(0, |m| m.memory_bytes());
        }
        // Cached data shared with a live tile is counted once
        memory += self.cache_only_bytes();

        let stats = &mut self.stats;
        stats.tiles_in_memory = self.tiles.len();
        stats.tiles_loading = loading;
        stats.tiles_ready = ready;
        stats.tiles_failed = failed;
        stats.queued_requests = self.queue.len();
        stats.in_flight_requests = self.in_flight.len();
        stats.cache_entries = self.cache.len();
        stats.cache_hit_rate = self.cache.hit_rate();
        stats.memory_bytes = memory;
    }

    fn cache_only_bytes(&self) -> usize {
        let shared: usize = self
            .tiles
            .values()
            .filter(|node| self.cache.contains(node.id()))
            .filter_map(|node| node.data().map(|d| d.memory_bytes()))
            .sum();
        self.cache.memory_bytes().saturating_sub(shared)
    }

    /// Requests the tiles around the camera's predicted position.
    ///
    /// Invalid input is logged and ignored. Returns the number of requests
    /// that were queued, replaced or served from the cache.
    pub fn predict_and_prefetch(
        &mut self,
        camera_position: [f64; 3],
        camera_velocity: [f64; 3],
        view_distance: f64,
    ) -> usize {
        let plan = match self
            .predictor
            .plan(camera_position, camera_velocity, view_distance)
        {
            Ok(plan) => plan,
            Err(err) => {
                tracing::warn!("Skipped prefetch: {}", err);
                return 0;
            }
        };

        plan.into_iter()
            .filter(|p| {
                matches!(
                    self.request_tile(p.tile.level, p.tile.x, p.tile.z, p.priority, None, None),
                    RequestOutcome::Queued | RequestOutcome::Replaced | RequestOutcome::CacheHit
                )
            })
            .count()
    }

    /// Cancels a queued, waiting or in-flight request. No callback fires
    /// and any late worker result is dropped.
    ///
    /// Returns whether a request existed.
    pub fn cancel_request(&mut self, tile: TileId) -> bool {
        let queued = self.queue.remove(tile).is_some();
        let dispatched = self.in_flight.remove(&tile).is_some();
        let waiting = self.retries.remove(&tile).is_some();
        let cancelled = queued || dispatched || waiting;
        if cancelled {
            if let Some(node) = self.tiles.get(&tile) {
                if node.data().is_none() {
                    self.tiles.remove(&tile);
                }
            }
            tracing::debug!("Cancelled request for {}", tile);
        }
        cancelled
    }

    /// Elevation at a world position from the finest tile holding data,
    /// or sea level when no tile covers it.
    #[must_use]
    pub fn get_height_at(&self, world_x: f64, world_z: f64) -> f32 {
        if !world_x.is_finite() || !world_z.is_finite() {
            tracing::warn!("Height query at non-finite position ({}, {})", world_x, world_z);
            return self.sea_level;
        }
        (0..=self.layout.max_level)
            .rev()
            .find_map(|level| {
                let id = self.layout.tile_at(world_x, world_z, level);
                self.tiles.get(&id)?.height_at(world_x, world_z)
            })
            .unwrap_or(self.sea_level)
    }

    /// Drops a tile and any pending request for it. Its data moves to the
    /// cache so a later request is served synchronously.
    ///
    /// Returns whether the tile was tracked.
    pub fn unload_tile(&mut self, tile: TileId) -> bool {
        let tracked = self.tiles.contains_key(&tile);
        self.cancel_request(tile);
        // A pending tile without data is already gone after the cancel
        let Some(mut node) = self.tiles.remove(&tile) else {
            return tracked;
        };
        if let Some(data) = node.data() {
            self.cache.insert(tile, Arc::clone(data), Instant::now());
        }
        node.dispose();
        true
    }

    /// Unloads every tile whose bounds lie farther than `keep_radius` from
    /// the camera. Returns the number unloaded.
    pub fn unload_distant(&mut self, camera: [f64; 3], keep_radius: f64) -> usize {
        if !camera.iter().all(|c| c.is_finite()) || !keep_radius.is_finite() {
            tracing::warn!("Skipped unload: invalid camera {:?} or radius {}", camera, keep_radius);
            return 0;
        }
        let distant: Vec<TileId> = self
            .tiles
            .values()
            .filter(|node| node.bounds().distance_xz(camera[0], camera[2]) > keep_radius)
            .map(TerrainTile::id)
            .collect();
        distant.into_iter().filter(|&tile| self.unload_tile(tile)).count()
    }

    /// Forgets every tile, pending request and cache entry. Late worker
    /// results are dropped. Used when the terrain source changes.
    pub fn clear(&mut self) {
        let pending = self.queue.len() + self.in_flight.len() + self.retries.len();
        while self.queue.pop().is_some() {}
        self.in_flight.clear();
        self.retries.clear();
        for node in self.tiles.values_mut() {
            node.dispose();
        }
        self.tiles.clear();
        self.cache.clear();
        tracing::info!("Streamer cleared, {} pending requests dropped", pending);
        self.refresh_stats();
    }

    /// A tracked tile.
    #[must_use]
    pub fn tile(&self, tile: TileId) -> Option<&TerrainTile> {
        self.tiles.get(&tile)
    }

    /// State of a tile, `Unloaded` if untracked.
    #[must_use]
    pub fn tile_state(&self, tile: TileId) -> TileState {
        self.tiles.get(&tile).map_or(TileState::Unloaded, TerrainTile::state)
    }

    /// Tiles ready for rendering.
    pub fn ready_tiles(&self) -> impl Iterator<Item = &TerrainTile> + '_ {
        self.tiles.values().filter(|node| node.is_ready_for_render())
    }

    /// Whether the tile has a queued, waiting or in-flight request.
    #[must_use]
    pub fn is_pending(&self, tile: TileId) -> bool {
        self.queue.contains(tile) || self.in_flight.contains_key(&tile) || self.retries.contains_key(&tile)
    }

    /// Whether the cache holds data for `tile`.
    #[must_use]
    pub fn is_cached(&self, tile: TileId) -> bool {
        self.cache.contains(tile)
    }

    /// Statistics as of the last `update`.
    #[must_use]
    pub const fn stats(&self) -> StreamingStats {
        self.stats
    }

    /// Worker threads in the pool.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Generation commands sent to workers since start.
    #[must_use]
    pub fn dispatch_count(&self) -> u64 {
        self.pool.stats().submitted.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Waits up to `timeout`, updating every millisecond, until nothing is
    /// pending. Returns whether the pipeline went idle.
    pub fn flush(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.update();
            if self.queue.is_empty() && self.in_flight.is_empty() && self.retries.is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}
