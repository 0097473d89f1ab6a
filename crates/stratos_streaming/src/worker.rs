//! # Generation Worker Pool
//!
//! A fixed set of named OS threads fed through crossbeam channels.
//!
//! ## Protocol
//!
//! ```text
//! Orchestrator ──WorkerCommand──▶ [ command channel ] ──▶ worker threads
//! Orchestrator ◀──WorkerMessage── [ result channel  ] ◀── worker threads
//! ```
//!
//! Every `Generate` command is answered by exactly one message carrying the
//! same `attempt` id, unless the pool is shutting down. Workers share no
//! state with the orchestrator beyond the channels and a few counters.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use stratos_procedural::TerrainData;

use crate::error::{StreamingError, StreamingResult};
use crate::source::TerrainSource;
use crate::tile::TileId;

/// Orchestrator to worker.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerCommand {
    /// Generate one tile.
    Generate {
        /// The tile.
        tile: TileId,
        /// Attempt id echoed in the reply.
        attempt: u64,
        /// Samples per side.
        resolution: usize,
        /// Edge length (meters).
        tile_size: f64,
    },
    /// Stop the receiving worker.
    Shutdown,
}

/// Worker to orchestrator.
#[derive(Clone, Debug)]
pub enum WorkerMessage {
    /// Generation succeeded.
    Result {
        /// The tile.
        tile: TileId,
        /// Attempt id of the command.
        attempt: u64,
        /// Generated data.
        data: Arc<TerrainData>,
        /// Time spent generating.
        elapsed: Duration,
    },
    /// Generation failed or panicked.
    Error {
        /// The tile.
        tile: TileId,
        /// Attempt id of the command.
        attempt: u64,
        /// What went wrong.
        reason: String,
    },
}

impl WorkerMessage {
    /// The tile this message is about.
    #[must_use]
    pub const fn tile(&self) -> TileId {
        match self {
            Self::Result { tile, .. } | Self::Error { tile, .. } => *tile,
        }
    }

    /// The attempt id this message answers.
    #[must_use]
    pub const fn attempt(&self) -> u64 {
        match self {
            Self::Result { attempt, .. } | Self::Error { attempt, .. } => *attempt,
        }
    }
}

/// Counters shared with the worker threads.
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Commands submitted.
    pub submitted: AtomicU64,
    /// Successful generations.
    pub completed: AtomicU64,
    /// Failed or panicked generations.
    pub failed: AtomicU64,
    /// Total generation time in microseconds.
    pub busy_micros: AtomicU64,
}

impl WorkerStats {
    /// Commands submitted but not yet answered.
    #[must_use]
    pub fn pending(&self) -> u64 {
        let done = self.completed.load(Ordering::Relaxed) + self.failed.load(Ordering::Relaxed);
        self.submitted.load(Ordering::Relaxed).saturating_sub(done)
    }
}

/// Fixed pool of generation threads.
pub struct WorkerPool {
    commands: Sender<WorkerCommand>,
    results: Receiver<WorkerMessage>,
    handles: Vec<JoinHandle<()>>,
    stats: Arc<WorkerStats>,
    shutting_down: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `count` workers calling `source`.
    ///
    /// # Errors
    ///
    /// `StreamingError::WorkerSpawn` if a thread cannot be started;
    /// `StreamingError::InvalidInput` for a zero count.
    pub fn new(count: usize, source: Arc<dyn TerrainSource>) -> StreamingResult<Self> {
        if count == 0 {
            return Err(StreamingError::InvalidInput(
                "worker pool needs at least one thread".to_string(),
            ));
        }

        let (command_tx, command_rx) = unbounded();
        let (result_tx, result_rx) = unbounded();
        let stats = Arc::new(WorkerStats::default());
        let shutting_down = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(count);
        for index in 0..count {
            let worker = Worker {
                commands: command_rx.clone(),
                results: result_tx.clone(),
                source: Arc::clone(&source),
                stats: Arc::clone(&stats),
                shutting_down: Arc::clone(&shutting_down),
            };
            let handle = thread::Builder::new()
                .name(format!("terrain-worker-{index}"))
                .spawn(move || worker.run())?;
            handles.push(handle);
        }

        tracing::info!("Started {} terrain workers", count);

        Ok(Self {
            commands: command_tx,
            results: result_rx,
            handles,
            stats,
            shutting_down,
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Shared counters.
    #[must_use]
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Queues a generation command. Never blocks.
    ///
    /// # Errors
    ///
    /// `StreamingError::WorkerDisconnected` if every worker has exited.
    pub fn submit(
        &self,
        tile: TileId,
        attempt: u64,
        resolution: usize,
        tile_size: f64,
    ) -> StreamingResult<()> {
        self.commands
            .send(WorkerCommand::Generate {
                tile,
                attempt,
                resolution,
                tile_size,
            })
            .map_err(|_| StreamingError::WorkerDisconnected)?;
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Next finished message, if any. Never blocks.
    #[must_use]
    pub fn try_recv(&self) -> Option<WorkerMessage> {
        match self.results.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Waits up to `timeout` for a message.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkerMessage> {
        match self.results.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutting_down.store(true, Ordering::Release);
        for _ in &self.handles {
            let _ = self.commands.send(WorkerCommand::Shutdown);
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("Terrain worker exited abnormally");
            }
        }
    }
}

/// State owned by one worker thread.
struct Worker {
    commands: Receiver<WorkerCommand>,
    results: Sender<WorkerMessage>,
    source: Arc<dyn TerrainSource>,
    stats: Arc<WorkerStats>,
    shutting_down: Arc<AtomicBool>,
}

impl Worker {
    fn run(self) {
        for command in &self.commands {
            let WorkerCommand::Generate {
                tile,
                attempt,
                resolution,
                tile_size,
            } = command
            else {
                break;
            };
            if self.shutting_down.load(Ordering::Acquire) {
                continue;
            }

            let message = self.generate(tile, attempt, resolution, tile_size);
            // Orchestrator gone: nothing left to do
            if self.results.send(message).is_err() {
                break;
            }
        }
    }

    fn generate(&self, tile: TileId, attempt: u64, resolution: usize, tile_size: f64) -> WorkerMessage {
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.source.generate_tile(tile, resolution, tile_size)
        }));
        let elapsed = started.elapsed();
        self.stats
            .busy_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);

        match outcome {
            Ok(Ok(data)) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                WorkerMessage::Result {
                    tile,
                    attempt,
                    data: Arc::new(data),
                    elapsed,
                }
            }
            Ok(Err(err)) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                WorkerMessage::Error {
                    tile,
                    attempt,
                    reason: err.to_string(),
                }
            }
            Err(payload) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("Terrain worker panicked on {}: {}", tile, detail);
                WorkerMessage::Error {
                    tile,
                    attempt,
                    reason: format!("worker panicked: {detail}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use std::collections::HashSet;

    struct FlatSource;

    impl TerrainSource for FlatSource {
        fn generate_tile(
            &self,
            tile: TileId,
            resolution: usize,
            tile_size: f64,
        ) -> Result<TerrainData, SourceError> {
            if tile.x < 0 {
                return Err(SourceError("negative tile".to_string()));
            }
            if tile.z < 0 {
                panic!("boom");
            }
            let n = resolution * resolution;
            Ok(TerrainData {
                resolution,
                tile_size,
                origin_x: f64::from(tile.x) * tile_size,
                origin_z: f64::from(tile.z) * tile_size,
                heightmap: vec![10.0; n],
                normals: vec![[0.0, 1.0, 0.0]; n],
                slopes: vec![0.0; n],
                materials: vec![stratos_procedural::Biome::Grassland; n],
                water_mask: vec![false; n],
                uvs: vec![[0.0, 0.0]; n],
                water_bodies: Vec::new(),
            })
        }
    }

    fn pool(count: usize) -> WorkerPool {
        WorkerPool::new(count, Arc::new(FlatSource)).unwrap()
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            WorkerPool::new(0, Arc::new(FlatSource)),
            Err(StreamingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_every_command_answered_once() {
        let pool = pool(3);
        for x in 0..12 {
            pool.submit(TileId::new(0, x, 0), x as u64, 4, 100.0).unwrap();
        }

        let mut attempts = HashSet::new();
        while attempts.len() < 12 {
            let message = pool
                .recv_timeout(Duration::from_secs(5))
                .expect("worker answered");
            assert!(matches!(message, WorkerMessage::Result { .. }));
            assert!(attempts.insert(message.attempt()));
        }
        assert_eq!(pool.stats().completed.load(Ordering::Relaxed), 12);
        assert_eq!(pool.stats().pending(), 0);
    }

    #[test]
    fn test_failures_and_panics_become_errors() {
        let pool = pool(1);
        pool.submit(TileId::new(0, -1, 0), 1, 4, 100.0).unwrap();
        pool.submit(TileId::new(0, 1, -1), 2, 4, 100.0).unwrap();

        for _ in 0..2 {
            match pool.recv_timeout(Duration::from_secs(5)).unwrap() {
                WorkerMessage::Error { attempt: 1, reason, .. } => assert_eq!(reason, "negative tile"),
                WorkerMessage::Error { attempt: 2, reason, .. } => {
                    assert!(reason.contains("boom"));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(pool.stats().failed.load(Ordering::Relaxed), 2);

        // The worker survives the panic
        pool.submit(TileId::new(0, 2, 2), 3, 4, 100.0).unwrap();
        let message = pool.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(message.tile(), TileId::new(0, 2, 2));
    }

    #[test]
    fn test_drop_joins_threads() {
        let pool = pool(4);
        assert_eq!(pool.worker_count(), 4);
        pool.submit(TileId::new(0, 0, 0), 0, 4, 100.0).unwrap();
        drop(pool);
    }
}
