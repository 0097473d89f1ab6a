//! # STRATOS Terrain Streaming
//!
//! Tile quadtree and the asynchronous loading pipeline that feeds it.
//!
//! ## Architecture
//!
//! ```text
//! Camera ──▶ TerrainQuadtree ──leaves──▶ TerrainStreamer ──commands──▶ WorkerPool
//!                  ▲                          │    ▲                       │
//!                  └───────attach─────────────┘    └───────messages────────┘
//!                                         TileCache (LRU + max age)
//! ```
//!
//! ## Rules
//!
//! 1. **One owner**: the streamer alone mutates the queue, cache and tiles
//! 2. **No blocking**: `update` never waits on a worker
//! 3. **No failures across `update`**: errors reach callers via `on_error`
//! 4. **One request per tile**: duplicates are rejected or coalesced

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod cache;
pub mod config;
pub mod error;
pub mod mesh;
pub mod prediction;
pub mod quadtree;
pub mod queue;
pub mod source;
pub mod stats;
pub mod streamer;
pub mod tile;
pub mod worker;

pub use cache::{CacheEntry, TileCache};
pub use config::StreamingConfig;
pub use error::{SourceError, StreamingError, StreamingResult};
pub use mesh::{GridMeshBuilder, MeshBuilder, MeshData};
pub use prediction::{Prefetch, Predictor};
pub use quadtree::TerrainQuadtree;
pub use queue::{ErrorCallback, PushOutcome, RequestQueue, SuccessCallback, TileRequest};
pub use source::TerrainSource;
pub use stats::StreamingStats;
pub use streamer::{RequestOutcome, TerrainStreamer};
pub use tile::{Direction, TerrainTile, TileBounds, TileId, TileLayout, TileState};
pub use worker::{WorkerCommand, WorkerMessage, WorkerPool, WorkerStats};
