//! # STRATOS
//!
//! Procedural terrain world for a flight simulator. Ties together:
//!
//! - [`stratos_procedural`]: deterministic tile generation
//! - [`stratos_streaming`]: LOD quadtree and asynchronous tile streaming
//!
//! A host builds one [`TerrainWorld`] from a [`TerrainWorldConfig`] and
//! calls [`TerrainWorld::update`] once per frame with the camera state.
//!
//! ```rust,no_run
//! use stratos::{TerrainWorld, TerrainWorldConfig};
//!
//! let mut world = TerrainWorld::new(TerrainWorldConfig::default()).unwrap();
//! for _ in 0..600 {
//!     world.update([0.0, 1500.0, 0.0], [120.0, 0.0, 0.0], 8000.0);
//! }
//! println!("Ground below: {:.1} m", world.height_at(0.0, 0.0));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod world;

pub use config::{TerrainWorldConfig, DEFAULT_SEED};
pub use error::{WorldError, WorldResult};
pub use world::{FrameReport, SharedGenerator, TerrainWorld};

pub use stratos_procedural;
pub use stratos_streaming;
