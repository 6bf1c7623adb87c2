//! The chunk processing engine of a streaming voxel world.
//!
//! Chunks are pooled, indexed by coordinate in a [`ChunkRepository`], and
//! moved through their lifecycle by [`World::tick`]: loaded from a
//! [`ChunkStore`], generated and meshed on scheduler workers, finalized on
//! the tick under a frame budget, and unloaded once out of view.

pub mod async_store;
pub mod budget;
pub mod chunk;
pub mod error;
pub mod generation;
pub mod jobs;
pub mod meshing;
pub mod processing;
pub mod repository;
pub mod settings;
pub mod state;
pub mod store;
pub mod streaming;
pub mod structure;
mod sync;
mod transparency;
pub mod world;

pub use async_store::AsyncStore;
pub use budget::{DEFAULT_FRAME, FrameBudget};
pub use chunk::{BlockModification, Chunk, LIGHT_UPDATE_RADIUS};
pub use error::{StoreError, WorldError};
pub use generation::TerrainGenerator;
pub use jobs::{ChunkJob, WorldContext, WorldExecutor};
pub use processing::ProcessingList;
pub use repository::ChunkRepository;
pub use settings::{BudgetSettings, MAX_STRUCTURE_RADIUS, WORLD_HEIGHT, WorldSettings};
pub use state::ChunkState;
pub use store::{ChunkStore, FileStore, MemoryStore, WorldMeta, chunk_id};
pub use streaming::{ChunkPool, ChunkStreamer};
pub use structure::{PlacedStructure, StructureTemplate};
pub use world::{TickReport, World, WorldStats};
