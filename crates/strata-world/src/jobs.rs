//! The work the world hands to the scheduler.
//!
//! Jobs carry a chunk coordinate rather than a chunk reference: the worker
//! resolves it through the repository when the job starts, and quietly
//! drops the job if the chunk has moved on since it was queued.

use std::sync::Arc;

use strata_jobs::{Job, JobError, JobExecutor};
use strata_mesh::{LightSampler, RenderLayer};
use strata_voxel::ChunkCoord;

use crate::generation::{TerrainGenerator, run_generation};
use crate::meshing::run_mesh_build;
use crate::repository::ChunkRepository;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkJob {
    GenerateBlocks { chunk: ChunkCoord },
    BuildMesh { chunk: ChunkCoord, layer: RenderLayer },
}

impl Job for ChunkJob {
    /// Every job of a chunk shares its coordinate, so cancelling a chunk
    /// cancels all of its queued work.
    type Context = ChunkCoord;

    fn context(&self) -> ChunkCoord {
        match *self {
            ChunkJob::GenerateBlocks { chunk } | ChunkJob::BuildMesh { chunk, .. } => chunk,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ChunkJob::GenerateBlocks { .. } => "generate_blocks",
            ChunkJob::BuildMesh { .. } => "build_mesh",
        }
    }
}

/// Collaborators and shared state the jobs run against.
pub struct WorldContext {
    pub repository: Arc<ChunkRepository>,
    pub generator: Arc<dyn TerrainGenerator>,
    pub sampler: Arc<dyn LightSampler>,
    /// Chunk rings whose structure locks a generating chunk takes.
    pub structure_reach: i32,
}

/// Runs [`ChunkJob`]s on scheduler workers.
pub struct WorldExecutor {
    context: Arc<WorldContext>,
}

impl WorldExecutor {
    pub fn new(context: Arc<WorldContext>) -> Self {
        Self { context }
    }
}

impl JobExecutor<ChunkJob> for WorldExecutor {
    fn execute(&self, job: ChunkJob) -> Result<(), JobError> {
        match job {
            ChunkJob::GenerateBlocks { chunk } => run_generation(&self.context, chunk),
            ChunkJob::BuildMesh { chunk, layer } => run_mesh_build(&self.context, chunk, layer),
        }
    }
}
