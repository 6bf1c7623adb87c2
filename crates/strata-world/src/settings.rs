//! Plain settings the world is built from.

use std::time::Duration;

use strata_jobs::SchedulerConfig;
use strata_voxel::CHUNK_SIZE;

use crate::budget::DEFAULT_FRAME;

/// World height in blocks.
pub const WORLD_HEIGHT: i32 = 128;

/// Furthest a structure may reach from its origin, in blocks.
pub const MAX_STRUCTURE_RADIUS: i32 = 10;

/// Per-tick deadlines, each a fraction of one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct BudgetSettings {
    pub frame: Duration,
    /// Chunks from the processing list are visited while under this.
    pub start_work: f32,
    /// Requesting one new chunk.
    pub new_chunk: f32,
    /// Replaying deferred block writes.
    pub flush: f32,
    /// Stepping finished meshes into their render slots.
    pub finish_mesh: f32,
    /// Scheduling mesh builds.
    pub generate_mesh: f32,
    /// Flagging the neighbors of freshly generated chunks.
    pub mark_surrounding: f32,
    /// Scheduling block generation.
    pub generate_blocks: f32,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            frame: DEFAULT_FRAME,
            start_work: 0.8,
            new_chunk: 0.8,
            flush: 0.8,
            finish_mesh: 0.4,
            generate_mesh: 0.5,
            mark_surrounding: 0.5,
            generate_blocks: 0.5,
        }
    }
}

#[derive(Clone, Debug)]
pub struct WorldSettings {
    /// Horizontal view distance in chunks.
    pub view_distance: i32,
    /// Rings at the edge of the view that are never requested, only kept.
    pub view_gap: i32,
    /// Chunks stacked in one column.
    pub height_chunks: i32,
    /// Extra slots per axis in the spatial index beyond the view volume.
    pub index_padding: i32,
    pub structure_radius: i32,
    pub scheduler: SchedulerConfig,
    /// No new jobs are scheduled while the queue is this long.
    pub max_queued_jobs: usize,
    pub processing_reprioritize_batch: usize,
    pub budget: BudgetSettings,
    /// Seed used when the store has none.
    pub seed: i32,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            view_distance: 7,
            view_gap: 2,
            height_chunks: WORLD_HEIGHT / CHUNK_SIZE,
            index_padding: 8,
            structure_radius: MAX_STRUCTURE_RADIUS,
            scheduler: SchedulerConfig::default(),
            max_queued_jobs: 2000,
            processing_reprioritize_batch: 400,
            budget: BudgetSettings::default(),
            seed: 0,
        }
    }
}

impl WorldSettings {
    /// Chunks needed to cover the whole view volume.
    pub fn pool_size(&self) -> usize {
        let side = (self.view_distance * 2 + 1).max(1) as usize;
        side * side * self.height_chunks.max(1) as usize
    }

    /// Chunk rings whose structure locks a generating chunk takes.
    pub fn structure_reach(&self) -> i32 {
        (self.structure_radius.max(0) + CHUNK_SIZE - 1) / CHUNK_SIZE
    }
}
