//! Scripted camera run over a world.

use glam::Vec3;
use strata_voxel::{BlockCoord, BlockType};
use strata_world::{WORLD_HEIGHT, World, WorldStats};

/// Camera that hovers over its start for a while, then flies along +x.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPath {
    pub start: Vec3,
    /// Ticks spent hovering before the flight starts.
    pub hover_ticks: u64,
    /// Blocks moved per tick once flying.
    pub speed: f32,
}

impl Default for CameraPath {
    fn default() -> Self {
        Self {
            start: Vec3::new(8.0, 80.0, 8.0),
            hover_ticks: 300,
            speed: 0.25,
        }
    }
}

impl CameraPath {
    pub fn position(&self, tick: u64) -> Vec3 {
        let flown = tick.saturating_sub(self.hover_ticks) as f32 * self.speed;
        self.start + Vec3::X * flown
    }
}

/// Totals from one run.
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub ticks: u64,
    pub chunks_started: usize,
    pub chunks_unloaded: usize,
    /// Blocks dug out by the crater at the end of the hover.
    pub blocks_removed: usize,
    pub stats: WorldStats,
}

/// Radius of the crater dug under the camera once hovering ends.
const CRATER_RADIUS: i32 = 4;

/// Ticks `world` along `path` for `ticks` frames. Statistics are logged
/// every `report_interval` ticks (never when it is 0).
pub fn run(world: &mut World, path: &CameraPath, ticks: u64, report_interval: u64) -> RunSummary {
    let mut summary = RunSummary::default();
    for tick in 0..ticks {
        let camera = path.position(tick);
        let report = world.tick(camera);
        summary.ticks += 1;
        summary.chunks_started += usize::from(report.started.is_some());
        summary.chunks_unloaded += report.unloaded;

        if tick + 1 == path.hover_ticks
            && let Some(ground) = ground_below(world, camera)
        {
            summary.blocks_removed +=
                world.remove_blocks_within_radius(ground, CRATER_RADIUS, |_, _| {});
            tracing::info!(?ground, removed = summary.blocks_removed, "dug a crater");
        }

        if report_interval > 0 && (tick + 1) % report_interval == 0 {
            log_stats(&world.stats());
        }
    }
    summary.stats = world.stats();
    summary
}

/// Topmost solid, loaded block under `camera`.
pub fn ground_below(world: &World, camera: Vec3) -> Option<BlockCoord> {
    let top = BlockCoord::from_position(camera);
    (0..WORLD_HEIGHT.min(top.y + 1))
        .rev()
        .map(|y| BlockCoord::new(top.x, y, top.z))
        .find(|&position| {
            world
                .block_at(position)
                .is_some_and(|block| block.is_active() && block.block_type() != BlockType::Water)
        })
}

pub fn log_stats(stats: &WorldStats) {
    tracing::info!(
        tick = stats.ticks,
        chunks = stats.chunks,
        listed = stats.listed,
        unloading = stats.unloading,
        queued = stats.scheduler.queued,
        completed = stats.scheduler.completed,
        failed = stats.scheduler.failed,
        triangles = stats.visible_triangles,
        "world stats"
    );
}
