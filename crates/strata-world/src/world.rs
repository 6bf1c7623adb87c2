//! The per-tick driver tying streaming, scheduling and meshing together.

use std::sync::Arc;

use glam::Vec3;
use rustc_hash::FxHashMap;
use strata_jobs::{Scheduler, SchedulerStats};
use strata_mesh::{LightSampler, MeshPool};
use strata_voxel::{Block, BlockCoord, BlockType, ChunkCoord};

use crate::async_store::AsyncStore;
use crate::budget::FrameBudget;
use crate::chunk::Chunk;
use crate::error::WorldError;
use crate::generation::{TerrainGenerator, generate_blocks};
use crate::jobs::{ChunkJob, WorldContext, WorldExecutor};
use crate::meshing::{finish_mesh_generation, generate_meshes, mark_surrounding_chunks_for_mesh_update};
use crate::repository::ChunkRepository;
use crate::settings::WorldSettings;
use crate::state::ChunkState;
use crate::store::{ChunkStore, WORLD_META_ID, WorldMeta};
use crate::streaming::ChunkStreamer;
use crate::sync::try_lock;

/// What one tick got done.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Chunk whose load was started this tick.
    pub started: Option<ChunkCoord>,
    /// Listed chunks visited before the budget ran out.
    pub processed: usize,
    pub unloaded: usize,
    /// Chunks that left the view this tick.
    pub culled: usize,
}

#[derive(Clone, Debug, Default)]
pub struct WorldStats {
    pub ticks: u64,
    pub chunks: usize,
    pub listed: usize,
    pub unloading: usize,
    pub pooled_chunks: usize,
    pub created_chunks: usize,
    pub pooled_meshes: usize,
    pub visible_triangles: usize,
    pub pending_saves: usize,
    pub scheduler: SchedulerStats,
    pub states: FxHashMap<ChunkState, usize>,
}

/// A streaming voxel world.
///
/// [`World::tick`] must be called from one thread; everything it starts runs
/// on the scheduler's workers or the store thread.
pub struct World {
    ctx: Arc<WorldContext>,
    scheduler: Scheduler<ChunkJob>,
    store: AsyncStore,
    streamer: ChunkStreamer,
    meshes: MeshPool,
    settings: WorldSettings,
    meta: WorldMeta,
    ticks: u64,
    shut_down: bool,
}

impl World {
    /// Builds the world and starts its worker and store threads.
    ///
    /// # Errors
    ///
    /// [`WorldError::Jobs`] or [`WorldError::Store`] when a thread cannot be
    /// spawned.
    pub fn new(
        settings: WorldSettings,
        generator: Arc<dyn TerrainGenerator>,
        sampler: Arc<dyn LightSampler>,
        store: Arc<dyn ChunkStore>,
    ) -> Result<Self, WorldError> {
        let meta = WorldMeta::load_or(store.as_ref(), settings.seed);
        let ctx = Arc::new(WorldContext {
            repository: Arc::new(ChunkRepository::new(&settings)),
            generator,
            sampler,
            structure_reach: settings.structure_reach(),
        });
        let scheduler = Scheduler::new(settings.scheduler.clone(), WorldExecutor::new(Arc::clone(&ctx)))?;
        let store = AsyncStore::new(store)?;
        tracing::info!(
            view_distance = settings.view_distance,
            height_chunks = settings.height_chunks,
            workers = scheduler.worker_count(),
            seed = meta.seed,
            "world created"
        );
        Ok(Self {
            ctx,
            scheduler,
            store,
            streamer: ChunkStreamer::new(&settings),
            meshes: MeshPool::default(),
            settings,
            meta,
            ticks: 0,
            shut_down: false,
        })
    }

    pub fn repository(&self) -> &Arc<ChunkRepository> {
        &self.ctx.repository
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// Seed the world was created with, as stored alongside its chunks.
    pub fn seed(&self) -> i32 {
        self.meta.seed
    }

    pub fn streamer(&self) -> &ChunkStreamer {
        &self.streamer
    }

    /// Advances the world by one frame with the viewer at `camera`.
    pub fn tick(&mut self, camera: Vec3) -> TickReport {
        let budget = FrameBudget::start(self.settings.budget.frame);
        let deadlines = self.settings.budget.clone();
        let repo = Arc::clone(&self.ctx.repository);
        let mut report = TickReport::default();
        self.ticks += 1;

        self.streamer.set_viewer(ChunkCoord::containing(camera));
        self.scheduler.set_viewpoint(camera);

        if budget.within(deadlines.new_chunk) {
            report.started = self.streamer.generate_new_chunk(&repo, &self.store);
        }

        for chunk in repo.processing().snapshot() {
            if !budget.within(deadlines.start_work) {
                break;
            }
            self.process_chunk(&repo, &chunk, &budget);
            report.processed += 1;
        }

        report.unloaded =
            self.streamer
                .unload_dead_chunks(&repo, &self.scheduler, &self.store, &mut self.meshes);
        report.culled = self.streamer.cleanup_old_chunks(&repo);
        self.scheduler.reprioritize();
        repo.processing().reprioritize(camera);
        repo.processing().flush(camera);
        report
    }

    fn process_chunk(&mut self, repo: &ChunkRepository, chunk: &Arc<Chunk>, budget: &FrameBudget) {
        let deadlines = &self.settings.budget;
        if !chunk.coord().is_assigned() || chunk.is_unloading() {
            repo.processing().remove(chunk);
            return;
        }
        if budget.within(deadlines.flush) {
            chunk.flush_modifications(repo, budget, deadlines.flush);
        }
        if budget.within(deadlines.finish_mesh) {
            finish_mesh_generation(chunk, budget, deadlines.finish_mesh);
        }
        let queue_open = self.scheduler.queue_len() < self.settings.max_queued_jobs;
        if queue_open && budget.within(deadlines.generate_mesh) {
            generate_meshes(repo, &self.scheduler, &mut self.meshes, chunk);
        }
        if budget.within(deadlines.mark_surrounding) {
            mark_surrounding_chunks_for_mesh_update(repo, chunk);
        }
        if queue_open && budget.within(deadlines.generate_blocks) {
            generate_blocks(repo, &self.scheduler, chunk);
        }

        if is_settled(chunk) {
            repo.processing().remove(chunk);
            // Something may have flagged it between the check and the removal.
            if !is_settled(chunk) {
                repo.processing().add(chunk);
            }
        }
    }

    /// The block at `position`, if its chunk holds real blocks.
    pub fn block_at(&self, position: BlockCoord) -> Option<Block> {
        self.ctx.repository.block_at(position)
    }

    /// Places a block and re-meshes everything its light could reach.
    pub fn set_block(&self, position: BlockCoord, block_type: BlockType) -> bool {
        self.ctx.repository.set_block_at(position, block_type, true)
    }

    /// Removes a block unless it is bedrock or not loaded.
    pub fn remove_block(
        &self,
        position: BlockCoord,
        on_removed: impl FnOnce(BlockCoord, BlockType),
    ) -> bool {
        self.ctx.repository.remove_block_at(position, on_removed)
    }

    pub fn remove_blocks_within_radius(
        &self,
        center: BlockCoord,
        radius: i32,
        on_removed: impl FnMut(BlockCoord, BlockType),
    ) -> usize {
        self.ctx
            .repository
            .remove_blocks_within_radius(center, radius, on_removed)
    }

    pub fn stats(&self) -> WorldStats {
        let repo = &self.ctx.repository;
        let chunks = repo.chunks();
        WorldStats {
            ticks: self.ticks,
            chunks: chunks.len(),
            listed: repo.processing().len(),
            unloading: self.streamer.unload_queue_len(),
            pooled_chunks: self.streamer.pool().available(),
            created_chunks: self.streamer.pool().created(),
            pooled_meshes: self.meshes.available(),
            visible_triangles: chunks.iter().map(|c| c.visible_triangles()).sum(),
            pending_saves: self.store.pending(),
            scheduler: self.scheduler.stats(),
            states: repo.state_counts(),
        }
    }

    /// Stops the workers, saves every chunk with unsaved edits and the world
    /// metadata, and waits for the store to finish writing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.scheduler.shutdown();

        let repo = Arc::clone(&self.ctx.repository);
        // Builds that never finished still owe their deferred writes.
        for chunk in repo.chunks() {
            if matches!(
                chunk.state(),
                ChunkState::MeshCalculating | ChunkState::MeshCalculationComplete
            ) {
                chunk.set_state(ChunkState::WaitingForMeshUpdate);
                chunk.flush_modifications(&repo, &FrameBudget::unlimited(), 1.0);
            }
        }
        let saved = repo.save_all_loaded_chunks(&self.store);
        self.store.put(WORLD_META_ID.to_string(), self.meta.encode());
        self.store.shutdown();
        tracing::info!(saved, ticks = self.ticks, "world shut down");
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Nothing left for the tick loop to do with `chunk`. A chunk another thread
/// is holding counts as unsettled and stays listed.
fn is_settled(chunk: &Chunk) -> bool {
    if chunk.state() != ChunkState::Done || chunk.needs_mesh_update() {
        return false;
    }
    let Some(data) = try_lock(&chunk.data) else {
        return false;
    };
    let Some(flags) = try_lock(&chunk.pending_flags) else {
        return false;
    };
    data.modifications.is_empty() && flags.is_empty()
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    use strata_jobs::SchedulerConfig;
    use strata_mesh::UniformLight;
    use strata_voxel::{CHUNK_SIZE, CHUNK_VOLUME, LocalCoord, decode_chunk};

    use super::*;
    use crate::settings::BudgetSettings;
    use crate::store::{MemoryStore, chunk_id};
    use crate::sync::lock;

    /// Stone up to y = 20, bedrock at the bottom, air above.
    struct FlatTerrain;

    impl TerrainGenerator for FlatTerrain {
        fn generate_blocks(&self, chunk: ChunkCoord) -> Vec<BlockType> {
            let mut types = vec![BlockType::Air; CHUNK_VOLUME];
            for (index, ty) in types.iter_mut().enumerate() {
                let y = LocalCoord::from_index(index).to_block(chunk).y;
                *ty = match y {
                    0 => BlockType::Bedrock,
                    1..=20 => BlockType::Stone,
                    _ => BlockType::Air,
                };
            }
            types
        }
    }

    fn settings() -> WorldSettings {
        WorldSettings {
            view_distance: 2,
            view_gap: 1,
            height_chunks: 3,
            scheduler: SchedulerConfig {
                workers: 2,
                ..Default::default()
            },
            budget: BudgetSettings {
                frame: Duration::from_secs(5),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn world(store: Arc<MemoryStore>) -> World {
        World::new(settings(), Arc::new(FlatTerrain), Arc::new(UniformLight::default()), store)
            .expect("world")
    }

    /// Ticks until every chunk in range is `Done`, checking on every tick
    /// that no chunk meshes beside a generating neighbor.
    fn tick_until_settled(world: &mut World, camera: Vec3) {
        let deadline = Instant::now() + Duration::from_secs(20);
        loop {
            let report = world.tick(camera);
            let repo = world.repository();
            for chunk in repo.chunks() {
                if chunk.state() != ChunkState::MeshCalculating {
                    continue;
                }
                for neighbor in chunk.coord().face_neighbors() {
                    let generating = repo
                        .chunk(neighbor)
                        .is_some_and(|n| n.state() == ChunkState::BlocksGenerating);
                    assert!(!generating, "{:?} meshing beside a generating chunk", chunk.coord());
                }
            }
            let stats = world.stats();
            let all_done = stats.states.get(&ChunkState::Done).copied().unwrap_or(0) == stats.chunks;
            if report.started.is_none() && all_done && stats.listed == 0 && stats.unloading == 0 {
                return;
            }
            assert!(Instant::now() < deadline, "world never settled: {}", repo.dump());
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_world_streams_to_done() {
        let mut world = world(Arc::new(MemoryStore::new()));
        tick_until_settled(&mut world, Vec3::new(8.0, 40.0, 8.0));

        let stats = world.stats();
        // Radius one ring around the viewer column, three chunks tall.
        assert_eq!(stats.chunks, 9 * 3);
        assert!(stats.visible_triangles > 0);
        assert_eq!(
            world.block_at(BlockCoord::new(3, 10, 3)).map(|b| b.block_type()),
            Some(BlockType::Stone)
        );
        assert!(!world.remove_block(BlockCoord::new(3, 0, 3), |_, _| panic!("bedrock removed")));
    }

    #[test]
    fn test_edit_remeshes_and_settles() {
        let mut world = world(Arc::new(MemoryStore::new()));
        let camera = Vec3::new(8.0, 40.0, 8.0);
        tick_until_settled(&mut world, camera);

        let position = BlockCoord::new(5, 21, 5);
        assert!(world.set_block(position, BlockType::Lamp));
        let chunk = world.repository().chunk(position.chunk()).expect("loaded");
        assert!(chunk.needs_mesh_update());
        tick_until_settled(&mut world, camera);
        assert_eq!(chunk.lights().len(), 1);

        let mut removed = Vec::new();
        assert!(world.remove_block(position, |p, ty| removed.push((p, ty))));
        assert_eq!(removed, vec![(position, BlockType::Lamp)]);
        tick_until_settled(&mut world, camera);
        assert!(chunk.lights().is_empty());
    }

    #[test]
    fn test_tick_does_not_wait_on_held_chunk() {
        let mut world = world(Arc::new(MemoryStore::new()));
        let camera = Vec3::new(8.0, 40.0, 8.0);
        tick_until_settled(&mut world, camera);
        let chunk = world.repository().chunk(ChunkCoord::new(0, 0, 0)).expect("loaded");
        assert_eq!(chunk.state(), ChunkState::Done);

        let (held_tx, held_rx) = mpsc::channel();
        let holder = {
            let chunk = Arc::clone(&chunk);
            std::thread::spawn(move || {
                let _data = lock(&chunk.data);
                held_tx.send(()).expect("send");
                std::thread::sleep(Duration::from_millis(500));
            })
        };
        held_rx.recv().expect("lock taken");
        world.repository().processing().add(&chunk);
        world.repository().processing().flush(camera);

        let start = Instant::now();
        world.tick(camera);
        let elapsed = start.elapsed();
        assert!(elapsed < Duration::from_millis(100), "tick blocked for {elapsed:?}");
        assert_eq!(world.stats().listed, 1, "busy chunk stays listed");

        holder.join().expect("holder");
        tick_until_settled(&mut world, camera);
    }

    #[test]
    fn test_moving_viewer_unloads_far_chunks() {
        let mut world = world(Arc::new(MemoryStore::new()));
        tick_until_settled(&mut world, Vec3::new(8.0, 40.0, 8.0));
        let far = ChunkCoord::new(-1, 0, 0);
        assert!(world.repository().chunk(far).is_some());

        let away = Vec3::new(8.0 + 3.0 * CHUNK_SIZE as f32, 40.0, 8.0);
        tick_until_settled(&mut world, away);
        assert!(world.repository().chunk(far).is_none());
        let stats = world.stats();
        // The new ring plus the old column row still within view.
        assert_eq!(stats.chunks, 12 * 3);
        assert!(stats.created_chunks < 2 * 9 * 3, "pool reused chunks");
    }

    #[test]
    fn test_shutdown_saves_edits_and_seed() {
        let store = Arc::new(MemoryStore::new());
        {
            let mut world = world(Arc::clone(&store));
            tick_until_settled(&mut world, Vec3::new(8.0, 40.0, 8.0));
            assert!(world.set_block(BlockCoord::new(2, 25, 2), BlockType::Glass));
            world.shutdown();
            world.shutdown();
        }
        let bytes = store.get(&chunk_id(ChunkCoord::new(0, 1, 0))).expect("readable").expect("saved");
        let types = decode_chunk(&bytes).expect("valid");
        assert_eq!(types[BlockCoord::new(2, 25, 2).local().index()], BlockType::Glass);
        assert!(!store.contains(&chunk_id(ChunkCoord::new(1, 1, 1))), "untouched chunks not saved");
        assert_eq!(WorldMeta::load_or(store.as_ref(), 99).seed, 0);
    }
}
