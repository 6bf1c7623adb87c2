//! Mesh scheduling on the main timeline and the build job on workers.

use std::sync::Arc;

use strata_jobs::{BasePriority, JobError, Scheduler};
use strata_mesh::{MeshPool, NeighborAccess, RenderLayer, build_layer};
use strata_voxel::{Block, BlockCoord, ChunkCoord, MAX_LIGHT_RADIUS};

use crate::budget::FrameBudget;
use crate::chunk::Chunk;
use crate::jobs::{ChunkJob, WorldContext};
use crate::repository::ChunkRepository;
use crate::state::ChunkState;
use crate::sync::{lock, try_lock};

/// Blocks outside the chunk being meshed, read through the repository.
struct RepositoryNeighbors<'a> {
    repo: &'a ChunkRepository,
}

impl NeighborAccess for RepositoryNeighbors<'_> {
    fn block_at(&self, position: BlockCoord) -> Option<Block> {
        self.repo.block_at(position)
    }

    fn sky_exposed(&self, position: BlockCoord) -> bool {
        self.repo.sky_exposed(position)
    }
}

/// Moves a freshly generated chunk on to meshing and asks its face
/// neighbors to re-mesh against its blocks.
pub fn mark_surrounding_chunks_for_mesh_update(repo: &ChunkRepository, chunk: &Arc<Chunk>) -> bool {
    if !chunk.transition(ChunkState::BlockGenerationComplete, ChunkState::WaitingForMeshUpdate) {
        return false;
    }
    chunk.mark_for_mesh_update();
    repo.processing().add(chunk);
    repo.flag_face_neighbors_for_mesh(chunk.coord());
    true
}

/// Starts a mesh build: one high-priority job per render layer.
///
/// Refused unless the chunk is flagged, idle and free of generating face
/// neighbors. The state changes under the data lock, so a block write is
/// either applied before the build snapshots the grid or deferred.
pub fn generate_meshes(
    repo: &ChunkRepository,
    scheduler: &Scheduler<ChunkJob>,
    meshes: &mut MeshPool,
    chunk: &Arc<Chunk>,
) -> bool {
    let from = chunk.state();
    if !matches!(from, ChunkState::WaitingForMeshUpdate | ChunkState::Done)
        || !chunk.needs_mesh_update()
        || chunk.is_unloading()
    {
        return false;
    }
    let coord = chunk.coord();
    let neighbor_generating = coord.face_neighbors().into_iter().any(|neighbor| {
        repo.chunk(neighbor)
            .is_some_and(|n| n.state() == ChunkState::BlocksGenerating)
    });
    if neighbor_generating {
        return false;
    }

    let Some(mut mesh) = try_lock(&chunk.mesh) else {
        return false;
    };
    {
        let Some(_data) = try_lock(&chunk.data) else {
            return false;
        };
        if !chunk.transition(from, ChunkState::MeshCalculating) {
            return false;
        }
    }
    chunk.take_mesh_update();
    mesh.get_or_insert_with(|| meshes.acquire()).begin_build();
    drop(mesh);

    let position = coord.origin_position();
    for layer in RenderLayer::ALL {
        if !scheduler.schedule(ChunkJob::BuildMesh { chunk: coord, layer }, BasePriority::High, position) {
            scheduler.cancel(&coord);
            chunk.set_state(ChunkState::WaitingForMeshUpdate);
            chunk.mark_for_mesh_update();
            return false;
        }
    }
    true
}

/// Steps the finalize sequence of a built mesh while `deadline` allows.
/// Returns `true` once the chunk is `Done`. A mesh held elsewhere is left
/// for the next tick.
pub fn finish_mesh_generation(chunk: &Arc<Chunk>, budget: &FrameBudget, deadline: f32) -> bool {
    if chunk.state() != ChunkState::MeshCalculationComplete {
        return false;
    }
    while budget.within(deadline) {
        let Some(mut mesh) = try_lock(&chunk.mesh) else {
            return false;
        };
        let finished = mesh.as_mut().is_none_or(|bundle| bundle.finish_step());
        drop(mesh);
        if finished {
            return chunk.transition(ChunkState::MeshCalculationComplete, ChunkState::Done);
        }
    }
    false
}

pub(crate) fn run_mesh_build(
    ctx: &WorldContext,
    coord: ChunkCoord,
    layer: RenderLayer,
) -> Result<(), JobError> {
    let repo = &ctx.repository;
    let Some(chunk) = repo
        .chunk(coord)
        .filter(|chunk| chunk.state() == ChunkState::MeshCalculating)
    else {
        tracing::debug!(chunk = ?coord, ?layer, "chunk moved on before its mesh build ran");
        return Ok(());
    };

    let grid = chunk.snapshot_grid();
    let lights = repo.gather_lights(coord, MAX_LIGHT_RADIUS as i32);
    let neighbors = RepositoryNeighbors { repo };
    let geometry = build_layer(layer, coord, &grid, &neighbors, ctx.sampler.as_ref(), &lights);

    let built = match lock(&chunk.mesh).as_mut() {
        Some(bundle) => bundle.complete_layer(layer, geometry),
        None => {
            return Err(JobError::Failed(format!("{coord:?} lost its mesh bundle mid-build")));
        }
    };
    if built && chunk.transition(ChunkState::MeshCalculating, ChunkState::MeshCalculationComplete) {
        repo.processing().add(&chunk);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use glam::IVec3;
    use strata_mesh::{BundleState, UniformLight};
    use strata_voxel::{BlockType, CHUNK_VOLUME, LocalCoord};

    use super::*;
    use crate::generation::TerrainGenerator;
    use crate::jobs::WorldExecutor;

    struct NoTerrain;

    impl TerrainGenerator for NoTerrain {
        fn generate_blocks(&self, _chunk: ChunkCoord) -> Vec<BlockType> {
            vec![BlockType::Air; CHUNK_VOLUME]
        }
    }

    fn context() -> Arc<WorldContext> {
        Arc::new(WorldContext {
            repository: Arc::new(ChunkRepository::with_dimensions(IVec3::new(8, 4, 8), 400)),
            generator: Arc::new(NoTerrain),
            sampler: Arc::new(UniformLight::default()),
            structure_reach: 1,
        })
    }

    fn local(x: i32, y: i32, z: i32) -> LocalCoord {
        LocalCoord::new(x, y, z).expect("in range")
    }

    fn chunk_in(repo: &ChunkRepository, coord: ChunkCoord, state: ChunkState) -> Arc<Chunk> {
        let chunk = Arc::new(Chunk::new());
        chunk.assign(coord);
        chunk.set_state(state);
        repo.insert(Arc::clone(&chunk));
        chunk
    }

    fn idle_executor(_job: ChunkJob) -> Result<(), JobError> {
        Ok(())
    }

    fn wait_for_state(chunk: &Chunk, state: ChunkState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while chunk.state() != state {
            assert!(Instant::now() < deadline, "chunk stuck in {:?}", chunk.state());
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_mark_surrounding_flags_face_neighbors() {
        let ctx = context();
        let repo = &ctx.repository;
        let chunk = chunk_in(repo, ChunkCoord::new(0, 1, 0), ChunkState::BlockGenerationComplete);
        let below = chunk_in(repo, ChunkCoord::new(0, 0, 0), ChunkState::Done);
        let diagonal = chunk_in(repo, ChunkCoord::new(1, 0, 0), ChunkState::Done);

        assert!(mark_surrounding_chunks_for_mesh_update(repo, &chunk));
        assert_eq!(chunk.state(), ChunkState::WaitingForMeshUpdate);
        assert!(chunk.needs_mesh_update());
        assert!(below.needs_mesh_update());
        assert!(!diagonal.needs_mesh_update());
        assert!(!mark_surrounding_chunks_for_mesh_update(repo, &chunk));
    }

    #[test]
    fn test_generate_meshes_waits_for_generating_neighbor() {
        let ctx = context();
        let repo = &ctx.repository;
        let scheduler = Scheduler::new(Default::default(), idle_executor).expect("spawn");
        let mut meshes = MeshPool::default();
        let chunk = chunk_in(repo, ChunkCoord::new(2, 1, 2), ChunkState::WaitingForMeshUpdate);
        let neighbor = chunk_in(repo, ChunkCoord::new(2, 1, 3), ChunkState::BlocksGenerating);

        assert!(!generate_meshes(repo, &scheduler, &mut meshes, &chunk), "not flagged");
        chunk.mark_for_mesh_update();
        assert!(!generate_meshes(repo, &scheduler, &mut meshes, &chunk));
        assert_eq!(chunk.state(), ChunkState::WaitingForMeshUpdate);

        neighbor.set_state(ChunkState::BlockGenerationComplete);
        assert!(generate_meshes(repo, &scheduler, &mut meshes, &chunk));
        assert_eq!(chunk.state(), ChunkState::MeshCalculating);
        assert!(!chunk.needs_mesh_update());
        assert_eq!(chunk.with_mesh(|m| m.map(|b| b.state())), Some(BundleState::Building));
    }

    #[test]
    fn test_build_then_finish_reaches_done() {
        let ctx = context();
        let repo = Arc::clone(&ctx.repository);
        let scheduler =
            Scheduler::new(Default::default(), WorldExecutor::new(Arc::clone(&ctx))).expect("spawn");
        let mut meshes = MeshPool::default();
        let chunk = chunk_in(&repo, ChunkCoord::new(0, 0, 0), ChunkState::WaitingForMeshUpdate);
        chunk.set_block(&repo, local(4, 4, 4), BlockType::Stone, false);
        chunk.load_transparency_cache(&repo);

        assert!(generate_meshes(&repo, &scheduler, &mut meshes, &chunk));
        wait_for_state(&chunk, ChunkState::MeshCalculationComplete);
        assert_eq!(chunk.visible_triangles(), 0, "nothing visible before finalize");

        let spent = FrameBudget::start(Duration::from_micros(1));
        std::thread::sleep(Duration::from_millis(2));
        assert!(!finish_mesh_generation(&chunk, &spent, 0.4));
        assert_eq!(chunk.state(), ChunkState::MeshCalculationComplete);

        assert!(finish_mesh_generation(&chunk, &FrameBudget::unlimited(), 0.4));
        assert_eq!(chunk.state(), ChunkState::Done);
        assert_eq!(chunk.visible_triangles(), 12);
    }

    #[test]
    fn test_held_mesh_defers_finish() {
        let ctx = context();
        let chunk = chunk_in(&ctx.repository, ChunkCoord::new(0, 0, 0), ChunkState::MeshCalculationComplete);
        {
            let _mesh = lock(&chunk.mesh);
            assert!(!finish_mesh_generation(&chunk, &FrameBudget::unlimited(), 0.4));
        }
        assert_eq!(chunk.state(), ChunkState::MeshCalculationComplete);
        assert!(finish_mesh_generation(&chunk, &FrameBudget::unlimited(), 0.4));
        assert_eq!(chunk.state(), ChunkState::Done);
    }

    #[test]
    fn test_writes_during_build_wait_for_finish() {
        let ctx = context();
        let repo = Arc::clone(&ctx.repository);
        let scheduler = Scheduler::new(Default::default(), idle_executor).expect("spawn");
        let mut meshes = MeshPool::default();
        let chunk = chunk_in(&repo, ChunkCoord::new(0, 0, 0), ChunkState::Done);
        chunk.mark_for_mesh_update();
        assert!(generate_meshes(&repo, &scheduler, &mut meshes, &chunk));

        chunk.set_block(&repo, local(1, 1, 1), BlockType::Stone, false);
        chunk.set_block(&repo, local(1, 1, 1), BlockType::Glass, false);
        assert!(!chunk.block(local(1, 1, 1)).is_active());
        assert_eq!(chunk.pending_modifications(), 2);

        // The idle executor never builds, so finish the layers by hand.
        for layer in RenderLayer::ALL {
            run_mesh_build(&ctx, ChunkCoord::new(0, 0, 0), layer).expect("built");
        }
        assert!(finish_mesh_generation(&chunk, &FrameBudget::unlimited(), 0.4));

        assert_eq!(chunk.flush_modifications(&repo, &FrameBudget::unlimited(), 0.8), 2);
        assert_eq!(chunk.block(local(1, 1, 1)).block_type(), BlockType::Glass);
        assert!(chunk.needs_mesh_update());
    }

    #[test]
    fn test_stale_build_is_dropped() {
        let ctx = context();
        let chunk = chunk_in(&ctx.repository, ChunkCoord::new(0, 0, 0), ChunkState::Done);
        run_mesh_build(&ctx, ChunkCoord::new(0, 0, 0), RenderLayer::Solid).expect("skipped");
        assert!(chunk.with_mesh(|m| m.is_none()));
    }
}
