//! Block generation: scheduling it, and the job that runs it.
//!
//! The job fills the grid from the terrain collaborator, places structures
//! under the structure locks of every chunk they could reach, settles water
//! so it never hangs over air, and rebuilds the transparency cache.

use std::sync::{Arc, MutexGuard};

use strata_jobs::{BasePriority, JobError, Scheduler};
use strata_voxel::{BlockCoord, BlockType, CHUNK_VOLUME, ChunkCoord, Face, LocalCoord};

use crate::chunk::Chunk;
use crate::jobs::{ChunkJob, WorldContext};
use crate::repository::ChunkRepository;
use crate::state::ChunkState;
use crate::structure::{PlacedStructure, StructureTemplate};
use crate::sync::lock;

/// Produces the blocks of a chunk. Both methods must be deterministic for a
/// given seed; they are called from worker threads.
pub trait TerrainGenerator: Send + Sync {
    /// Block kinds of `chunk` in storage order, `CHUNK_VOLUME` of them.
    fn generate_blocks(&self, chunk: ChunkCoord) -> Vec<BlockType>;

    /// Structures anchored inside `chunk`.
    fn generate_structures(&self, _chunk: ChunkCoord) -> Vec<(LocalCoord, Arc<StructureTemplate>)> {
        Vec::new()
    }
}

/// Faces water spreads its floor to.
const WATER_SUPPORT: [Face; 5] = [Face::Bottom, Face::West, Face::East, Face::North, Face::South];

/// Queues generation for a chunk waiting on it. Refused while a face
/// neighbor is being meshed, since generation may write into it.
pub fn generate_blocks(
    repo: &ChunkRepository,
    scheduler: &Scheduler<ChunkJob>,
    chunk: &Arc<Chunk>,
) -> bool {
    if chunk.state() != ChunkState::WaitingToGenerateBlocks || chunk.is_unloading() {
        return false;
    }
    let coord = chunk.coord();
    let neighbor_meshing = coord.face_neighbors().into_iter().any(|neighbor| {
        repo.chunk(neighbor)
            .is_some_and(|n| n.state() == ChunkState::MeshCalculating)
    });
    if neighbor_meshing {
        return false;
    }
    if !chunk.transition(ChunkState::WaitingToGenerateBlocks, ChunkState::BlocksGenerating) {
        return false;
    }
    let job = ChunkJob::GenerateBlocks { chunk: coord };
    if !scheduler.schedule(job, BasePriority::Low, coord.origin_position()) {
        chunk.transition(ChunkState::BlocksGenerating, ChunkState::WaitingToGenerateBlocks);
        return false;
    }
    true
}

pub(crate) fn run_generation(ctx: &WorldContext, coord: ChunkCoord) -> Result<(), JobError> {
    let repo = &ctx.repository;
    let Some(chunk) = repo
        .chunk(coord)
        .filter(|chunk| chunk.state() == ChunkState::BlocksGenerating)
    else {
        tracing::debug!(chunk = ?coord, "chunk moved on before generation ran");
        return Ok(());
    };

    let types = ctx.generator.generate_blocks(coord);
    if types.len() != CHUNK_VOLUME {
        chunk.transition(ChunkState::BlocksGenerating, ChunkState::WaitingToGenerateBlocks);
        return Err(JobError::Failed(format!(
            "generator returned {} blocks for {coord:?}, expected {CHUNK_VOLUME}",
            types.len()
        )));
    }
    lock(&chunk.data).grid.fill_types(&types);

    let placed: Vec<PlacedStructure> = ctx
        .generator
        .generate_structures(coord)
        .into_iter()
        .map(|(local, template)| PlacedStructure {
            origin: local.to_block(coord),
            template,
        })
        .collect();
    place_structures(repo, &chunk, coord, placed, ctx.structure_reach);
    settle_water(repo, &chunk, coord);

    lock(&chunk.data).collect_lights(coord);
    chunk.load_transparency_cache(repo);
    if chunk.transition(ChunkState::BlocksGenerating, ChunkState::BlockGenerationComplete) {
        repo.processing().add(&chunk);
        tracing::trace!(chunk = ?coord, "blocks generated");
    }
    Ok(())
}

/// Writes `placed` into the world and the structures of earlier neighbors
/// into `chunk`, holding the structure lock of every chunk within `reach`.
///
/// Locks are taken in ascending coordinate order so two chunks generating
/// side by side cannot deadlock.
fn place_structures(
    repo: &ChunkRepository,
    chunk: &Arc<Chunk>,
    coord: ChunkCoord,
    placed: Vec<PlacedStructure>,
    reach: i32,
) {
    let mut nearby: Vec<Arc<Chunk>> = Vec::new();
    for x in -reach..=reach {
        for y in -reach..=reach {
            for z in -reach..=reach {
                if let Some(found) = repo.chunk(coord.offset(x, y, z)) {
                    nearby.push(found);
                }
            }
        }
    }
    nearby.sort_by_key(|c| c.coord());

    let mut guards: Vec<(Arc<Chunk>, MutexGuard<'_, Vec<PlacedStructure>>)> = nearby
        .iter()
        .map(|c| (Arc::clone(c), lock(&c.structures)))
        .collect();

    let mut own_cells = Vec::new();
    let mut foreign_cells: Vec<(BlockCoord, BlockType)> = Vec::new();
    for structure in &placed {
        for (position, ty) in structure.template.cells(structure.origin) {
            if position.chunk() == coord {
                own_cells.push((position.local(), ty));
            } else {
                foreign_cells.push((position, ty));
            }
        }
    }
    for (owner, structures) in &guards {
        if Arc::ptr_eq(owner, chunk) {
            continue;
        }
        for structure in structures.iter() {
            own_cells.extend(
                structure
                    .template
                    .cells_in(structure.origin, coord)
                    .map(|(position, ty)| (position.local(), ty)),
            );
        }
    }

    {
        let mut data = lock(&chunk.data);
        for (local, ty) in own_cells {
            data.grid.set_type(local, ty);
        }
    }

    // Neighbors without blocks yet pull these cells when they generate.
    let mut hint: Option<Arc<Chunk>> = None;
    for (position, ty) in foreign_cells {
        let target = position.chunk();
        if !hint.as_ref().is_some_and(|c| c.coord() == target) {
            hint = repo.chunk(target);
        }
        let Some(neighbor) = hint.as_ref() else {
            continue;
        };
        let state = neighbor.state();
        if state.has_block_data() || state == ChunkState::BlocksGenerating {
            neighbor.set_block_for(repo, target, position.local(), ty, false);
        }
    }

    if let Some((_, own)) = guards.iter_mut().find(|(owner, _)| Arc::ptr_eq(owner, chunk)) {
        own.extend(placed);
    }
}

/// Turns air below or beside water into stone.
fn settle_water(repo: &ChunkRepository, chunk: &Arc<Chunk>, coord: ChunkCoord) {
    let mut outside = Vec::new();
    {
        let mut data = lock(&chunk.data);
        let water: Vec<LocalCoord> = data.grid.positions_where(|b| b.is_water()).collect();
        for local in water {
            for face in WATER_SUPPORT {
                let (dx, dy, dz) = face.offset();
                match local.offset(dx, dy, dz) {
                    Some(inside) => {
                        if !data.grid.get(inside).is_active() {
                            data.grid.set_type(inside, BlockType::Stone);
                        }
                    }
                    None => outside.push(local.to_block(coord).offset(dx, dy, dz)),
                }
            }
        }
    }

    let mut hint = None;
    for position in outside {
        let Some(block) = repo.block_at_with_hint(position, &mut hint) else {
            continue;
        };
        if block.is_active() {
            continue;
        }
        if let Some(neighbor) = hint.as_ref() {
            neighbor.set_block_for(repo, position.chunk(), position.local(), BlockType::Stone, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::IVec3;
    use rustc_hash::FxHashMap;
    use strata_mesh::UniformLight;

    use super::*;

    /// Air everywhere except the listed blocks.
    #[derive(Default)]
    struct SparseGenerator {
        blocks: FxHashMap<ChunkCoord, Vec<(LocalCoord, BlockType)>>,
        structures: FxHashMap<ChunkCoord, Vec<(LocalCoord, Arc<StructureTemplate>)>>,
        short: bool,
    }

    impl TerrainGenerator for SparseGenerator {
        fn generate_blocks(&self, chunk: ChunkCoord) -> Vec<BlockType> {
            let mut types = vec![BlockType::Air; CHUNK_VOLUME];
            for (local, ty) in self.blocks.get(&chunk).into_iter().flatten() {
                types[local.index()] = *ty;
            }
            if self.short {
                types.pop();
            }
            types
        }

        fn generate_structures(&self, chunk: ChunkCoord) -> Vec<(LocalCoord, Arc<StructureTemplate>)> {
            self.structures.get(&chunk).cloned().unwrap_or_default()
        }
    }

    fn local(x: i32, y: i32, z: i32) -> LocalCoord {
        LocalCoord::new(x, y, z).expect("in range")
    }

    fn context(generator: SparseGenerator) -> WorldContext {
        WorldContext {
            repository: Arc::new(ChunkRepository::with_dimensions(IVec3::new(8, 4, 8), 400)),
            generator: Arc::new(generator),
            sampler: Arc::new(UniformLight::default()),
            structure_reach: 1,
        }
    }

    fn chunk_in(repo: &ChunkRepository, coord: ChunkCoord, state: ChunkState) -> Arc<Chunk> {
        let chunk = Arc::new(Chunk::new());
        chunk.assign(coord);
        chunk.set_state(state);
        repo.insert(Arc::clone(&chunk));
        chunk
    }

    /// Three wood blocks in a row along x.
    fn beam() -> Arc<StructureTemplate> {
        Arc::new(
            StructureTemplate::new([3, 1, 1], [0, 0, 0], false, vec![BlockType::Wood; 3])
                .expect("sized"),
        )
    }

    fn idle_executor(_job: ChunkJob) -> Result<(), JobError> {
        Ok(())
    }

    #[test]
    fn test_generate_blocks_waits_for_meshing_neighbor() {
        let ctx = context(SparseGenerator::default());
        let repo = &ctx.repository;
        let scheduler = Scheduler::new(Default::default(), idle_executor).expect("spawn");
        let chunk = chunk_in(repo, ChunkCoord::new(0, 1, 0), ChunkState::WaitingToGenerateBlocks);
        let above = chunk_in(repo, ChunkCoord::new(0, 2, 0), ChunkState::MeshCalculating);

        assert!(!generate_blocks(repo, &scheduler, &chunk));
        assert_eq!(chunk.state(), ChunkState::WaitingToGenerateBlocks);

        above.set_state(ChunkState::Done);
        assert!(generate_blocks(repo, &scheduler, &chunk));
        assert_eq!(chunk.state(), ChunkState::BlocksGenerating);
        assert!(!generate_blocks(repo, &scheduler, &chunk));
    }

    #[test]
    fn test_generation_fills_grid_and_lists_chunk() {
        let coord = ChunkCoord::new(0, 0, 0);
        let mut generator = SparseGenerator::default();
        generator.blocks.insert(coord, vec![
            (local(3, 3, 3), BlockType::Stone),
            (local(4, 4, 4), BlockType::Lamp),
        ]);
        let ctx = context(generator);
        let chunk = chunk_in(&ctx.repository, coord, ChunkState::BlocksGenerating);

        run_generation(&ctx, coord).expect("generated");

        assert_eq!(chunk.state(), ChunkState::BlockGenerationComplete);
        assert_eq!(chunk.block(local(3, 3, 3)).block_type(), BlockType::Stone);
        assert_eq!(chunk.lights().len(), 1);
        assert!(chunk.block(local(3, 4, 3)).neighbor_is_opaque(strata_voxel::NeighborOffset::new(0, -1, 0)));
        assert_eq!(ctx.repository.processing().pending_len(), 1);
    }

    #[test]
    fn test_stale_job_leaves_chunk_alone() {
        let coord = ChunkCoord::new(0, 0, 0);
        let mut generator = SparseGenerator::default();
        generator.blocks.insert(coord, vec![(local(1, 1, 1), BlockType::Stone)]);
        let ctx = context(generator);
        let chunk = chunk_in(&ctx.repository, coord, ChunkState::WaitingToGenerateBlocks);

        run_generation(&ctx, coord).expect("skipped");
        assert_eq!(chunk.state(), ChunkState::WaitingToGenerateBlocks);
        assert!(!chunk.block(local(1, 1, 1)).is_active());
    }

    #[test]
    fn test_short_generator_output_fails_job() {
        let coord = ChunkCoord::new(0, 0, 0);
        let ctx = context(SparseGenerator {
            short: true,
            ..Default::default()
        });
        let chunk = chunk_in(&ctx.repository, coord, ChunkState::BlocksGenerating);

        assert!(matches!(run_generation(&ctx, coord), Err(JobError::Failed(_))));
        assert_eq!(chunk.state(), ChunkState::WaitingToGenerateBlocks);
    }

    #[test]
    fn test_structure_spills_into_loaded_neighbor() {
        let coord = ChunkCoord::new(0, 0, 0);
        let mut generator = SparseGenerator::default();
        generator.structures.insert(coord, vec![(local(15, 3, 3), beam())]);
        let ctx = context(generator);
        let chunk = chunk_in(&ctx.repository, coord, ChunkState::BlocksGenerating);
        let east = chunk_in(&ctx.repository, ChunkCoord::new(1, 0, 0), ChunkState::Done);

        run_generation(&ctx, coord).expect("generated");

        assert_eq!(chunk.block(local(15, 4, 3)).block_type(), BlockType::Wood);
        assert_eq!(east.block(local(0, 4, 3)).block_type(), BlockType::Wood);
        assert_eq!(east.block(local(1, 4, 3)).block_type(), BlockType::Wood);
        assert!(east.needs_mesh_update());
        assert_eq!(chunk.structure_count(), 1);
    }

    #[test]
    fn test_late_chunk_pulls_neighbor_structures() {
        let ctx = context(SparseGenerator::default());
        let west = chunk_in(&ctx.repository, ChunkCoord::new(0, 0, 0), ChunkState::Done);
        west.add_structures([PlacedStructure {
            origin: BlockCoord::new(15, 3, 3),
            template: beam(),
        }]);
        let coord = ChunkCoord::new(1, 0, 0);
        let chunk = chunk_in(&ctx.repository, coord, ChunkState::BlocksGenerating);

        run_generation(&ctx, coord).expect("generated");

        assert_eq!(chunk.block(local(0, 4, 3)).block_type(), BlockType::Wood);
        assert_eq!(chunk.block(local(1, 4, 3)).block_type(), BlockType::Wood);
        assert!(!chunk.block(local(2, 4, 3)).is_active());
    }

    #[test]
    fn test_water_gets_a_floor() {
        let coord = ChunkCoord::new(0, 0, 0);
        let mut generator = SparseGenerator::default();
        generator.blocks.insert(coord, vec![
            (local(5, 5, 5), BlockType::Water),
            (local(0, 8, 8), BlockType::Water),
        ]);
        let ctx = context(generator);
        let chunk = chunk_in(&ctx.repository, coord, ChunkState::BlocksGenerating);
        let west = chunk_in(&ctx.repository, ChunkCoord::new(-1, 0, 0), ChunkState::Done);

        run_generation(&ctx, coord).expect("generated");

        for (x, y, z) in [(5, 4, 5), (4, 5, 5), (6, 5, 5), (5, 5, 4), (5, 5, 6)] {
            assert_eq!(chunk.block(local(x, y, z)).block_type(), BlockType::Stone);
        }
        assert!(!chunk.block(local(5, 6, 5)).is_active());
        assert_eq!(west.block(local(15, 8, 8)).block_type(), BlockType::Stone);
    }
}
