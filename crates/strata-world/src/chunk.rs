//! A pooled chunk: block grid, lifecycle state and deferred edits.
//!
//! The grid, the light list and the queue of deferred block writes share one
//! mutex. Transparency flags pushed in by neighbors have their own queue so a
//! neighbor never waits on a chunk that is busy.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use strata_jobs::Scheduler;
use strata_mesh::{MeshBundle, MeshPool};
use strata_voxel::{
    Block, BlockCoord, BlockLight, BlockType, CHUNK_SIZE, ChunkCoord, ChunkGrid, LocalCoord,
    MAX_LIGHT_RADIUS, decode_chunk, encode_chunk,
};

use crate::async_store::AsyncStore;
use crate::budget::FrameBudget;
use crate::jobs::ChunkJob;
use crate::repository::ChunkRepository;
use crate::state::{AtomicChunkState, ChunkState};
use crate::store::chunk_id;
use crate::structure::PlacedStructure;
use crate::sync::{lock, read, try_lock, write};
use crate::transparency::{RemoteFlag, TransparencyFlag, dispatch_flags, push_transparency};

/// Chunks within this many blocks of an edit that may change lighting are
/// re-meshed.
pub const LIGHT_UPDATE_RADIUS: i32 = MAX_LIGHT_RADIUS as i32 + CHUNK_SIZE / 2;

/// A block write waiting for the chunk to leave `MeshCalculating`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockModification {
    pub local: LocalCoord,
    pub block_type: BlockType,
}

pub(crate) struct ChunkData {
    pub(crate) grid: ChunkGrid,
    pub(crate) lights: Vec<BlockLight>,
    pub(crate) modifications: VecDeque<BlockModification>,
}

impl ChunkData {
    fn new() -> Self {
        Self {
            grid: ChunkGrid::new(),
            lights: Vec::new(),
            modifications: VecDeque::new(),
        }
    }

    /// Rebuilds the light list from the grid.
    pub(crate) fn collect_lights(&mut self, coord: ChunkCoord) {
        let grid = &self.grid;
        self.lights = grid
            .positions_where(|block| block.emission().is_some())
            .map(|local| BlockLight {
                position: local.to_block(coord),
                block_type: grid.get(local).block_type(),
            })
            .collect();
    }
}

/// One cubic piece of the world.
///
/// Chunks are pooled: the same object serves many coordinates over its
/// life, and [`ChunkCoord::UNASSIGNED`] marks one sitting in the pool.
pub struct Chunk {
    coord: RwLock<ChunkCoord>,
    state: AtomicChunkState,
    pub(crate) data: Mutex<ChunkData>,
    /// Neighbor transparency updates that arrived while `data` was busy.
    pub(crate) pending_flags: Mutex<Vec<TransparencyFlag>>,
    /// Structures this chunk placed. Holding this lock is what "holding the
    /// structure lock" means.
    pub(crate) structures: Mutex<Vec<PlacedStructure>>,
    pub(crate) mesh: Mutex<Option<MeshBundle>>,
    dirty: AtomicBool,
    needs_mesh: AtomicBool,
    unloading: AtomicBool,
    /// Set while the chunk is in the processing list.
    pub(crate) listed: AtomicBool,
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("coord", &self.coord())
            .field("state", &self.state())
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

impl Chunk {
    pub fn new() -> Self {
        Self {
            coord: RwLock::new(ChunkCoord::UNASSIGNED),
            state: AtomicChunkState::new(ChunkState::LoadingFromDisk),
            data: Mutex::new(ChunkData::new()),
            pending_flags: Mutex::new(Vec::new()),
            structures: Mutex::new(Vec::new()),
            mesh: Mutex::new(None),
            dirty: AtomicBool::new(false),
            needs_mesh: AtomicBool::new(false),
            unloading: AtomicBool::new(false),
            listed: AtomicBool::new(false),
        }
    }

    // -----------------------------------------------------------------------
    // Identity and flags
    // -----------------------------------------------------------------------

    pub fn coord(&self) -> ChunkCoord {
        *read(&self.coord)
    }

    pub fn state(&self) -> ChunkState {
        self.state.load()
    }

    pub(crate) fn set_state(&self, state: ChunkState) {
        self.state.store(state);
    }

    pub(crate) fn transition(&self, from: ChunkState, to: ChunkState) -> bool {
        let moved = self.state.transition(from, to);
        if moved {
            tracing::trace!(chunk = ?self.coord(), ?from, ?to, "chunk state");
        }
        moved
    }

    pub fn has_loaded_initial_block_data(&self) -> bool {
        self.state().has_block_data()
    }

    /// Holds edits that have not been saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn needs_mesh_update(&self) -> bool {
        self.needs_mesh.load(Ordering::Acquire)
    }

    pub fn mark_for_mesh_update(&self) {
        self.needs_mesh.store(true, Ordering::Release);
    }

    pub(crate) fn take_mesh_update(&self) -> bool {
        self.needs_mesh.swap(false, Ordering::AcqRel)
    }

    pub fn is_unloading(&self) -> bool {
        self.unloading.load(Ordering::Acquire)
    }

    pub fn mark_for_unload(&self) {
        self.unloading.store(true, Ordering::Release);
    }

    /// Gives a pooled chunk its coordinate. The chunk starts out waiting
    /// for its stored data.
    pub(crate) fn assign(&self, coord: ChunkCoord) {
        *write(&self.coord) = coord;
        self.state.store(ChunkState::LoadingFromDisk);
        self.dirty.store(false, Ordering::Release);
        self.needs_mesh.store(false, Ordering::Release);
        self.unloading.store(false, Ordering::Release);
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn block(&self, local: LocalCoord) -> Block {
        lock(&self.data).grid.get(local)
    }

    /// A private copy of the grid for work that must not hold the lock.
    pub fn snapshot_grid(&self) -> ChunkGrid {
        lock(&self.data).grid.clone()
    }

    pub fn lights(&self) -> Vec<BlockLight> {
        lock(&self.data).lights.clone()
    }

    /// Deferred block writes not yet applied.
    pub fn pending_modifications(&self) -> usize {
        lock(&self.data).modifications.len()
    }

    /// Triangles currently visible across all layers.
    pub fn visible_triangles(&self) -> usize {
        lock(&self.mesh)
            .as_ref()
            .map_or(0, MeshBundle::visible_triangles)
    }

    /// Runs `f` with the mesh bundle, if the chunk has one.
    pub fn with_mesh<R>(&self, f: impl FnOnce(Option<&MeshBundle>) -> R) -> R {
        f(lock(&self.mesh).as_ref())
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Changes one block.
    ///
    /// With `trigger_lighting` every chunk within [`LIGHT_UPDATE_RADIUS`] is
    /// flagged for a new mesh. While a mesh build is in flight the write is
    /// queued and replayed by [`Chunk::flush_modifications`].
    pub fn set_block(
        self: &Arc<Self>,
        repo: &ChunkRepository,
        local: LocalCoord,
        block_type: BlockType,
        trigger_lighting: bool,
    ) -> bool {
        self.set_block_for(repo, self.coord(), local, block_type, trigger_lighting)
    }

    /// [`Chunk::set_block`] for a caller that found this chunk at `expected`.
    /// The write is dropped if the chunk has since been recycled to another
    /// coordinate.
    pub(crate) fn set_block_for(
        self: &Arc<Self>,
        repo: &ChunkRepository,
        expected: ChunkCoord,
        local: LocalCoord,
        block_type: BlockType,
        trigger_lighting: bool,
    ) -> bool {
        let remote = {
            let mut data = lock(&self.data);
            // A chunk only gives up its coordinate while `data` is held.
            if self.coord() != expected {
                tracing::debug!(chunk = ?expected, "dropping write for a recycled chunk");
                return false;
            }
            self.dirty.store(true, Ordering::Release);
            if self.state() == ChunkState::MeshCalculating {
                data.modifications.push_back(BlockModification { local, block_type });
                None
            } else {
                Some(self.apply_modification(expected, &mut data, local, block_type))
            }
        };
        if trigger_lighting {
            repo.mark_for_mesh_update_within_radius(local.to_block(expected), LIGHT_UPDATE_RADIUS);
        } else {
            repo.processing().add(self);
        }
        if let Some(remote) = remote {
            dispatch_flags(repo, remote);
        }
        true
    }

    /// Removes one block, reporting it to `on_removed` first.
    ///
    /// Bedrock is never removed and the callback is not invoked for it.
    pub fn remove_block(
        self: &Arc<Self>,
        repo: &ChunkRepository,
        local: LocalCoord,
        on_removed: impl FnOnce(BlockCoord, BlockType),
    ) -> bool {
        let block = self.block(local);
        let coord = self.coord();
        let position = local.to_block(coord);
        if block.is_bedrock() {
            tracing::debug!(?position, "refusing to remove bedrock");
            return false;
        }
        on_removed(position, block.block_type());
        self.set_block_for(repo, coord, local, BlockType::Air, true)
    }

    /// Replays deferred block writes while `deadline` allows, then applies
    /// queued neighbor transparency flags. Never blocks; a busy chunk is
    /// retried next tick. Returns how many block writes were applied.
    pub fn flush_modifications(
        self: &Arc<Self>,
        repo: &ChunkRepository,
        budget: &FrameBudget,
        deadline: f32,
    ) -> usize {
        let coord = self.coord();
        let mut applied = 0;
        let mut remote = Vec::new();
        {
            let Some(mut data) = try_lock(&self.data) else {
                return 0;
            };
            if self.state() != ChunkState::MeshCalculating {
                while budget.within(deadline) {
                    let Some(modification) = data.modifications.pop_front() else {
                        break;
                    };
                    remote.extend(self.apply_modification(
                        coord,
                        &mut data,
                        modification.local,
                        modification.block_type,
                    ));
                    applied += 1;
                }
            }
            if let Some(mut flags) = try_lock(&self.pending_flags) {
                for flag in flags.drain(..) {
                    flag.apply(&mut data.grid);
                }
            }
        }
        dispatch_flags(repo, remote);
        applied
    }

    /// Writes one block into a locked grid and keeps the light list and the
    /// neighbor caches in step. Returns the cache updates owed to other
    /// chunks.
    fn apply_modification(
        &self,
        coord: ChunkCoord,
        data: &mut ChunkData,
        local: LocalCoord,
        block_type: BlockType,
    ) -> Vec<RemoteFlag> {
        let previous = data.grid.set_type(local, block_type);
        if previous == block_type {
            return Vec::new();
        }
        self.mark_for_mesh_update();

        let position = local.to_block(coord);
        if Block::new(previous).emission().is_some() {
            data.lights.retain(|light| light.position != position);
        }
        if Block::new(block_type).emission().is_some() {
            data.lights.push(BlockLight {
                position,
                block_type,
            });
        }

        let transparent = block_type.definition().transparent;
        if previous.definition().transparent == transparent {
            return Vec::new();
        }
        push_transparency(&mut data.grid, coord, local, transparent)
    }

    pub fn add_structures(&self, placed: impl IntoIterator<Item = PlacedStructure>) {
        lock(&self.structures).extend(placed);
    }

    pub fn structure_count(&self) -> usize {
        lock(&self.structures).len()
    }

    // -----------------------------------------------------------------------
    // Persistence and pooling
    // -----------------------------------------------------------------------

    /// Asks the store for this chunk's saved blocks. The answer arrives on
    /// the store thread and is applied there.
    pub fn request_load(self: &Arc<Self>, repo: &Arc<ChunkRepository>, store: &AsyncStore) {
        let coord = self.coord();
        let chunk = Arc::clone(self);
        let repo = Arc::clone(repo);
        store.get(chunk_id(coord), move |bytes| {
            chunk.finish_load(&repo, coord, bytes);
        });
    }

    pub(crate) fn finish_load(
        self: &Arc<Self>,
        repo: &ChunkRepository,
        expected: ChunkCoord,
        bytes: Option<Vec<u8>>,
    ) {
        if self.coord() != expected || self.state() != ChunkState::LoadingFromDisk {
            tracing::debug!(chunk = ?expected, "discarding load for a recycled chunk");
            return;
        }

        let types = bytes.and_then(|bytes| match decode_chunk(&bytes) {
            Ok(types) => Some(types),
            Err(err) => {
                tracing::error!(chunk = ?expected, error = %err, "stored chunk unreadable, regenerating");
                None
            }
        });

        match types {
            None => {
                self.transition(ChunkState::LoadingFromDisk, ChunkState::WaitingToGenerateBlocks);
            }
            Some(types) => {
                {
                    let mut data = lock(&self.data);
                    data.grid.fill_types(&types);
                    data.collect_lights(expected);
                }
                self.load_transparency_cache(repo);
                self.mark_for_mesh_update();
                self.transition(ChunkState::LoadingFromDisk, ChunkState::WaitingForMeshUpdate);
                repo.flag_face_neighbors_for_mesh(expected);
                tracing::trace!(chunk = ?expected, "loaded from store");
            }
        }
        repo.processing().add(self);
    }

    /// Queues the grid for saving if it has unsaved edits.
    pub fn save(&self, store: &AsyncStore) -> bool {
        let data = lock(&self.data);
        self.save_locked(&data, store)
    }

    fn save_locked(&self, data: &ChunkData, store: &AsyncStore) -> bool {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return false;
        }
        store.put(chunk_id(self.coord()), encode_chunk(&data.grid));
        true
    }

    /// Tears down a chunk flagged for unload. Returns `false` when it must
    /// be retried later: its data is still loading, one of its jobs is
    /// already running, or another thread holds one of its locks. Never
    /// blocks.
    pub fn attempt_to_unload(
        self: &Arc<Self>,
        repo: &ChunkRepository,
        scheduler: &Scheduler<ChunkJob>,
        store: &AsyncStore,
        meshes: &mut MeshPool,
    ) -> bool {
        if !self.is_unloading() {
            return false;
        }
        let coord = self.coord();
        match self.state() {
            ChunkState::LoadingFromDisk => return false,
            ChunkState::BlocksGenerating | ChunkState::MeshCalculating => {
                scheduler.cancel(&coord);
                if scheduler.is_running(&coord) {
                    return false;
                }
                let settled = if self.state() == ChunkState::BlocksGenerating {
                    ChunkState::WaitingToGenerateBlocks
                } else {
                    ChunkState::WaitingForMeshUpdate
                };
                self.set_state(settled);
            }
            _ => {}
        }

        let Some(parts) = self.try_lock_parts() else {
            tracing::trace!(chunk = ?coord, "chunk busy, unload retried");
            return false;
        };
        if self.state() != ChunkState::WaitingToGenerateBlocks {
            self.save_locked(&parts.data, store);
        }
        self.clear_all(parts, repo, meshes);
        tracing::trace!(chunk = ?coord, "unloaded");
        true
    }

    fn try_lock_parts(&self) -> Option<ChunkParts<'_>> {
        Some(ChunkParts {
            structures: try_lock(&self.structures)?,
            data: try_lock(&self.data)?,
            flags: try_lock(&self.pending_flags)?,
            mesh: try_lock(&self.mesh)?,
        })
    }

    /// Returns the chunk to its pooled, unassigned condition.
    fn clear_all(&self, mut parts: ChunkParts<'_>, repo: &ChunkRepository, meshes: &mut MeshPool) {
        parts.structures.clear();
        parts.data.grid.clear();
        parts.data.lights.clear();
        parts.data.modifications.clear();
        parts.flags.clear();
        if let Some(bundle) = parts.mesh.take() {
            meshes.release(bundle);
        }
        self.dirty.store(false, Ordering::Release);
        self.needs_mesh.store(false, Ordering::Release);
        self.unloading.store(false, Ordering::Release);
        self.state.store(ChunkState::LoadingFromDisk);
        *write(&self.coord) = ChunkCoord::UNASSIGNED;
        drop(parts);
        repo.processing().remove(self);
    }
}

/// Every lock a chunk owns, held together for teardown.
struct ChunkParts<'a> {
    structures: MutexGuard<'a, Vec<PlacedStructure>>,
    data: MutexGuard<'a, ChunkData>,
    flags: MutexGuard<'a, Vec<TransparencyFlag>>,
    mesh: MutexGuard<'a, Option<MeshBundle>>,
}
