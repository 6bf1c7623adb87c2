//! Spatial index of loaded chunks plus the processing list.
//!
//! The index is a dense toroidal array: a coordinate maps to the slot
//! `coord mod dimensions`, and the slot only answers for the coordinate of
//! the chunk actually stored there. It is sized to the view volume plus
//! padding, so chunks in view never collide.

use std::fmt::Write as _;
use std::sync::{Arc, RwLock};

use glam::IVec3;
use rustc_hash::FxHashMap;
use strata_voxel::{Block, BlockCoord, BlockLight, BlockType, CHUNK_SIZE, ChunkCoord};

use crate::async_store::AsyncStore;
use crate::chunk::{Chunk, LIGHT_UPDATE_RADIUS};
use crate::processing::ProcessingList;
use crate::settings::WorldSettings;
use crate::state::ChunkState;
use crate::sync::{lock, read, write};

pub struct ChunkRepository {
    dims: IVec3,
    slots: RwLock<Vec<Option<Arc<Chunk>>>>,
    processing: ProcessingList,
}

impl ChunkRepository {
    pub fn new(settings: &WorldSettings) -> Self {
        let side = settings.view_distance.max(0) * 2 + 1 + settings.index_padding.max(0);
        Self::with_dimensions(
            IVec3::new(side, settings.height_chunks.max(1), side),
            settings.processing_reprioritize_batch,
        )
    }

    pub fn with_dimensions(dims: IVec3, reprioritize_batch: usize) -> Self {
        let dims = dims.max(IVec3::ONE);
        let volume = (dims.x * dims.y * dims.z) as usize;
        Self {
            dims,
            slots: RwLock::new(vec![None; volume]),
            processing: ProcessingList::new(reprioritize_batch),
        }
    }

    /// Chunks stacked in one column. Chunk `y` runs from zero up to this.
    pub fn height_chunks(&self) -> i32 {
        self.dims.y
    }

    pub fn processing(&self) -> &ProcessingList {
        &self.processing
    }

    fn slot(&self, coord: ChunkCoord) -> Option<usize> {
        if coord.y < 0 || coord.y >= self.dims.y {
            return None;
        }
        let x = coord.x.rem_euclid(self.dims.x);
        let z = coord.z.rem_euclid(self.dims.z);
        Some(((x * self.dims.y + coord.y) * self.dims.z + z) as usize)
    }

    // -----------------------------------------------------------------------
    // Spatial index
    // -----------------------------------------------------------------------

    /// The chunk registered at `coord`.
    pub fn chunk(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        let slot = self.slot(coord)?;
        read(&self.slots)[slot]
            .as_ref()
            .filter(|chunk| chunk.coord() == coord)
            .cloned()
    }

    /// Whatever chunk holds the slot `coord` maps to, whichever coordinate
    /// it was registered under.
    pub fn occupant(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        let slot = self.slot(coord)?;
        read(&self.slots)[slot].clone()
    }

    /// Registers `chunk` under its current coordinate, replacing whatever
    /// shared the slot. Chunks outside the world's height are refused.
    pub fn insert(&self, chunk: Arc<Chunk>) -> bool {
        let coord = chunk.coord();
        let Some(slot) = self.slot(coord) else {
            tracing::warn!(chunk = ?coord, "chunk outside the world height not indexed");
            return false;
        };
        let previous = write(&self.slots)[slot].replace(chunk);
        if let Some(previous) = previous {
            if previous.coord() != coord {
                tracing::debug!(evicted = ?previous.coord(), chunk = ?coord, "index slot reused");
            }
        }
        true
    }

    /// Unregisters the chunk at `coord`.
    pub fn remove(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        let slot = self.slot(coord)?;
        let mut slots = write(&self.slots);
        if slots[slot].as_ref().is_some_and(|chunk| chunk.coord() == coord) {
            slots[slot].take()
        } else {
            None
        }
    }

    /// Number of registered chunks.
    pub fn len(&self) -> usize {
        read(&self.slots).iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every registered chunk, in no particular order.
    pub fn chunks(&self) -> Vec<Arc<Chunk>> {
        read(&self.slots).iter().flatten().cloned().collect()
    }

    /// Registered chunks touched by the sphere of `radius` blocks around
    /// `center`.
    pub fn chunks_within_radius(&self, center: BlockCoord, radius: i32) -> Vec<Arc<Chunk>> {
        let radius = radius.max(0);
        let low = center.offset(-radius, -radius, -radius).chunk();
        let high = center.offset(radius, radius, radius).chunk();
        let limit = radius as i64 * radius as i64;
        let mut found = Vec::new();
        for x in low.x..=high.x {
            for y in low.y..=high.y {
                for z in low.z..=high.z {
                    let coord = ChunkCoord::new(x, y, z);
                    if nearest_in_chunk(coord, center).distance_squared(center) > limit {
                        continue;
                    }
                    if let Some(chunk) = self.chunk(coord) {
                        found.push(chunk);
                    }
                }
            }
        }
        found
    }

    // -----------------------------------------------------------------------
    // Blocks
    // -----------------------------------------------------------------------

    /// The block at `position`, if its chunk holds real blocks.
    pub fn block_at(&self, position: BlockCoord) -> Option<Block> {
        let chunk = self.chunk(position.chunk())?;
        chunk
            .has_loaded_initial_block_data()
            .then(|| chunk.block(position.local()))
    }

    /// Like [`ChunkRepository::block_at`], but tries the chunk in `hint`
    /// before the index and leaves the resolved chunk there for next time.
    pub fn block_at_with_hint(
        &self,
        position: BlockCoord,
        hint: &mut Option<Arc<Chunk>>,
    ) -> Option<Block> {
        let coord = position.chunk();
        if !hint.as_ref().is_some_and(|chunk| chunk.coord() == coord) {
            *hint = self.chunk(coord);
        }
        let chunk = hint.as_ref()?;
        chunk
            .has_loaded_initial_block_data()
            .then(|| chunk.block(position.local()))
    }

    /// Writes one block through its chunk. Returns `false` if the chunk is
    /// not loaded.
    pub fn set_block_at(&self, position: BlockCoord, block_type: BlockType, trigger_lighting: bool) -> bool {
        let coord = position.chunk();
        let Some(chunk) = self.chunk(coord) else {
            return false;
        };
        chunk.set_block_for(self, coord, position.local(), block_type, trigger_lighting)
    }

    /// Removes one block through its chunk. Bedrock and unloaded positions
    /// are left alone.
    pub fn remove_block_at(
        &self,
        position: BlockCoord,
        on_removed: impl FnOnce(BlockCoord, BlockType),
    ) -> bool {
        match self.chunk(position.chunk()) {
            Some(chunk) if chunk.has_loaded_initial_block_data() => {
                chunk.remove_block(self, position.local(), on_removed)
            }
            _ => false,
        }
    }

    /// Every block position within `radius` of `center`.
    pub fn positions_within_radius(center: BlockCoord, radius: i32) -> impl Iterator<Item = BlockCoord> {
        let radius = radius.max(0);
        let limit = radius as i64 * radius as i64;
        (-radius..=radius)
            .flat_map(move |x| (-radius..=radius).flat_map(move |y| (-radius..=radius).map(move |z| (x, y, z))))
            .map(move |(x, y, z)| center.offset(x, y, z))
            .filter(move |position| position.distance_squared(center) <= limit)
    }

    /// Clears every removable block within `radius` of `center`, reporting
    /// each to `on_removed`. Chunks around the hole are re-meshed once at the
    /// end. Returns how many blocks went.
    pub fn remove_blocks_within_radius(
        &self,
        center: BlockCoord,
        radius: i32,
        mut on_removed: impl FnMut(BlockCoord, BlockType),
    ) -> usize {
        let mut hint = None;
        let mut removed = 0;
        for position in Self::positions_within_radius(center, radius) {
            let Some(block) = self.block_at_with_hint(position, &mut hint) else {
                continue;
            };
            if !block.is_active() || block.is_bedrock() {
                continue;
            }
            let Some(chunk) = hint.as_ref() else {
                continue;
            };
            if !chunk.set_block_for(self, position.chunk(), position.local(), BlockType::Air, false) {
                continue;
            }
            on_removed(position, block.block_type());
            removed += 1;
        }
        if removed > 0 {
            self.mark_for_mesh_update_within_radius(center, radius + LIGHT_UPDATE_RADIUS);
        }
        removed
    }

    /// Whether nothing opaque sits above `position` up to the top of the
    /// world. Chunks that are not loaded count as open sky.
    pub fn sky_exposed(&self, position: BlockCoord) -> bool {
        let top = self.dims.y * CHUNK_SIZE;
        let mut y = position.y + 1;
        while y < top {
            let coord = BlockCoord::new(position.x, y, position.z).chunk();
            let chunk_top = (coord.y + 1) * CHUNK_SIZE;
            if let Some(chunk) = self.chunk(coord).filter(|c| c.has_loaded_initial_block_data()) {
                let data = lock(&chunk.data);
                let covered = (y..chunk_top).any(|yy| {
                    let block = data.grid.get(BlockCoord::new(position.x, yy, position.z).local());
                    block.is_active() && block.is_opaque()
                });
                if covered {
                    return false;
                }
            }
            y = chunk_top;
        }
        true
    }

    /// Emitters in `coord` and in every chunk close enough for their light
    /// to reach it.
    pub fn gather_lights(&self, coord: ChunkCoord, radius: i32) -> Vec<BlockLight> {
        let reach = (radius.max(0) + CHUNK_SIZE - 1) / CHUNK_SIZE;
        let mut lights = Vec::new();
        for x in -reach..=reach {
            for y in -reach..=reach {
                for z in -reach..=reach {
                    if let Some(chunk) = self.chunk(coord.offset(x, y, z)) {
                        lights.extend(lock(&chunk.data).lights.iter().copied());
                    }
                }
            }
        }
        lights
    }

    // -----------------------------------------------------------------------
    // Mesh bookkeeping
    // -----------------------------------------------------------------------

    /// Flags every chunk touched by the sphere for a new mesh and lists it.
    pub fn mark_for_mesh_update_within_radius(&self, center: BlockCoord, radius: i32) {
        for chunk in self.chunks_within_radius(center, radius) {
            chunk.mark_for_mesh_update();
            self.processing.add(&chunk);
        }
    }

    /// Flags the six face neighbors of `coord` for a new mesh.
    pub fn flag_face_neighbors_for_mesh(&self, coord: ChunkCoord) {
        for neighbor in coord.face_neighbors() {
            if let Some(chunk) = self.chunk(neighbor) {
                chunk.mark_for_mesh_update();
                self.processing.add(&chunk);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Persistence and diagnostics
    // -----------------------------------------------------------------------

    /// Queues a save of every loaded chunk with unsaved edits. Returns how
    /// many were queued.
    pub fn save_all_loaded_chunks(&self, store: &AsyncStore) -> usize {
        self.chunks()
            .iter()
            .filter(|chunk| chunk.has_loaded_initial_block_data())
            .filter(|chunk| chunk.save(store))
            .count()
    }

    /// Registered chunks per lifecycle state.
    pub fn state_counts(&self) -> FxHashMap<ChunkState, usize> {
        let mut counts = FxHashMap::default();
        for chunk in self.chunks() {
            *counts.entry(chunk.state()).or_default() += 1;
        }
        counts
    }

    /// Human-readable summary of the index and the processing list.
    pub fn dump(&self) -> String {
        let counts = self.state_counts();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "chunks: {} indexed, {} listed, {} pending",
            self.len(),
            self.processing.len(),
            self.processing.pending_len()
        );
        for state in ChunkState::ALL {
            let count = counts.get(&state).copied().unwrap_or(0);
            if count > 0 {
                let _ = writeln!(out, "  {state:?}: {count}");
            }
        }
        out
    }
}

/// The block of `chunk` closest to `point`.
fn nearest_in_chunk(chunk: ChunkCoord, point: BlockCoord) -> BlockCoord {
    let origin = chunk.origin();
    let clamp = |v: i32, o: i32| v.clamp(o, o + CHUNK_SIZE - 1);
    BlockCoord::new(
        clamp(point.x, origin.x),
        clamp(point.y, origin.y),
        clamp(point.z, origin.z),
    )
}
