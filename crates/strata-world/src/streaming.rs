//! Streaming chunks in and out around the viewer.
//!
//! One new chunk is started per call, nearest columns first: the column the
//! viewer stands in, then rings of growing radius. Chunks that drift more
//! than the view distance away are pulled from the index and torn down over
//! the following ticks, once nothing is working on them.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use strata_jobs::Scheduler;
use strata_mesh::MeshPool;
use strata_voxel::ChunkCoord;

use crate::async_store::AsyncStore;
use crate::chunk::Chunk;
use crate::jobs::ChunkJob;
use crate::repository::ChunkRepository;
use crate::settings::WorldSettings;

/// Free list of chunk objects. Chunks are created on demand and come back
/// reset by [`Chunk::attempt_to_unload`].
#[derive(Debug, Default)]
pub struct ChunkPool {
    free: Vec<Arc<Chunk>>,
    created: usize,
}

impl ChunkPool {
    /// An empty pool that expects to hand out about `capacity` chunks.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            free: Vec::with_capacity(capacity),
            created: 0,
        }
    }

    pub fn acquire(&mut self) -> Arc<Chunk> {
        self.free.pop().unwrap_or_else(|| {
            self.created += 1;
            Arc::new(Chunk::new())
        })
    }

    pub fn release(&mut self, chunk: Arc<Chunk>) {
        self.free.push(chunk);
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn created(&self) -> usize {
        self.created
    }
}

/// Decides which chunks exist around the viewer.
pub struct ChunkStreamer {
    pool: ChunkPool,
    view_distance: i32,
    /// Rings left unfilled at the edge of the view.
    view_gap: i32,
    height_chunks: i32,
    viewer: Option<(i32, i32)>,
    /// Load order for the current viewer column.
    order: Vec<ChunkCoord>,
    unloading: Vec<Arc<Chunk>>,
}

impl ChunkStreamer {
    pub fn new(settings: &WorldSettings) -> Self {
        Self {
            pool: ChunkPool::with_capacity(settings.pool_size()),
            view_distance: settings.view_distance.max(0),
            view_gap: settings.view_gap.max(0),
            height_chunks: settings.height_chunks.max(1),
            viewer: None,
            order: Vec::new(),
            unloading: Vec::new(),
        }
    }

    pub fn pool(&self) -> &ChunkPool {
        &self.pool
    }

    /// Moves the viewer to the chunk column containing `coord`.
    pub fn set_viewer(&mut self, coord: ChunkCoord) {
        let column = (coord.x, coord.z);
        if self.viewer == Some(column) {
            return;
        }
        self.viewer = Some(column);
        self.order = load_order(
            column,
            self.view_distance - self.view_gap,
            self.view_distance,
            self.height_chunks,
        );
    }

    /// Starts loading the nearest chunk that is missing. Returns its
    /// coordinate, or `None` when everything in range is present.
    pub fn generate_new_chunk(
        &mut self,
        repo: &Arc<ChunkRepository>,
        store: &AsyncStore,
    ) -> Option<ChunkCoord> {
        let coord = self
            .order
            .iter()
            .copied()
            .find(|coord| !self.is_occupied(repo, *coord))?;
        self.load_chunk(repo, store, coord);
        Some(coord)
    }

    /// A coordinate is taken while a chunk is indexed for its slot, or while
    /// its previous chunk is still waiting to unload.
    fn is_occupied(&self, repo: &ChunkRepository, coord: ChunkCoord) -> bool {
        repo.occupant(coord).is_some()
            || self.unloading.iter().any(|chunk| chunk.coord() == coord)
    }

    /// Takes a chunk from the pool, registers it at `coord` and asks the
    /// store for its blocks.
    pub fn load_chunk(
        &mut self,
        repo: &Arc<ChunkRepository>,
        store: &AsyncStore,
        coord: ChunkCoord,
    ) -> Arc<Chunk> {
        let chunk = self.pool.acquire();
        chunk.assign(coord);
        repo.insert(Arc::clone(&chunk));
        chunk.request_load(repo, store);
        tracing::trace!(chunk = ?coord, "loading");
        chunk
    }

    /// Unregisters every chunk beyond the view distance and queues it for
    /// unloading. Returns how many were queued.
    pub fn cleanup_old_chunks(&mut self, repo: &ChunkRepository) -> usize {
        let Some((vx, vz)) = self.viewer else {
            return 0;
        };
        let mut queued = 0;
        for chunk in repo.chunks() {
            let coord = chunk.coord();
            if (coord.x - vx).abs() <= self.view_distance && (coord.z - vz).abs() <= self.view_distance {
                continue;
            }
            chunk.mark_for_unload();
            repo.remove(coord);
            repo.processing().remove(&chunk);
            self.unloading.push(chunk);
            queued += 1;
        }
        if queued > 0 {
            tracing::debug!(queued, waiting = self.unloading.len(), "chunks left the view");
        }
        queued
    }

    /// Retries the teardown of every chunk waiting to unload and returns the
    /// finished ones to the pool. Returns how many finished.
    pub fn unload_dead_chunks(
        &mut self,
        repo: &ChunkRepository,
        scheduler: &Scheduler<ChunkJob>,
        store: &AsyncStore,
        meshes: &mut MeshPool,
    ) -> usize {
        let mut finished = Vec::new();
        self.unloading.retain(|chunk| {
            if chunk.attempt_to_unload(repo, scheduler, store, meshes) {
                finished.push(Arc::clone(chunk));
                false
            } else {
                true
            }
        });
        let count = finished.len();
        for chunk in finished {
            self.pool.release(chunk);
        }
        count
    }

    /// Chunks waiting for their final unload step.
    pub fn unload_queue_len(&self) -> usize {
        self.unloading.len()
    }

    /// Loaded chunks around the viewer, sweeping `spokes` evenly spaced
    /// rays outward ring by ring. Each chunk is returned once.
    pub fn chunks_around(&self, repo: &ChunkRepository, spokes: u32) -> Vec<Arc<Chunk>> {
        let Some((vx, vz)) = self.viewer else {
            return Vec::new();
        };
        let spokes = spokes.clamp(1, 360);
        let sweep = 360 / spokes;
        let mut seen = FxHashSet::default();
        let mut found = Vec::new();
        for distance in 0..=self.view_distance {
            for angle in 0..sweep {
                for y in (0..self.height_chunks).rev() {
                    for spoke in 0..spokes {
                        let (dx, dz) = ring_offset((angle + spoke * sweep) as f32, distance);
                        let coord = ChunkCoord::new(vx + dx, y, vz + dz);
                        if !seen.insert(coord) {
                            continue;
                        }
                        if let Some(chunk) = repo.chunk(coord) {
                            found.push(chunk);
                        }
                    }
                }
            }
        }
        found
    }
}

/// Offset of the point at `degrees` on the ring `distance` chunks out,
/// truncated toward zero.
fn ring_offset(degrees: f32, distance: i32) -> (i32, i32) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let reach = distance as f32 + 0.5;
    ((sin * reach) as i32, (cos * reach) as i32)
}

/// Coordinates in the order they should be loaded: the viewer's column top
/// down, then each layer top down in rings out to `radius`. Inner rings are
/// sampled at finer angles than outer ones.
fn load_order(
    (vx, vz): (i32, i32),
    radius: i32,
    view_distance: i32,
    height_chunks: i32,
) -> Vec<ChunkCoord> {
    let mut order: Vec<ChunkCoord> = (0..height_chunks)
        .rev()
        .map(|y| ChunkCoord::new(vx, y, vz))
        .collect();
    let mut seen: FxHashSet<ChunkCoord> = order.iter().copied().collect();
    for y in (0..height_chunks).rev() {
        let mut previous = None;
        for distance in 0..=radius.max(0) {
            let step = ((view_distance - distance + 1) * 2).max(1) as f32;
            let mut angle = 0.0f32;
            while angle < 360.0 {
                let offset = ring_offset(angle, distance);
                angle += step;
                if previous == Some(offset) {
                    continue;
                }
                previous = Some(offset);
                let coord = ChunkCoord::new(vx + offset.0, y, vz + offset.1);
                if seen.insert(coord) {
                    order.push(coord);
                }
            }
        }
    }
    order
}
