//! Keeping the per-block neighbor transparency caches in step with the
//! blocks they describe, across chunk borders.
//!
//! A chunk only ever holds its own lock while touching its own grid. Cache
//! updates owed to another chunk are collected first and delivered after
//! the lock is released; a chunk that is busy when they arrive queues them.

use std::ops::Range;

use rustc_hash::FxHashMap;
use strata_voxel::{BlockCoord, CHUNK_SIZE, ChunkCoord, ChunkGrid, LocalCoord, NeighborOffset};

use crate::chunk::Chunk;
use crate::repository::ChunkRepository;
use crate::sync::{lock, try_lock};

/// Sets one cached neighbor bit of one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TransparencyFlag {
    pub(crate) local: LocalCoord,
    pub(crate) offset: NeighborOffset,
    pub(crate) transparent: bool,
}

impl TransparencyFlag {
    pub(crate) fn apply(self, grid: &mut ChunkGrid) {
        grid.get_mut(self.local)
            .set_neighbor_transparent(self.offset, self.transparent);
    }
}

/// A [`TransparencyFlag`] addressed by world position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RemoteFlag {
    pub(crate) target: BlockCoord,
    pub(crate) offset: NeighborOffset,
    pub(crate) transparent: bool,
}

/// Tells all 26 neighbors of `local` whether it is now transparent.
/// Neighbors inside the grid are updated in place; the rest are returned.
pub(crate) fn push_transparency(
    grid: &mut ChunkGrid,
    chunk: ChunkCoord,
    local: LocalCoord,
    transparent: bool,
) -> Vec<RemoteFlag> {
    let mut remote = Vec::new();
    for offset in NeighborOffset::ALL {
        let back = offset.opposite();
        match local.offset(offset.dx(), offset.dy(), offset.dz()) {
            Some(inside) => grid.get_mut(inside).set_neighbor_transparent(back, transparent),
            None => remote.push(RemoteFlag {
                target: local
                    .to_block(chunk)
                    .offset(offset.dx(), offset.dy(), offset.dz()),
                offset: back,
                transparent,
            }),
        }
    }
    remote
}

/// Delivers cache updates to the chunks that own them. Unloaded targets are
/// skipped; they rebuild their caches when they arrive.
pub(crate) fn dispatch_flags(repo: &ChunkRepository, flags: Vec<RemoteFlag>) {
    if flags.is_empty() {
        return;
    }
    let mut by_chunk: FxHashMap<ChunkCoord, Vec<TransparencyFlag>> = FxHashMap::default();
    for flag in flags {
        by_chunk
            .entry(flag.target.chunk())
            .or_default()
            .push(TransparencyFlag {
                local: flag.target.local(),
                offset: flag.offset,
                transparent: flag.transparent,
            });
    }
    for (coord, flags) in by_chunk {
        if let Some(chunk) = repo.chunk(coord) {
            chunk.receive_flags(flags);
            repo.processing().add(&chunk);
        }
    }
}

const HALO: i32 = CHUNK_SIZE + 2;

/// Transparency of a chunk's blocks plus a one-block shell of its
/// neighbors'. Missing neighbors read as transparent.
struct Halo {
    cells: Box<[bool]>,
}

impl Halo {
    fn index(x: i32, y: i32, z: i32) -> usize {
        (((x + 1) * HALO + (y + 1)) * HALO + (z + 1)) as usize
    }

    fn is_transparent(&self, x: i32, y: i32, z: i32) -> bool {
        self.cells[Self::index(x, y, z)]
    }

    /// Locks `chunk` and then each neighbor in turn, never two at once.
    fn gather(chunk: &Chunk, coord: ChunkCoord, repo: &ChunkRepository) -> Self {
        let mut cells = vec![true; (HALO * HALO * HALO) as usize].into_boxed_slice();
        {
            let data = lock(&chunk.data);
            for local in LocalCoord::all() {
                cells[Self::index(local.x(), local.y(), local.z())] =
                    data.grid.get(local).is_transparent();
            }
        }

        for offset in NeighborOffset::ALL {
            let (dx, dy, dz) = (offset.dx(), offset.dy(), offset.dz());
            let Some(neighbor) = repo.chunk(coord.offset(dx, dy, dz)) else {
                continue;
            };
            let data = lock(&neighbor.data);
            for x in shell(dx) {
                for y in shell(dy) {
                    for z in shell(dz) {
                        let local = LocalCoord::new(
                            x.rem_euclid(CHUNK_SIZE),
                            y.rem_euclid(CHUNK_SIZE),
                            z.rem_euclid(CHUNK_SIZE),
                        );
                        if let Some(local) = local {
                            cells[Self::index(x, y, z)] = data.grid.get(local).is_transparent();
                        }
                    }
                }
            }
        }
        Self { cells }
    }
}

/// Halo cells along one axis for a neighbor in direction `d`.
fn shell(d: i32) -> Range<i32> {
    match d {
        -1 => -1..0,
        0 => 0..CHUNK_SIZE,
        _ => CHUNK_SIZE..CHUNK_SIZE + 1,
    }
}

impl Chunk {
    /// Applies neighbor cache updates now if the grid is free, otherwise
    /// queues them behind any already waiting so order is kept.
    pub(crate) fn receive_flags(&self, flags: Vec<TransparencyFlag>) {
        let mut queued = lock(&self.pending_flags);
        if queued.is_empty() {
            if let Some(mut data) = try_lock(&self.data) {
                for flag in flags {
                    flag.apply(&mut data.grid);
                }
                return;
            }
        }
        queued.extend(flags);
    }

    /// Rebuilds every block's neighbor cache from scratch and pushes the
    /// transparency of boundary blocks into the neighbors.
    pub(crate) fn load_transparency_cache(&self, repo: &ChunkRepository) {
        let coord = self.coord();
        let halo = Halo::gather(self, coord, repo);
        // The pull below supersedes anything still queued.
        lock(&self.pending_flags).clear();

        let remote = {
            let mut data = lock(&self.data);
            let mut remote = Vec::new();
            for local in LocalCoord::all() {
                let (x, y, z) = (local.x(), local.y(), local.z());
                let block = data.grid.get_mut(local);
                for offset in NeighborOffset::ALL {
                    let transparent =
                        halo.is_transparent(x + offset.dx(), y + offset.dy(), z + offset.dz());
                    block.set_neighbor_transparent(offset, transparent);
                }
                if !local.is_on_boundary() {
                    continue;
                }
                let transparent = block.is_transparent();
                for offset in NeighborOffset::ALL {
                    let (dx, dy, dz) = (offset.dx(), offset.dy(), offset.dz());
                    if local.offset(dx, dy, dz).is_none() {
                        remote.push(RemoteFlag {
                            target: local.to_block(coord).offset(dx, dy, dz),
                            offset: offset.opposite(),
                            transparent,
                        });
                    }
                }
            }
            remote
        };
        dispatch_flags(repo, remote);
    }
}
