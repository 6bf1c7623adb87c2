//! Multi-block structures placed during generation.
//!
//! A structure can straddle chunk borders. The generating chunk writes it
//! into every loaded neighbor, and also re-applies the structures its
//! neighbors placed earlier, so whichever chunk generates last still ends up
//! with the overlapping blocks.

use std::sync::Arc;

use strata_voxel::{BlockCoord, BlockType, ChunkCoord};

use crate::error::WorldError;

/// A fixed block pattern with an anchor point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructureTemplate {
    size: [i32; 3],
    origin: [i32; 3],
    /// Air cells overwrite what is already there.
    set_air: bool,
    /// Kinds with x outermost and z innermost.
    blocks: Vec<BlockType>,
}

impl StructureTemplate {
    /// # Errors
    ///
    /// [`WorldError::StructureSize`] when `blocks` does not fill `size`.
    pub fn new(
        size: [u32; 3],
        origin: [i32; 3],
        set_air: bool,
        blocks: Vec<BlockType>,
    ) -> Result<Self, WorldError> {
        let expected = size.iter().map(|s| *s as usize).product();
        if blocks.len() != expected {
            return Err(WorldError::StructureSize {
                expected,
                actual: blocks.len(),
            });
        }
        Ok(Self {
            size: size.map(|s| s as i32),
            origin,
            set_air,
            blocks,
        })
    }

    pub fn size(&self) -> [i32; 3] {
        self.size
    }

    /// Every cell the structure writes when anchored at `at`.
    ///
    /// The anchor sits one block below the structure's origin cell, so a
    /// structure anchored at a surface block grows on top of it.
    pub fn cells(&self, at: BlockCoord) -> impl Iterator<Item = (BlockCoord, BlockType)> + '_ {
        let [sx, sy, sz] = self.size;
        let [ox, oy, oz] = self.origin;
        (0..sx)
            .flat_map(move |x| (0..sy).flat_map(move |y| (0..sz).map(move |z| (x, y, z))))
            .zip(self.blocks.iter().copied())
            .filter(move |(_, ty)| self.set_air || *ty != BlockType::Air)
            .map(move |((x, y, z), ty)| (at.offset(x - ox, y - oy + 1, z - oz), ty))
    }

    /// Cells that fall inside `chunk`.
    pub fn cells_in(
        &self,
        at: BlockCoord,
        chunk: ChunkCoord,
    ) -> impl Iterator<Item = (BlockCoord, BlockType)> + '_ {
        self.cells(at).filter(move |(position, _)| position.chunk() == chunk)
    }
}

/// A structure anchored at a world position.
#[derive(Clone, Debug)]
pub struct PlacedStructure {
    pub origin: BlockCoord,
    pub template: Arc<StructureTemplate>,
}
