//! The inline block value and its neighbor transparency cache.
//!
//! Each [`Block`] carries a 32-bit mask with one bit per neighbor offset in
//! the surrounding 3×3×3 cube. A set bit means that neighbor is transparent.
//! The mask is a cache of the neighbors' true kinds and is kept in sync by
//! explicit push/pull propagation from the owning chunk.

use crate::block_type::BlockType;
use crate::coords::BlockCoord;
use crate::definition::{BlockDefinition, LightEmission};
use crate::face::Face;

/// Every neighbor starts out assumed transparent.
const ALL_TRANSPARENT: u32 = u32::MAX;

/// A step to one of the 26 blocks around a block, each component in `-1..=1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NeighborOffset {
    dx: i8,
    dy: i8,
    dz: i8,
}

impl NeighborOffset {
    /// All 26 offsets, z outermost and x innermost. The center is excluded.
    pub const ALL: [NeighborOffset; 26] = all_offsets();

    /// Components are clamped to their sign, so any input yields a valid offset.
    pub const fn new(dx: i8, dy: i8, dz: i8) -> Self {
        Self {
            dx: dx.signum(),
            dy: dy.signum(),
            dz: dz.signum(),
        }
    }

    pub fn from_face(face: Face) -> Self {
        let (dx, dy, dz) = face.offset();
        Self::new(dx as i8, dy as i8, dz as i8)
    }

    pub fn dx(self) -> i32 {
        self.dx as i32
    }

    pub fn dy(self) -> i32 {
        self.dy as i32
    }

    pub fn dz(self) -> i32 {
        self.dz as i32
    }

    pub fn opposite(self) -> Self {
        Self::new(-self.dx, -self.dy, -self.dz)
    }

    /// Bit position: one base-3 digit per axis, x least significant.
    pub fn bit(self) -> u32 {
        let digit = |c: i8| (c + 1) as u32;
        digit(self.dx) + 3 * digit(self.dy) + 9 * digit(self.dz)
    }
}

const fn all_offsets() -> [NeighborOffset; 26] {
    let mut out = [NeighborOffset { dx: 0, dy: 0, dz: 0 }; 26];
    let mut i = 0;
    let mut dz = -1;
    while dz <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dx = -1;
            while dx <= 1 {
                if dx != 0 || dy != 0 || dz != 0 {
                    out[i] = NeighborOffset { dx, dy, dz };
                    i += 1;
                }
                dx += 1;
            }
            dy += 1;
        }
        dz += 1;
    }
    out
}

/// One cell of a chunk grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    block_type: BlockType,
    transparent_neighbors: u32,
}

impl Default for Block {
    fn default() -> Self {
        Self::AIR
    }
}

impl Block {
    pub const AIR: Block = Block::new(BlockType::Air);

    pub const fn new(block_type: BlockType) -> Self {
        Self {
            block_type,
            transparent_neighbors: ALL_TRANSPARENT,
        }
    }

    pub fn block_type(self) -> BlockType {
        self.block_type
    }

    /// Changes the kind while keeping the neighbor cache, which describes
    /// the surroundings rather than this block.
    pub fn set_block_type(&mut self, block_type: BlockType) {
        self.block_type = block_type;
    }

    pub fn definition(self) -> &'static BlockDefinition {
        self.block_type.definition()
    }

    pub fn is_active(self) -> bool {
        self.block_type != BlockType::Air
    }

    pub fn is_transparent(self) -> bool {
        self.definition().transparent
    }

    pub fn is_opaque(self) -> bool {
        !self.is_transparent()
    }

    pub fn is_water(self) -> bool {
        self.block_type == BlockType::Water
    }

    pub fn is_bedrock(self) -> bool {
        self.block_type == BlockType::Bedrock
    }

    pub fn removes_hidden_faces(self) -> bool {
        self.definition().removes_hidden_faces
    }

    pub fn emission(self) -> Option<LightEmission> {
        let definition = self.definition();
        definition.emission.filter(|_| definition.is_light_emitter())
    }

    /// Cached: the neighbor at `offset` lets light and sight through.
    pub fn neighbor_is_transparent(self, offset: NeighborOffset) -> bool {
        self.transparent_neighbors & (1 << offset.bit()) != 0
    }

    /// Cached: the neighbor at `offset` occludes this block.
    pub fn neighbor_is_opaque(self, offset: NeighborOffset) -> bool {
        !self.neighbor_is_transparent(offset)
    }

    pub fn set_neighbor_transparent(&mut self, offset: NeighborOffset, transparent: bool) {
        let mask = 1 << offset.bit();
        if transparent {
            self.transparent_neighbors |= mask;
        } else {
            self.transparent_neighbors &= !mask;
        }
    }

    pub fn neighbor_bits(self) -> u32 {
        self.transparent_neighbors
    }

    /// Whether this block hides the face `other` shows towards it.
    ///
    /// Opaque blocks hide everything. Transparent blocks hide faces of other
    /// transparent blocks only when they remove hidden faces, and water always
    /// hides water.
    pub fn blocks_view_of(self, other: Block) -> bool {
        if !self.is_active() {
            return false;
        }
        self.is_opaque()
            || (other.is_transparent() && self.removes_hidden_faces())
            || (self.is_water() && other.is_water())
    }
}

/// A light-emitting block known to a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockLight {
    pub position: BlockCoord,
    pub block_type: BlockType,
}

impl BlockLight {
    pub fn emission(self) -> Option<LightEmission> {
        Block::new(self.block_type).emission()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_bits_are_unique() {
        let mut seen = 0u32;
        for offset in NeighborOffset::ALL {
            let bit = offset.bit();
            assert!(bit < 27);
            assert_ne!(bit, 13, "center bit is never used");
            assert_eq!(seen & (1 << bit), 0);
            seen |= 1 << bit;
        }
    }

    #[test]
    fn test_bit_encoding_matches_base_three_digits() {
        assert_eq!(NeighborOffset::new(-1, -1, -1).bit(), 0);
        assert_eq!(NeighborOffset::new(1, 0, 0).bit(), 2 + 3 + 9);
        assert_eq!(NeighborOffset::new(0, 1, 0).bit(), 1 + 6 + 9);
        assert_eq!(NeighborOffset::new(1, 1, 1).bit(), 26);
    }

    #[test]
    fn test_new_block_assumes_transparent_neighbors() {
        let block = Block::new(BlockType::Stone);
        for offset in NeighborOffset::ALL {
            assert!(block.neighbor_is_transparent(offset));
        }
    }

    #[test]
    fn test_set_neighbor_flag() {
        let mut block = Block::new(BlockType::Dirt);
        let east = NeighborOffset::from_face(Face::East);
        block.set_neighbor_transparent(east, false);
        assert!(block.neighbor_is_opaque(east));
        assert!(block.neighbor_is_transparent(east.opposite()));
        block.set_neighbor_transparent(east, true);
        assert!(block.neighbor_is_transparent(east));
    }

    #[test]
    fn test_set_type_keeps_cache() {
        let mut block = Block::new(BlockType::Stone);
        block.set_neighbor_transparent(NeighborOffset::new(0, 1, 0), false);
        let bits = block.neighbor_bits();
        block.set_block_type(BlockType::Glass);
        assert_eq!(block.neighbor_bits(), bits);
    }

    #[test]
    fn test_blocks_view_of() {
        let stone = Block::new(BlockType::Stone);
        let glass = Block::new(BlockType::Glass);
        let leaves = Block::new(BlockType::Leaves);
        let water = Block::new(BlockType::Water);

        assert!(stone.blocks_view_of(glass));
        assert!(glass.blocks_view_of(glass));
        assert!(!glass.blocks_view_of(stone));
        assert!(!leaves.blocks_view_of(leaves));
        assert!(water.blocks_view_of(water));
        assert!(!Block::AIR.blocks_view_of(stone));
    }

    #[test]
    fn test_light_emission() {
        let light = BlockLight {
            position: BlockCoord::new(0, 0, 0),
            block_type: BlockType::BlueLamp,
        };
        assert_eq!(light.emission().map(|e| e.radius), Some(10));
        assert!(Block::new(BlockType::Stone).emission().is_none());
    }
}
