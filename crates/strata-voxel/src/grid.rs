//! Dense storage for the blocks of one chunk.

use crate::block::Block;
use crate::block_type::BlockType;
use crate::coords::{CHUNK_VOLUME, LocalCoord};

/// `CHUNK_SIZE³` blocks stored in [`LocalCoord::index`] order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkGrid {
    blocks: Box<[Block]>,
}

impl Default for ChunkGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkGrid {
    /// A grid of air with fully transparent neighbor caches.
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::AIR; CHUNK_VOLUME].into_boxed_slice(),
        }
    }

    pub fn get(&self, local: LocalCoord) -> Block {
        self.blocks[local.index()]
    }

    pub fn get_mut(&mut self, local: LocalCoord) -> &mut Block {
        &mut self.blocks[local.index()]
    }

    /// Replaces the kind at `local` and returns the previous kind.
    pub fn set_type(&mut self, local: LocalCoord, block_type: BlockType) -> BlockType {
        let block = self.get_mut(local);
        let previous = block.block_type();
        block.set_block_type(block_type);
        previous
    }

    /// Resets every cell to air.
    pub fn clear(&mut self) {
        self.blocks.fill(Block::AIR);
    }

    /// Block kinds in storage order.
    pub fn types(&self) -> impl Iterator<Item = BlockType> + '_ {
        self.blocks.iter().map(|block| block.block_type())
    }

    /// Overwrites every kind from `types`, given in storage order.
    /// Neighbor caches are left untouched.
    pub fn fill_types(&mut self, types: &[BlockType]) {
        for (block, ty) in self.blocks.iter_mut().zip(types) {
            block.set_block_type(*ty);
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Positions of every block whose kind satisfies `predicate`.
    pub fn positions_where<'a>(
        &'a self,
        mut predicate: impl FnMut(Block) -> bool + 'a,
    ) -> impl Iterator<Item = LocalCoord> + 'a {
        self.blocks
            .iter()
            .enumerate()
            .filter(move |(_, block)| predicate(**block))
            .map(|(index, _)| LocalCoord::from_index(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_grid_is_air() {
        let grid = ChunkGrid::new();
        assert_eq!(grid.blocks().len(), CHUNK_VOLUME);
        assert!(grid.types().all(|ty| ty == BlockType::Air));
    }

    #[test]
    fn test_set_type_returns_previous() {
        let mut grid = ChunkGrid::new();
        let Some(local) = LocalCoord::new(3, 4, 5) else {
            panic!("in range");
        };
        assert_eq!(grid.set_type(local, BlockType::Stone), BlockType::Air);
        assert_eq!(grid.set_type(local, BlockType::Dirt), BlockType::Stone);
        assert_eq!(grid.get(local).block_type(), BlockType::Dirt);
    }

    #[test]
    fn test_positions_where() {
        let mut grid = ChunkGrid::new();
        let lamp = LocalCoord::from_index(77);
        grid.set_type(lamp, BlockType::Lamp);
        let found: Vec<_> = grid.positions_where(|b| b.emission().is_some()).collect();
        assert_eq!(found, vec![lamp]);
    }

    #[test]
    fn test_fill_types_in_storage_order() {
        let mut grid = ChunkGrid::new();
        let mut types = vec![BlockType::Air; CHUNK_VOLUME];
        types[1] = BlockType::Sand;
        grid.fill_types(&types);
        assert_eq!(grid.get(LocalCoord::from_index(1)).block_type(), BlockType::Sand);
        grid.clear();
        assert_eq!(grid.get(LocalCoord::from_index(1)).block_type(), BlockType::Air);
    }
}
