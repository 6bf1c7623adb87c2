//! Chunk, local and world block coordinate spaces.
//!
//! A [`BlockCoord`] is `chunk · CHUNK_SIZE + local`. Conversions that need a
//! chunk origin take the [`ChunkCoord`] explicitly.

use glam::Vec3;

use crate::face::Face;

/// Edge length of a cubic chunk, in blocks. Must stay a power of two.
pub const CHUNK_SIZE: i32 = 16;

/// Blocks per chunk.
pub const CHUNK_VOLUME: usize = (CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE) as usize;

const _: () = assert!(CHUNK_SIZE > 0 && CHUNK_SIZE & (CHUNK_SIZE - 1) == 0);

/// Integer position of a chunk in the chunk grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    /// Coordinate carried by pooled chunks that have no logical identity.
    pub const UNASSIGNED: ChunkCoord = ChunkCoord {
        x: i32::MIN,
        y: i32::MIN,
        z: i32::MIN,
    };

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk containing a world-space position.
    pub fn containing(position: Vec3) -> Self {
        BlockCoord::from_position(position).chunk()
    }

    pub fn is_assigned(self) -> bool {
        self != Self::UNASSIGNED
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn neighbor(self, face: Face) -> Self {
        let (dx, dy, dz) = face.offset();
        self.offset(dx, dy, dz)
    }

    /// The six face-adjacent chunks, in [`Face::ALL`] order.
    pub fn face_neighbors(self) -> [ChunkCoord; 6] {
        Face::ALL.map(|face| self.neighbor(face))
    }

    /// World block at local `(0, 0, 0)`.
    pub fn origin(self) -> BlockCoord {
        BlockCoord::new(
            self.x * CHUNK_SIZE,
            self.y * CHUNK_SIZE,
            self.z * CHUNK_SIZE,
        )
    }

    /// World-space position of the origin block, used for job priorities.
    pub fn origin_position(self) -> Vec3 {
        self.origin().to_vec3()
    }
}

/// Position of a block inside its chunk, always in `0..CHUNK_SIZE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LocalCoord {
    x: u8,
    y: u8,
    z: u8,
}

impl LocalCoord {
    /// Returns `None` when any component is outside the chunk.
    pub fn new(x: i32, y: i32, z: i32) -> Option<Self> {
        let range = 0..CHUNK_SIZE;
        if range.contains(&x) && range.contains(&y) && range.contains(&z) {
            Some(Self {
                x: x as u8,
                y: y as u8,
                z: z as u8,
            })
        } else {
            None
        }
    }

    pub fn x(self) -> i32 {
        self.x as i32
    }

    pub fn y(self) -> i32 {
        self.y as i32
    }

    pub fn z(self) -> i32 {
        self.z as i32
    }

    /// Storage index with x outermost and z innermost.
    pub fn index(self) -> usize {
        let size = CHUNK_SIZE as usize;
        (self.x as usize * size + self.y as usize) * size + self.z as usize
    }

    /// Inverse of [`LocalCoord::index`]. Indices wrap modulo [`CHUNK_VOLUME`].
    pub fn from_index(index: usize) -> Self {
        let size = CHUNK_SIZE as usize;
        let index = index % CHUNK_VOLUME;
        Self {
            x: (index / (size * size)) as u8,
            y: (index / size % size) as u8,
            z: (index % size) as u8,
        }
    }

    /// Every local coordinate in storage order.
    pub fn all() -> impl Iterator<Item = LocalCoord> {
        (0..CHUNK_VOLUME).map(Self::from_index)
    }

    /// Steps by `(dx, dy, dz)`, or `None` if the result leaves the chunk.
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Option<Self> {
        Self::new(self.x() + dx, self.y() + dy, self.z() + dz)
    }

    /// True on any of the six faces of the chunk.
    pub fn is_on_boundary(self) -> bool {
        let max = (CHUNK_SIZE - 1) as u8;
        [self.x, self.y, self.z]
            .iter()
            .any(|&c| c == 0 || c == max)
    }

    /// World position of this block inside `chunk`.
    pub fn to_block(self, chunk: ChunkCoord) -> BlockCoord {
        chunk.origin().offset(self.x(), self.y(), self.z())
    }
}

/// World-space integer block position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Block containing a floating-point world position.
    pub fn from_position(position: Vec3) -> Self {
        let p = position.floor();
        Self::new(p.x as i32, p.y as i32, p.z as i32)
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn chunk(self) -> ChunkCoord {
        ChunkCoord::new(
            self.x.div_euclid(CHUNK_SIZE),
            self.y.div_euclid(CHUNK_SIZE),
            self.z.div_euclid(CHUNK_SIZE),
        )
    }

    pub fn local(self) -> LocalCoord {
        let size = CHUNK_SIZE as u8;
        LocalCoord {
            x: self.x.rem_euclid(CHUNK_SIZE) as u8 % size,
            y: self.y.rem_euclid(CHUNK_SIZE) as u8 % size,
            z: self.z.rem_euclid(CHUNK_SIZE) as u8 % size,
        }
    }

    /// Local coordinate relative to `chunk`, if the block lies inside it.
    pub fn local_in(self, chunk: ChunkCoord) -> Option<LocalCoord> {
        let origin = chunk.origin();
        LocalCoord::new(self.x - origin.x, self.y - origin.y, self.z - origin.z)
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }

    pub fn distance_squared(self, other: BlockCoord) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dy * dy + dz * dz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_blocks_map_to_negative_chunks() {
        let block = BlockCoord::new(-1, -16, -17);
        assert_eq!(block.chunk(), ChunkCoord::new(-1, -1, -2));
        let local = block.local();
        assert_eq!((local.x(), local.y(), local.z()), (15, 0, 15));
    }

    #[test]
    fn test_local_to_block_round_trip() {
        let chunk = ChunkCoord::new(3, -2, 7);
        for index in [0, 1, 255, 256, 4095] {
            let local = LocalCoord::from_index(index);
            let block = local.to_block(chunk);
            assert_eq!(block.chunk(), chunk);
            assert_eq!(block.local(), local);
            assert_eq!(block.local_in(chunk), Some(local));
        }
    }

    #[test]
    fn test_index_order_is_x_then_y_then_z() {
        assert_eq!(LocalCoord::new(0, 0, 1).map(LocalCoord::index), Some(1));
        assert_eq!(LocalCoord::new(0, 1, 0).map(LocalCoord::index), Some(16));
        assert_eq!(LocalCoord::new(1, 0, 0).map(LocalCoord::index), Some(256));
        assert_eq!(LocalCoord::all().count(), CHUNK_VOLUME);
    }

    #[test]
    fn test_out_of_range_local_rejected() {
        assert!(LocalCoord::new(16, 0, 0).is_none());
        assert!(LocalCoord::new(0, -1, 0).is_none());
        let edge = LocalCoord::new(15, 15, 15).map(|l| l.offset(1, 0, 0));
        assert_eq!(edge, Some(None));
    }

    #[test]
    fn test_boundary_detection() {
        assert!(LocalCoord::new(0, 5, 5).is_some_and(LocalCoord::is_on_boundary));
        assert!(LocalCoord::new(5, 5, 15).is_some_and(LocalCoord::is_on_boundary));
        assert!(!LocalCoord::new(5, 5, 5).is_some_and(LocalCoord::is_on_boundary));
    }

    #[test]
    fn test_containing_floors() {
        assert_eq!(ChunkCoord::containing(Vec3::new(-0.5, 15.9, 16.0)), ChunkCoord::new(-1, 0, 1));
        assert!(!ChunkCoord::UNASSIGNED.is_assigned());
    }
}
