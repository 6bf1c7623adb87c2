//! The six faces of a block.

use glam::Vec3;

/// One of the six axis-aligned faces of a block.
///
/// North looks down −Z, south down +Z, west down −X and east down +X.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Face {
    Top = 0,
    Bottom = 1,
    North = 2,
    South = 3,
    West = 4,
    East = 5,
}

impl Face {
    /// All six faces in discriminant order.
    pub const ALL: [Face; 6] = [
        Self::Top,
        Self::Bottom,
        Self::North,
        Self::South,
        Self::West,
        Self::East,
    ];

    /// Integer step from a block to the neighbor behind this face.
    pub fn offset(self) -> (i32, i32, i32) {
        match self {
            Self::Top => (0, 1, 0),
            Self::Bottom => (0, -1, 0),
            Self::North => (0, 0, -1),
            Self::South => (0, 0, 1),
            Self::West => (-1, 0, 0),
            Self::East => (1, 0, 0),
        }
    }

    /// Unit outward normal.
    pub fn normal(self) -> Vec3 {
        let (x, y, z) = self.offset();
        Vec3::new(x as f32, y as f32, z as f32)
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
            Self::North => Self::South,
            Self::South => Self::North,
            Self::West => Self::East,
            Self::East => Self::West,
        }
    }

    /// Top and bottom are the horizontal faces; the rest are walls.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::Top | Self::Bottom)
    }

    pub fn index(self) -> usize {
        self as usize
    }
}
