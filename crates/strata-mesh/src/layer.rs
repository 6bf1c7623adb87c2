//! Render layers a chunk emits geometry into.

use strata_voxel::Block;

/// Geometry is split by how the renderer blends it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RenderLayer {
    Solid = 0,
    Transparent = 1,
    Water = 2,
}

impl RenderLayer {
    pub const ALL: [RenderLayer; 3] = [Self::Solid, Self::Transparent, Self::Water];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether `block` belongs to this layer.
    pub fn renders(self, block: Block) -> bool {
        match self {
            Self::Solid => block.is_active() && block.is_opaque(),
            Self::Transparent => block.is_active() && block.is_transparent() && !block.is_water(),
            Self::Water => block.is_water(),
        }
    }

    /// Half the edge length of an emitted cube. Slightly above 0.5 so that
    /// adjacent quads overlap and no seams show.
    pub fn half_size(self) -> f32 {
        match self {
            Self::Water => 0.500_01,
            _ => 0.5005,
        }
    }

    /// The solid layer trusts the cached neighbor bits; the others re-check
    /// neighbors because their occlusion depends on both kinds involved.
    pub fn uses_cached_occlusion(self) -> bool {
        self == Self::Solid
    }
}
