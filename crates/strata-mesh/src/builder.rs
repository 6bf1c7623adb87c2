//! Phase one of a mesh build: turning a chunk's blocks into quads.
//!
//! The builder works on a private copy of the chunk grid so that edits made
//! while it runs cannot tear the result. Blocks in other chunks are reached
//! through [`NeighborAccess`].

use glam::Vec3;
use strata_voxel::{
    Block, BlockCoord, BlockLight, CHUNK_SIZE, ChunkCoord, ChunkGrid, Face, LocalCoord,
    NeighborOffset, TextureRule,
};

use crate::geometry::{Color32, MeshGeometry};
use crate::layer::RenderLayer;
use crate::light::LightSampler;
use crate::shading::{corner_neighbors, corner_signs, shade};

/// Faces in emission order.
const EMIT_ORDER: [Face; 6] = [
    Face::West,
    Face::East,
    Face::Bottom,
    Face::Top,
    Face::North,
    Face::South,
];

/// Read access to blocks outside the chunk being meshed.
pub trait NeighborAccess {
    /// The block at `position`, or `None` if its chunk is not loaded.
    fn block_at(&self, position: BlockCoord) -> Option<Block>;

    /// Whether no active opaque block exists anywhere above `position`, up to
    /// the top of the world.
    fn sky_exposed(&self, position: BlockCoord) -> bool;
}

struct FaceContext<'a, N: ?Sized> {
    chunk: ChunkCoord,
    grid: &'a ChunkGrid,
    neighbors: &'a N,
    sampler: &'a dyn LightSampler,
    lights: &'a [BlockLight],
    layer: RenderLayer,
}

/// Builds the geometry of one render layer of `chunk` from `grid`.
///
/// Blocks are walked x then z, with y descending. Positions are chunk-local.
pub fn build_layer<N: NeighborAccess + ?Sized>(
    layer: RenderLayer,
    chunk: ChunkCoord,
    grid: &ChunkGrid,
    neighbors: &N,
    sampler: &dyn LightSampler,
    lights: &[BlockLight],
) -> MeshGeometry {
    let ctx = FaceContext {
        chunk,
        grid,
        neighbors,
        sampler,
        lights,
        layer,
    };
    let mut geometry = MeshGeometry::new();
    for x in 0..CHUNK_SIZE {
        for z in 0..CHUNK_SIZE {
            for y in (0..CHUNK_SIZE).rev() {
                if let Some(local) = LocalCoord::new(x, y, z) {
                    ctx.emit_block(local, &mut geometry);
                }
            }
        }
    }
    tracing::trace!(?chunk, ?layer, quads = geometry.quad_count(), "built layer");
    geometry
}

impl<N: NeighborAccess + ?Sized> FaceContext<'_, N> {
    fn emit_block(&self, local: LocalCoord, geometry: &mut MeshGeometry) {
        let block = self.grid.get(local);
        if !self.layer.renders(block) {
            return;
        }
        let blocked = Face::ALL.map(|face| self.face_blocked(block, local, face));
        let above_blocked = blocked[Face::Top.index()];
        for face in EMIT_ORDER {
            if !blocked[face.index()] {
                self.emit_face(block, local, face, above_blocked, geometry);
            }
        }
    }

    /// Whether `face` of `block` is hidden by its neighbor.
    fn face_blocked(&self, block: Block, local: LocalCoord, face: Face) -> bool {
        if self.layer.uses_cached_occlusion() {
            return block.neighbor_is_opaque(NeighborOffset::from_face(face));
        }
        let (dx, dy, dz) = face.offset();
        let neighbor = match local.offset(dx, dy, dz) {
            Some(inside) => Some(self.grid.get(inside)),
            None => self.neighbors.block_at(local.to_block(self.chunk).offset(dx, dy, dz)),
        };
        // An unloaded neighbor hides the face until it arrives.
        !neighbor.is_some_and(|n| !n.blocks_view_of(block))
    }

    fn sky_exposed(&self, local: LocalCoord) -> bool {
        let covered = (local.y() + 1..CHUNK_SIZE).any(|y| {
            LocalCoord::new(local.x(), y, local.z())
                .map(|above| self.grid.get(above))
                .is_some_and(|b| b.is_active() && b.is_opaque())
        });
        if covered {
            return false;
        }
        let top = LocalCoord::new(local.x(), CHUNK_SIZE - 1, local.z()).unwrap_or(local);
        self.neighbors.sky_exposed(top.to_block(self.chunk))
    }

    fn emit_face(
        &self,
        block: Block,
        local: LocalCoord,
        face: Face,
        above_blocked: bool,
        geometry: &mut MeshGeometry,
    ) {
        let center = Vec3::new(local.x() as f32, local.y() as f32, local.z() as f32);
        let half = self.layer.half_size();
        let world = local.to_block(self.chunk);

        let signs = corner_signs(face);
        let corners = signs.map(|s| {
            (center + Vec3::new(s[0] as f32, s[1] as f32, s[2] as f32) * half).to_array()
        });

        let light = self.sampler.sample_light(self.lights, world, face);
        let lit = Color32::from_rgb(light);
        let shaded_corners = signs.map(|corner| {
            corner_neighbors(face, corner)
                .iter()
                .any(|offset| block.neighbor_is_opaque(*offset))
        });
        let colors = if shaded_corners.iter().any(|&s| s) {
            let dark = Color32::from_rgb(shade(light));
            shaded_corners.map(|s| if s { dark } else { lit })
        } else {
            [lit; 4]
        };

        let definition = block.definition();
        let sky = matches!(definition.texture, TextureRule::Grass { .. }) && self.sky_exposed(local);
        let (lower, upper) = definition.texture_slot(face, above_blocked, sky).uv_rect();
        let uvs = [
            [lower[0], upper[1]],
            [lower[0], lower[1]],
            [upper[0], upper[1]],
            [upper[0], lower[1]],
        ];

        geometry.push_quad(corners, colors, uvs, face.normal().to_array());
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::light::UniformLight;
    use strata_voxel::BlockType;

    /// Neighbors from a sparse map; everything else is unloaded.
    #[derive(Default)]
    struct MapNeighbors {
        blocks: HashMap<BlockCoord, Block>,
        open_sky: bool,
    }

    impl NeighborAccess for MapNeighbors {
        fn block_at(&self, position: BlockCoord) -> Option<Block> {
            self.blocks.get(&position).copied()
        }

        fn sky_exposed(&self, _position: BlockCoord) -> bool {
            self.open_sky
        }
    }

    fn local(x: i32, y: i32, z: i32) -> LocalCoord {
        LocalCoord::new(x, y, z).expect("in range")
    }

    fn build(layer: RenderLayer, grid: &ChunkGrid, neighbors: &MapNeighbors) -> MeshGeometry {
        build_layer(layer, ChunkCoord::new(0, 0, 0), grid, neighbors, &UniformLight::default(), &[])
    }

    #[test]
    fn test_lone_block_with_clear_cache_emits_six_faces() {
        let mut grid = ChunkGrid::new();
        grid.set_type(local(5, 5, 5), BlockType::Stone);
        let geometry = build(RenderLayer::Solid, &grid, &MapNeighbors::default());
        assert_eq!(geometry.quad_count(), 6);
        assert_eq!(geometry.indices.len(), 36);
        assert_eq!(geometry.uvs.len(), 24);
        assert!(geometry.colors.iter().all(|c| c.a == 255));
    }

    #[test]
    fn test_cached_opaque_neighbor_culls_face() {
        let mut grid = ChunkGrid::new();
        let p = local(5, 5, 5);
        grid.set_type(p, BlockType::Stone);
        grid.get_mut(p).set_neighbor_transparent(NeighborOffset::from_face(Face::Top), false);
        let geometry = build(RenderLayer::Solid, &grid, &MapNeighbors::default());
        assert_eq!(geometry.quad_count(), 5);
        assert!(!geometry.normals.contains(&[0.0, 1.0, 0.0]));
    }

    #[test]
    fn test_other_layers_ignore_solid_blocks() {
        let mut grid = ChunkGrid::new();
        grid.set_type(local(1, 1, 1), BlockType::Stone);
        let neighbors = MapNeighbors::default();
        assert!(build(RenderLayer::Transparent, &grid, &neighbors).is_empty());
        assert!(build(RenderLayer::Water, &grid, &neighbors).is_empty());
    }

    #[test]
    fn test_glass_pair_hides_shared_faces() {
        let mut grid = ChunkGrid::new();
        grid.set_type(local(4, 4, 4), BlockType::Glass);
        grid.set_type(local(5, 4, 4), BlockType::Glass);
        let geometry = build(RenderLayer::Transparent, &grid, &MapNeighbors::default());
        assert_eq!(geometry.quad_count(), 10);
    }

    #[test]
    fn test_leaves_keep_shared_faces() {
        let mut grid = ChunkGrid::new();
        grid.set_type(local(4, 4, 4), BlockType::Leaves);
        grid.set_type(local(5, 4, 4), BlockType::Leaves);
        let geometry = build(RenderLayer::Transparent, &grid, &MapNeighbors::default());
        assert_eq!(geometry.quad_count(), 12);
    }

    #[test]
    fn test_unloaded_neighbor_hides_boundary_face() {
        let mut grid = ChunkGrid::new();
        grid.set_type(local(0, 4, 4), BlockType::Water);
        let mut neighbors = MapNeighbors::default();
        let unloaded = build(RenderLayer::Water, &grid, &neighbors);
        assert_eq!(unloaded.quad_count(), 5);

        neighbors.blocks.insert(BlockCoord::new(-1, 4, 4), Block::AIR);
        let loaded = build(RenderLayer::Water, &grid, &neighbors);
        assert_eq!(loaded.quad_count(), 6);
    }

    #[test]
    fn test_occluded_corner_is_darker() {
        let mut grid = ChunkGrid::new();
        let p = local(5, 5, 5);
        grid.set_type(p, BlockType::Stone);
        grid.get_mut(p).set_neighbor_transparent(NeighborOffset::new(-1, 1, 0), false);
        let geometry = build(RenderLayer::Solid, &grid, &MapNeighbors::default());

        // West is emitted first; its top corners touch (-1, 1, 0).
        let west = &geometry.colors[0..4];
        assert_eq!(west[0], west[2]);
        assert!(west[1].r < west[0].r);
        assert!(west[3].r < west[0].r);
    }

    #[test]
    fn test_grass_top_needs_open_sky() {
        let mut grid = ChunkGrid::new();
        grid.set_type(local(2, 2, 2), BlockType::Dirt);
        let grass_top = strata_voxel::TextureSlot::new(0, 0).uv_rect();
        let dirt = strata_voxel::TextureSlot::new(2, 0).uv_rect();

        let mut neighbors = MapNeighbors {
            open_sky: true,
            ..Default::default()
        };
        let open = build(RenderLayer::Solid, &grid, &neighbors);
        // Top is the fourth face emitted.
        assert_eq!(open.uvs[12], [grass_top.0[0], grass_top.1[1]]);

        neighbors.open_sky = false;
        let closed = build(RenderLayer::Solid, &grid, &neighbors);
        assert_eq!(closed.uvs[12], [dirt.0[0], dirt.1[1]]);

        neighbors.open_sky = true;
        grid.set_type(local(2, 9, 2), BlockType::Stone);
        let covered = build(RenderLayer::Solid, &grid, &neighbors);
        // y descends, so the stone's six faces come first.
        assert_eq!(covered.uvs[24 + 12], [dirt.0[0], dirt.1[1]]);
    }

    #[test]
    fn test_positions_are_chunk_local() {
        let mut grid = ChunkGrid::new();
        grid.set_type(local(15, 0, 0), BlockType::Stone);
        let geometry = build_layer(
            RenderLayer::Solid,
            ChunkCoord::new(9, 9, 9),
            &grid,
            &MapNeighbors::default(),
            &UniformLight::default(),
            &[],
        );
        for p in &geometry.positions {
            assert!(p[0] > 14.0 && p[0] < 16.0);
        }
    }
}
