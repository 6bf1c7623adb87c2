//! Flat attribute arrays produced by a mesh build.

use glam::Vec3;

/// An 8-bit RGBA vertex color.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Color32 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

static_assertions::assert_eq_size!(Color32, [u8; 4]);

impl Color32 {
    /// Converts linear `0.0..=1.0` RGB to bytes by truncation, fully opaque.
    pub fn from_rgb(rgb: Vec3) -> Self {
        let c = rgb.clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
        Self {
            r: c.x as u8,
            g: c.y as u8,
            b: c.z as u8,
            a: u8::MAX,
        }
    }
}

/// Triangle list with per-vertex colors, UVs and normals, in chunk-local
/// space. Every quad contributes four vertices and six indices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshGeometry {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<Color32>,
    pub indices: Vec<u32>,
    pub uvs: Vec<[f32; 2]>,
    pub normals: Vec<[f32; 3]>,
}

impl MeshGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn quad_count(&self) -> usize {
        self.positions.len() / 4
    }

    /// Appends one quad. Corners are bottom-left, top-left, bottom-right,
    /// top-right; the two triangles are `0 1 2` and `1 3 2`.
    pub fn push_quad(
        &mut self,
        corners: [[f32; 3]; 4],
        colors: [Color32; 4],
        uvs: [[f32; 2]; 4],
        normal: [f32; 3],
    ) {
        let base = self.positions.len() as u32;
        self.positions.extend_from_slice(&corners);
        self.colors.extend_from_slice(&colors);
        self.uvs.extend_from_slice(&uvs);
        self.normals.extend_from_slice(&[normal; 4]);
        self.indices
            .extend([0, 1, 2, 1, 3, 2].map(|i| base + i));
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.colors.clear();
        self.indices.clear();
        self.uvs.clear();
        self.normals.clear();
    }

    /// Raw position bytes for upload.
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Raw color bytes for upload.
    pub fn color_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }
}
