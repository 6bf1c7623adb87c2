//! Phase two of a mesh build: moving finished geometry into the render slot.
//!
//! Each call to [`LayerMesh::advance`] performs exactly one step of the
//! finalize sequence, so a caller with a frame budget can stop between any
//! two steps and resume on the next tick. Geometry is written into the
//! inactive slot and only becomes visible when the slots are swapped at the
//! final step.

use glam::Vec3;

use crate::geometry::{Color32, MeshGeometry};
use crate::layer::RenderLayer;

/// Resumption point of the finalize sequence. Each state names the work the
/// next [`LayerMesh::advance`] call performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalizeStep {
    Waiting,
    SettingVertices,
    SettingTriangles,
    SettingUVs,
    SettingNormals,
    Optimize,
    Done,
}

/// One backing buffer of the double buffer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometrySlot {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<Color32>,
    pub indices: Vec<u32>,
    pub uvs: Vec<[f32; 2]>,
    pub normals: Vec<[f32; 3]>,
    /// Axis-aligned `(min, max)` of the positions, set by the optimize step.
    pub bounds: Option<(Vec3, Vec3)>,
}

impl GeometrySlot {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.colors.clear();
        self.indices.clear();
        self.uvs.clear();
        self.normals.clear();
        self.bounds = None;
    }

    fn compute_bounds(&mut self) {
        self.bounds = self.positions.iter().fold(None, |acc, p| {
            let p = Vec3::from_array(*p);
            Some(match acc {
                None => (p, p),
                Some((min, max)) => (min.min(p), max.max(p)),
            })
        });
    }
}

/// Double-buffered geometry for one render layer of one chunk.
#[derive(Debug)]
pub struct LayerMesh {
    layer: RenderLayer,
    pending: Option<MeshGeometry>,
    slots: [GeometrySlot; 2],
    active: usize,
    step: FinalizeStep,
}

impl LayerMesh {
    pub fn new(layer: RenderLayer) -> Self {
        Self {
            layer,
            pending: None,
            slots: [GeometrySlot::default(), GeometrySlot::default()],
            active: 0,
            step: FinalizeStep::Waiting,
        }
    }

    pub fn layer(&self) -> RenderLayer {
        self.layer
    }

    pub fn step(&self) -> FinalizeStep {
        self.step
    }

    /// Geometry the renderer should draw.
    pub fn active(&self) -> &GeometrySlot {
        &self.slots[self.active]
    }

    /// Hands over a freshly built geometry and restarts the finalize sequence.
    pub fn submit(&mut self, geometry: MeshGeometry) {
        self.pending = Some(geometry);
        self.slots[1 - self.active].clear();
        self.step = FinalizeStep::Waiting;
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Performs one finalize step. Returns `true` on the call that swaps the
    /// new geometry in; the sequence is then back at `Waiting`.
    pub fn advance(&mut self) -> bool {
        let inactive = 1 - self.active;
        let Some(pending) = self.pending.as_mut() else {
            return false;
        };
        let slot = &mut self.slots[inactive];
        self.step = match self.step {
            FinalizeStep::Waiting if pending.is_empty() => FinalizeStep::Done,
            FinalizeStep::Waiting => FinalizeStep::SettingVertices,
            FinalizeStep::SettingVertices => {
                slot.positions = std::mem::take(&mut pending.positions);
                slot.colors = std::mem::take(&mut pending.colors);
                FinalizeStep::SettingTriangles
            }
            FinalizeStep::SettingTriangles => {
                slot.indices = std::mem::take(&mut pending.indices);
                FinalizeStep::SettingUVs
            }
            FinalizeStep::SettingUVs => {
                slot.uvs = std::mem::take(&mut pending.uvs);
                FinalizeStep::SettingNormals
            }
            FinalizeStep::SettingNormals => {
                slot.normals = std::mem::take(&mut pending.normals);
                FinalizeStep::Optimize
            }
            FinalizeStep::Optimize => {
                slot.compute_bounds();
                FinalizeStep::Done
            }
            FinalizeStep::Done => {
                self.pending = None;
                self.active = inactive;
                self.slots[1 - inactive].clear();
                self.step = FinalizeStep::Waiting;
                return true;
            }
        };
        false
    }

    /// Drops all geometry, visible or pending.
    pub fn reset(&mut self) {
        self.pending = None;
        self.slots.iter_mut().for_each(GeometrySlot::clear);
        self.active = 0;
        self.step = FinalizeStep::Waiting;
    }
}
