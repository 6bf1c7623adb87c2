//! All render layers of one chunk, tracked as a unit.
//!
//! A chunk's mesh is only complete once every layer has been built and
//! finalized. The bundle records where each layer is in that sequence.

use crate::geometry::MeshGeometry;
use crate::layer::RenderLayer;
use crate::layer_mesh::LayerMesh;

/// Progress of one layer through a build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerState {
    New,
    Generating,
    GenerationComplete,
    Finishing,
    Done,
}

/// Progress of the bundle as a whole.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BundleState {
    /// No build started since the last reset.
    Idle,
    /// At least one layer is still being built on a worker.
    Building,
    /// Every layer is built; finalize steps remain.
    Built,
    /// Every layer is finalized and visible.
    Finalized,
}

#[derive(Debug)]
pub struct MeshBundle {
    layers: [LayerMesh; 3],
    states: [LayerState; 3],
}

impl Default for MeshBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshBundle {
    pub fn new() -> Self {
        Self {
            layers: RenderLayer::ALL.map(LayerMesh::new),
            states: [LayerState::New; 3],
        }
    }

    pub fn layer(&self, layer: RenderLayer) -> &LayerMesh {
        &self.layers[layer.index()]
    }

    pub fn layer_state(&self, layer: RenderLayer) -> LayerState {
        self.states[layer.index()]
    }

    pub fn state(&self) -> BundleState {
        let all = |wanted: LayerState| self.states.iter().all(|s| *s == wanted);
        if all(LayerState::New) {
            BundleState::Idle
        } else if all(LayerState::Done) {
            BundleState::Finalized
        } else if self.states.iter().any(|s| matches!(s, LayerState::New | LayerState::Generating)) {
            BundleState::Building
        } else {
            BundleState::Built
        }
    }

    /// Marks every layer as being rebuilt. Visible geometry stays until the
    /// replacement is swapped in.
    pub fn begin_build(&mut self) {
        self.states = [LayerState::Generating; 3];
    }

    /// Stores the phase-one result of `layer`. Returns `true` when this was the
    /// last layer outstanding. Results for a layer that is not being built are
    /// discarded.
    pub fn complete_layer(&mut self, layer: RenderLayer, geometry: MeshGeometry) -> bool {
        let index = layer.index();
        if self.states[index] != LayerState::Generating {
            tracing::debug!(?layer, state = ?self.states[index], "discarding stale layer geometry");
            return false;
        }
        self.layers[index].submit(geometry);
        self.states[index] = LayerState::GenerationComplete;
        self.state() == BundleState::Built
    }

    /// Advances every unfinished layer by one finalize step. Returns `true`
    /// once all layers are done.
    pub fn finish_step(&mut self) -> bool {
        if self.state() != BundleState::Built {
            return self.state() == BundleState::Finalized;
        }
        for (mesh, state) in self.layers.iter_mut().zip(self.states.iter_mut()) {
            match state {
                LayerState::GenerationComplete | LayerState::Finishing => {
                    *state = LayerState::Finishing;
                    if mesh.advance() {
                        *state = LayerState::Done;
                    }
                }
                _ => {}
            }
        }
        self.state() == BundleState::Finalized
    }

    /// Drops all geometry and returns to `Idle`.
    pub fn reset(&mut self) {
        self.layers.iter_mut().for_each(LayerMesh::reset);
        self.states = [LayerState::New; 3];
    }

    /// Triangles currently visible across all layers.
    pub fn visible_triangles(&self) -> usize {
        self.layers.iter().map(|l| l.active().triangle_count()).sum()
    }
}
