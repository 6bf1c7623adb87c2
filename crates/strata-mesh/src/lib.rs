//! Chunk mesh construction: per-layer quad emission on worker threads and the
//! incremental, double-buffered finalize that hands results to the renderer.

pub mod builder;
pub mod bundle;
pub mod geometry;
pub mod layer;
pub mod layer_mesh;
pub mod light;
pub mod pool;
pub mod shading;

pub use builder::{NeighborAccess, build_layer};
pub use bundle::{BundleState, LayerState, MeshBundle};
pub use geometry::{Color32, MeshGeometry};
pub use layer::RenderLayer;
pub use layer_mesh::{FinalizeStep, GeometrySlot, LayerMesh};
pub use light::{LightSampler, UniformLight};
pub use pool::MeshPool;
