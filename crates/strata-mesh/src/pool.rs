//! Free list of mesh bundles.

use crate::bundle::MeshBundle;

/// Recycles [`MeshBundle`]s so that their buffers keep their capacity across
/// chunks. Bundles are reset on release.
#[derive(Debug, Default)]
pub struct MeshPool {
    free: Vec<MeshBundle>,
    created: usize,
}

impl MeshPool {
    /// A pool with `count` bundles ready.
    pub fn with_capacity(count: usize) -> Self {
        Self {
            free: (0..count).map(|_| MeshBundle::new()).collect(),
            created: count,
        }
    }

    /// Takes a bundle, allocating one if the pool is empty.
    pub fn acquire(&mut self) -> MeshBundle {
        self.free.pop().unwrap_or_else(|| {
            self.created += 1;
            MeshBundle::new()
        })
    }

    pub fn release(&mut self, mut bundle: MeshBundle) {
        bundle.reset();
        self.free.push(bundle);
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Bundles ever created by this pool.
    pub fn created(&self) -> usize {
        self.created
    }
}
