//! The lighting collaborator consulted once per emitted face.

use glam::Vec3;
use strata_voxel::{BlockCoord, BlockLight, Face};

/// Computes the light color reaching a block face.
///
/// Implementations must be pure with respect to their inputs; they are called
/// concurrently from every mesh worker.
pub trait LightSampler: Send + Sync {
    /// Linear RGB in `0.0..=1.0`. `lights` are the emitters near the chunk
    /// being meshed.
    fn sample_light(&self, lights: &[BlockLight], position: BlockCoord, face: Face) -> Vec3;
}

/// Same color everywhere, brightened by nearby emitters in range.
#[derive(Clone, Copy, Debug)]
pub struct UniformLight {
    pub ambient: Vec3,
}

impl Default for UniformLight {
    fn default() -> Self {
        Self {
            ambient: Vec3::splat(0.8),
        }
    }
}

impl LightSampler for UniformLight {
    fn sample_light(&self, lights: &[BlockLight], position: BlockCoord, _face: Face) -> Vec3 {
        let boost = lights
            .iter()
            .filter_map(|light| {
                let emission = light.emission()?;
                let radius = emission.radius as i64;
                let d2 = light.position.distance_squared(position);
                (d2 <= radius * radius).then(|| 1.0 - (d2 as f32).sqrt() / emission.radius as f32)
            })
            .fold(0.0f32, f32::max);
        (self.ambient + Vec3::splat(boost * 0.2)).min(Vec3::ONE)
    }
}
