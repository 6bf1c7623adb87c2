//! Viewpoint-relative priorities.

use glam::Vec3;

/// Distance at which the distance bonus reaches zero, in blocks.
const BONUS_RANGE: f32 = 500.0;
const BONUS_PER_BLOCK: f32 = 100.0;

/// Coarse urgency of a job, before distance is taken into account.
///
/// The gaps between levels dwarf any distance bonus inside the view range, so
/// a higher level always runs first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BasePriority {
    Low,
    Medium,
    High,
}

impl BasePriority {
    pub fn value(self) -> i64 {
        match self {
            Self::Low => 0,
            Self::Medium => 500_000,
            Self::High => 1_000_000,
        }
    }
}

/// `base + (50000 − 100·distance)`, truncated towards zero.
pub fn effective_priority(base: BasePriority, position: Vec3, viewpoint: Vec3) -> i64 {
    let distance = position.distance(viewpoint);
    base.value() + ((BONUS_RANGE - distance) * BONUS_PER_BLOCK) as i64
}
