//! Quad corner layout and per-corner ambient shading.
//!
//! Every face is emitted as four corners in the order bottom-left, top-left,
//! bottom-right, top-right, as seen from outside the block. A corner is
//! darkened when any of the three blocks touching it on the face's outer side
//! is opaque: the two edge neighbors and the diagonal one.

use glam::Vec3;
use strata_voxel::{Face, NeighborOffset};

/// Brightness removed from a shaded corner, on the HSB value scale.
const SHADE_AMOUNT: f32 = 0.37;
/// Shaded corners never get darker than this.
const SHADE_FLOOR: f32 = 0.063;

/// Sign of each corner relative to the block center, per axis.
pub fn corner_signs(face: Face) -> [[i8; 3]; 4] {
    match face {
        Face::Top => [[-1, 1, -1], [-1, 1, 1], [1, 1, -1], [1, 1, 1]],
        Face::Bottom => [[1, -1, -1], [1, -1, 1], [-1, -1, -1], [-1, -1, 1]],
        Face::North => [[-1, -1, -1], [-1, 1, -1], [1, -1, -1], [1, 1, -1]],
        Face::South => [[1, -1, 1], [1, 1, 1], [-1, -1, 1], [-1, 1, 1]],
        Face::West => [[-1, -1, 1], [-1, 1, 1], [-1, -1, -1], [-1, 1, -1]],
        Face::East => [[1, -1, -1], [1, 1, -1], [1, -1, 1], [1, 1, 1]],
    }
}

/// The three neighbors that can occlude one corner of `face`.
pub fn corner_neighbors(face: Face, corner: [i8; 3]) -> [NeighborOffset; 3] {
    let (nx, ny, nz) = face.offset();
    let normal = [nx as i8, ny as i8, nz as i8];
    // Keep the normal component and one or both tangent components.
    let axis = normal.iter().position(|&c| c != 0).unwrap_or(1);
    let tangents = match axis {
        0 => [1, 2],
        1 => [0, 2],
        _ => [0, 1],
    };
    let pick = |keep: &[usize]| {
        let mut out = normal;
        for &a in keep {
            out[a] = corner[a];
        }
        NeighborOffset::new(out[0], out[1], out[2])
    };
    [
        pick(&tangents[..1]),
        pick(&tangents[1..]),
        pick(&tangents),
    ]
}

/// Darkens `color` for an occluded corner: lowers its brightness by a fixed
/// amount while keeping hue and saturation.
pub fn shade(color: Vec3) -> Vec3 {
    let value = color.max_element();
    let shaded = (value - SHADE_AMOUNT).max(SHADE_FLOOR);
    if value <= 0.0 {
        Vec3::splat(SHADE_FLOOR)
    } else {
        color * (shaded / value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_bottom_left_corner_neighbors() {
        let [bottom_left, ..] = corner_signs(Face::Top);
        let offsets = corner_neighbors(Face::Top, bottom_left);
        assert_eq!(
            offsets,
            [
                NeighborOffset::new(-1, 1, 0),
                NeighborOffset::new(0, 1, -1),
                NeighborOffset::new(-1, 1, -1),
            ]
        );
    }

    #[test]
    fn test_corner_neighbors_stay_on_face_side() {
        for face in Face::ALL {
            let (nx, ny, nz) = face.offset();
            for corner in corner_signs(face) {
                for offset in corner_neighbors(face, corner) {
                    let along_normal = offset.dx() * nx + offset.dy() * ny + offset.dz() * nz;
                    assert_eq!(along_normal, 1, "{face:?}");
                }
            }
        }
    }

    #[test]
    fn test_corners_lie_on_face() {
        for face in Face::ALL {
            let (nx, ny, nz) = face.offset();
            for corner in corner_signs(face) {
                let dot = corner[0] as i32 * nx + corner[1] as i32 * ny + corner[2] as i32 * nz;
                assert_eq!(dot, 1);
            }
        }
    }

    #[test]
    fn test_shade_lowers_brightness() {
        let shaded = shade(Vec3::new(1.0, 0.5, 0.0));
        assert!((shaded.x - 0.63).abs() < 1e-6);
        assert!((shaded.y - 0.315).abs() < 1e-6);
        assert_eq!(shaded.z, 0.0);
    }

    #[test]
    fn test_shade_floor() {
        assert_eq!(shade(Vec3::ZERO), Vec3::splat(SHADE_FLOOR));
        let dim = shade(Vec3::splat(0.2));
        assert!((dim.x - SHADE_FLOOR).abs() < 1e-6);
    }
}
