//! Point and sphere against an oriented box.

use glam::Vec3;

use crate::types::*;

/// Signed distance from `p` to an origin-centered box of half size `h`, all
/// in the box's local frame.
///
/// Returns `(surface_point, outward_normal, distance)`. For a point inside
/// the box the nearest face wins; ties pick y, then z, then x.
pub(crate) fn point_box_local(p: Vec3, h: Vec3) -> (Vec3, Vec3, f32) {
    let inside = p.abs().cmple(h).all();
    if !inside {
        let closest = p.clamp(-h, h);
        let delta = p - closest;
        let len = delta.length();
        if len > f32::EPSILON {
            return (closest, delta / len, len);
        }
    }

    let gaps = h - p.abs();
    let mut axis = 1;
    let mut best = gaps.y;
    if gaps.z < best {
        axis = 2;
        best = gaps.z;
    }
    if gaps.x < best {
        axis = 0;
        best = gaps.x;
    }
    let sign = if p[axis] < 0.0 { -1.0 } else { 1.0 };
    let mut normal = Vec3::ZERO;
    normal[axis] = sign;
    let mut surface = p;
    surface[axis] = sign * h[axis];
    (surface, normal, -best.max(0.0))
}

/// World transform of the box's own frame (origin at the box center).
#[inline]
pub(crate) fn box_frame(b: &BoxCollider, t: &RigidTransform) -> RigidTransform {
    RigidTransform::new(t.rotation, t.transform_point(b.center))
}

/// The 12 edges of an origin-centered box, grouped by the axis they run along.
pub(crate) fn box_edges(h: Vec3) -> [(Vec3, Vec3); 12] {
    let mut edges = [(Vec3::ZERO, Vec3::ZERO); 12];
    for axis in 0..3 {
        let (j, k) = ((axis + 1) % 3, (axis + 2) % 3);
        for (n, (sj, sk)) in [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)].into_iter().enumerate() {
            let mut a = Vec3::ZERO;
            a[j] = sj * h[j];
            a[k] = sk * h[k];
            let mut b = a;
            a[axis] = -h[axis];
            b[axis] = h[axis];
            edges[axis * 4 + n] = (a, b);
        }
    }
    edges
}

/// The 8 corners of an origin-centered box.
pub(crate) fn box_corners(h: Vec3) -> [Vec3; 8] {
    let mut corners = [Vec3::ZERO; 8];
    for (i, c) in corners.iter_mut().enumerate() {
        let sign = Vec3::new(
            if i & 1 == 0 { -1.0 } else { 1.0 },
            if i & 2 == 0 { -1.0 } else { 1.0 },
            if i & 4 == 0 { -1.0 } else { 1.0 },
        );
        *c = sign * h;
    }
    corners
}

/// `1`, `-1`, or `0` when `x` is too small to pick a side.
#[inline]
pub(crate) fn support_sign(x: f32) -> f32 {
    const SIDE_EPSILON: f32 = 1e-6;
    if x > SIDE_EPSILON {
        1.0
    } else if x < -SIDE_EPSILON {
        -1.0
    } else {
        0.0
    }
}

pub(crate) fn point_box(p: Vec3, b: &BoxCollider, t: &RigidTransform) -> PointDistanceResult {
    let frame = box_frame(b, t);
    let (surface, normal, distance) = point_box_local(frame.inverse_transform_point(p), b.half_size);
    PointDistanceResult {
        hitpoint: frame.transform_point(surface),
        normal: frame.transform_direction(normal),
        distance,
    }
}

/// Sphere as A, box as B.
pub(crate) fn sphere_box(
    a: &SphereCollider,
    ta: &RigidTransform,
    b: &BoxCollider,
    tb: &RigidTransform,
) -> ColliderDistanceResult {
    let c = ta.transform_point(a.center);
    let p = point_box(c, b, tb);
    ColliderDistanceResult {
        hitpoint_a: c - p.normal * a.radius,
        hitpoint_b: p.hitpoint,
        normal_a: -p.normal,
        normal_b: p.normal,
        distance: p.distance - a.radius,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn test_point_outside_face() {
        let (s, n, d) = point_box_local(Vec3::new(3.0, 0.5, 0.0), Vec3::ONE);
        assert_eq!(s, Vec3::new(1.0, 0.5, 0.0));
        assert_eq!(n, Vec3::X);
        assert_eq!(d, 2.0);
    }

    #[test]
    fn test_point_outside_corner() {
        let (s, _, d) = point_box_local(Vec3::new(2.0, 2.0, 2.0), Vec3::ONE);
        assert_eq!(s, Vec3::ONE);
        assert!((d - 3f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_center_point_face_priority() {
        // All faces tie: y wins.
        let (s, n, d) = point_box_local(Vec3::ZERO, Vec3::ONE);
        assert_eq!(n, Vec3::Y);
        assert_eq!(s, Vec3::Y);
        assert_eq!(d, -1.0);
        // x and z tie, y is farther: z wins over x.
        let (_, n, _) = point_box_local(Vec3::ZERO, Vec3::new(1.0, 2.0, 1.0));
        assert_eq!(n, Vec3::Z);
        let (_, n, _) = point_box_local(Vec3::new(-0.5, 0.0, 0.0), Vec3::ONE);
        assert_eq!(n, -Vec3::X);
    }

    #[test]
    fn test_box_edges_run_along_their_axis() {
        let h = Vec3::new(1.0, 2.0, 3.0);
        for (i, (a, b)) in box_edges(h).into_iter().enumerate() {
            let d = b - a;
            assert_eq!(d.abs().max_element(), 2.0 * h[i / 4]);
            assert_eq!(d.length(), 2.0 * h[i / 4]);
            assert!(a.abs().cmpeq(h).bitmask().count_ones() == 3);
        }
        let corners = box_corners(h);
        assert!(corners.iter().all(|c| c.abs() == h));
        assert_eq!(corners[0], -h);
        assert_eq!(corners[7], h);
    }

    #[test]
    fn test_sphere_box_rotated() {
        let b = BoxCollider::new(Vec3::ZERO, Vec3::new(1.0, 2.0, 1.0));
        let tb = RigidTransform::new(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2), Vec3::ZERO);
        // After rotation the box's long axis lies along world x.
        let r = sphere_box(
            &SphereCollider::new(Vec3::ZERO, 0.5),
            &RigidTransform::from_translation(Vec3::new(3.0, 0.0, 0.0)),
            &b,
            &tb,
        );
        assert!((r.distance - 0.5).abs() < 1e-5);
        assert!((r.normal_a + Vec3::X).length() < 1e-5);
        assert!((r.hitpoint_b - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-5);
    }
}
