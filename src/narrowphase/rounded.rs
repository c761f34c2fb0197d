//! Sphere and capsule pairs: closest points between cores, minus radii.

use glam::Vec3;

use super::segment::{closest_point_on_segment, closest_points_segment_segment};
use crate::types::*;

/// Result between two rounded cores `core_a`, `core_b` of radii `ra`, `rb`.
/// `fallback` is used as A's normal when the cores coincide.
pub(crate) fn rounded_pair(core_a: Vec3, ra: f32, core_b: Vec3, rb: f32, fallback: Vec3) -> ColliderDistanceResult {
    let delta = core_b - core_a;
    let len = delta.length();
    let n = if len > f32::EPSILON { delta / len } else { fallback };
    ColliderDistanceResult {
        hitpoint_a: core_a + n * ra,
        hitpoint_b: core_b - n * rb,
        normal_a: n,
        normal_b: -n,
        distance: len - ra - rb,
    }
}

/// Some unit vector perpendicular to `d`, or `+X` if `d` is degenerate.
pub(crate) fn any_perpendicular(d: Vec3) -> Vec3 {
    d.try_normalize().map(|u| u.any_orthonormal_vector()).unwrap_or(Vec3::X)
}

pub(crate) fn sphere_sphere(
    a: &SphereCollider,
    ta: &RigidTransform,
    b: &SphereCollider,
    tb: &RigidTransform,
) -> ColliderDistanceResult {
    let ca = ta.transform_point(a.center);
    let cb = tb.transform_point(b.center);
    rounded_pair(ca, a.radius, cb, b.radius, Vec3::X)
}

pub(crate) fn sphere_capsule(
    a: &SphereCollider,
    ta: &RigidTransform,
    b: &CapsuleCollider,
    tb: &RigidTransform,
) -> ColliderDistanceResult {
    let ca = ta.transform_point(a.center);
    let p0 = tb.transform_point(b.point_a);
    let p1 = tb.transform_point(b.point_b);
    let (q, _) = closest_point_on_segment(ca, p0, p1);
    rounded_pair(ca, a.radius, q, b.radius, any_perpendicular(p1 - p0))
}

pub(crate) fn capsule_capsule(
    a: &CapsuleCollider,
    ta: &RigidTransform,
    b: &CapsuleCollider,
    tb: &RigidTransform,
) -> ColliderDistanceResult {
    let a0 = ta.transform_point(a.point_a);
    let a1 = ta.transform_point(a.point_b);
    let b0 = tb.transform_point(b.point_a);
    let b1 = tb.transform_point(b.point_b);
    let (ca, cb) = closest_points_segment_segment(a0, a1, b0, b1);
    let fallback = (a1 - a0)
        .cross(b1 - b0)
        .try_normalize()
        .unwrap_or_else(|| any_perpendicular(a1 - a0));
    rounded_pair(ca, a.radius, cb, b.radius, fallback)
}

pub(crate) fn point_sphere(p: Vec3, s: &SphereCollider, t: &RigidTransform) -> PointDistanceResult {
    let c = t.transform_point(s.center);
    point_rounded(p, c, s.radius, Vec3::X)
}

pub(crate) fn point_capsule(p: Vec3, c: &CapsuleCollider, t: &RigidTransform) -> PointDistanceResult {
    let p0 = t.transform_point(c.point_a);
    let p1 = t.transform_point(c.point_b);
    let (q, _) = closest_point_on_segment(p, p0, p1);
    point_rounded(p, q, c.radius, any_perpendicular(p1 - p0))
}

/// Normal points out of the shape, towards `p` when outside.
fn point_rounded(p: Vec3, core: Vec3, radius: f32, fallback: Vec3) -> PointDistanceResult {
    let delta = p - core;
    let len = delta.length();
    let n = if len > f32::EPSILON { delta / len } else { fallback };
    PointDistanceResult { hitpoint: core + n * radius, normal: n, distance: len - radius }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_sphere_gap() {
        let r = sphere_sphere(
            &SphereCollider::new(Vec3::ZERO, 1.0),
            &RigidTransform::IDENTITY,
            &SphereCollider::new(Vec3::ZERO, 0.5),
            &RigidTransform::from_translation(Vec3::new(0.0, 4.0, 0.0)),
        );
        assert!((r.distance - 2.5).abs() < 1e-6);
        assert!((r.normal_a - Vec3::Y).length() < 1e-6);
        assert!((r.hitpoint_a - Vec3::Y).length() < 1e-6);
        assert!((r.hitpoint_b - Vec3::new(0.0, 3.5, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_coincident_spheres_have_finite_normal() {
        let s = SphereCollider::new(Vec3::ZERO, 1.0);
        let r = sphere_sphere(&s, &RigidTransform::IDENTITY, &s, &RigidTransform::IDENTITY);
        assert_eq!(r.distance, -2.0);
        assert!(r.normal_a.is_finite());
        assert!((r.normal_a.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sphere_on_capsule_axis() {
        let cap = CapsuleCollider::new(Vec3::new(-2.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), 0.5);
        let r = sphere_capsule(
            &SphereCollider::new(Vec3::ZERO, 0.25),
            &RigidTransform::from_translation(Vec3::new(1.0, 0.0, 0.0)),
            &cap,
            &RigidTransform::IDENTITY,
        );
        assert!((r.distance + 0.75).abs() < 1e-6);
        assert!(r.normal_a.is_finite());
        assert!(r.normal_a.dot(Vec3::X).abs() < 1e-6);
    }

    #[test]
    fn test_crossed_capsules_fallback_normal() {
        let a = CapsuleCollider::new(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), 0.1);
        let b = CapsuleCollider::new(Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0), 0.1);
        let r = capsule_capsule(&a, &RigidTransform::IDENTITY, &b, &RigidTransform::IDENTITY);
        assert!((r.distance + 0.2).abs() < 1e-6);
        assert!((r.normal_a.abs() - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn test_point_capsule_inside() {
        let cap = CapsuleCollider::new(Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0), 1.0);
        let r = point_capsule(Vec3::new(0.5, 1.0, 0.0), &cap, &RigidTransform::IDENTITY);
        assert!((r.distance + 0.5).abs() < 1e-6);
        assert!((r.normal - Vec3::X).length() < 1e-6);
        assert!((r.hitpoint - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6);
    }
}
