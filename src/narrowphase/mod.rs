//! Signed distance queries between collider pairs.
//!
//! Every pair type has one core routine. Reversed pairs call it with the
//! operands exchanged and swap the result, and same-type pairs always run in
//! a fixed operand order, so `distance_between(a, b)` mirrors
//! `distance_between(b, a)` exactly.

mod box_box;
mod box_capsule;
mod box_point;
mod rounded;
pub mod segment;

use std::cmp::Ordering;

use glam::Vec3;

use crate::types::*;

/// Signed distance between two colliders.
///
/// Negative distances are penetration depths. `normal_a` points from A
/// towards B and `hitpoint_b - hitpoint_a` is `normal_a * distance` up to
/// rounding. The flag is `distance <= max_distance`. Compound colliders are
/// not resolved here and always report `(false, distance = inf)`.
pub fn distance_between(
    a: &Collider,
    ta: &RigidTransform,
    b: &Collider,
    tb: &RigidTransform,
    max_distance: f32,
) -> (bool, ColliderDistanceResult) {
    use Collider::*;
    let result = match (a, b) {
        (Compound(_), _) | (_, Compound(_)) => return (false, ColliderDistanceResult::default()),
        (Sphere(sa), Sphere(sb)) => ordered(sa, ta, sb, tb, rounded::sphere_sphere),
        (Sphere(s), Capsule(c)) => rounded::sphere_capsule(s, ta, c, tb),
        (Capsule(c), Sphere(s)) => rounded::sphere_capsule(s, tb, c, ta).swapped(),
        (Sphere(s), Box(bx)) => box_point::sphere_box(s, ta, bx, tb),
        (Box(bx), Sphere(s)) => box_point::sphere_box(s, tb, bx, ta).swapped(),
        (Capsule(ca), Capsule(cb)) => ordered(ca, ta, cb, tb, rounded::capsule_capsule),
        (Box(bx), Capsule(c)) => box_capsule::box_capsule(bx, ta, c, tb),
        (Capsule(c), Box(bx)) => box_capsule::box_capsule(bx, tb, c, ta).swapped(),
        (Box(ba), Box(bb)) => ordered(ba, ta, bb, tb, box_box::box_box),
    };
    (result.distance <= max_distance, result)
}

/// Signed distance from a world-space point to a collider's surface.
pub fn distance_between_point(
    point: Vec3,
    collider: &Collider,
    transform: &RigidTransform,
    max_distance: f32,
) -> (bool, PointDistanceResult) {
    let result = match collider {
        Collider::Sphere(s) => rounded::point_sphere(point, s, transform),
        Collider::Capsule(c) => rounded::point_capsule(point, c, transform),
        Collider::Box(b) => box_point::point_box(point, b, transform),
        Collider::Compound(_) => return (false, PointDistanceResult::default()),
    };
    (result.distance <= max_distance, result)
}

type PairFn<S> = fn(&S, &RigidTransform, &S, &RigidTransform) -> ColliderDistanceResult;

/// Shape parameters as a flat key for picking a canonical operand order.
trait ShapeKey {
    fn shape_key(&self) -> [f32; 7];
}

impl ShapeKey for SphereCollider {
    fn shape_key(&self) -> [f32; 7] {
        [self.center.x, self.center.y, self.center.z, self.radius, 0.0, 0.0, 0.0]
    }
}

impl ShapeKey for CapsuleCollider {
    fn shape_key(&self) -> [f32; 7] {
        let (a, b) = (self.point_a, self.point_b);
        [a.x, a.y, a.z, b.x, b.y, b.z, self.radius]
    }
}

impl ShapeKey for BoxCollider {
    fn shape_key(&self) -> [f32; 7] {
        let (c, h) = (self.center, self.half_size);
        [c.x, c.y, c.z, h.x, h.y, h.z, 0.0]
    }
}

fn order_key<S: ShapeKey>(s: &S, t: &RigidTransform) -> impl Iterator<Item = u32> {
    s.shape_key()
        .into_iter()
        .chain(t.rotation.to_array())
        .chain(t.position.to_array())
        .map(f32::to_bits)
}

fn ordered<S: ShapeKey>(a: &S, ta: &RigidTransform, b: &S, tb: &RigidTransform, f: PairFn<S>) -> ColliderDistanceResult {
    if order_key(a, ta).cmp(order_key(b, tb)) == Ordering::Greater {
        f(b, tb, a, ta).swapped()
    } else {
        f(a, ta, b, tb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn unit_box() -> Collider {
        BoxCollider::new(Vec3::ZERO, Vec3::ONE).into()
    }

    fn at(x: f32, y: f32, z: f32) -> RigidTransform {
        RigidTransform::from_translation(Vec3::new(x, y, z))
    }

    fn assert_mirrored(r: &ColliderDistanceResult, s: &ColliderDistanceResult) {
        assert_eq!(r.distance, s.distance);
        assert_eq!(r.hitpoint_a, s.hitpoint_b);
        assert_eq!(r.hitpoint_b, s.hitpoint_a);
        assert_eq!(r.normal_a, s.normal_b);
        assert_eq!(r.normal_b, s.normal_a);
    }

    #[test]
    fn test_unit_boxes_three_apart() {
        let (hit, r) = distance_between(&unit_box(), &at(0.0, 0.0, 0.0), &unit_box(), &at(3.0, 0.0, 0.0), 0.0);
        assert!(!hit);
        assert_eq!(r.distance, 1.0);
        assert_eq!(r.normal_a, Vec3::X);
        assert_eq!(r.normal_b, -Vec3::X);
        let (hit, _) = distance_between(&unit_box(), &at(0.0, 0.0, 0.0), &unit_box(), &at(3.0, 0.0, 0.0), 1.0);
        assert!(hit);
    }

    #[test]
    fn test_unit_boxes_half_apart() {
        let (hit, r) = distance_between(&unit_box(), &at(0.0, 0.0, 0.0), &unit_box(), &at(0.5, 0.0, 0.0), 0.0);
        assert!(hit);
        assert_eq!(r.distance, -1.5);
    }

    #[test]
    fn test_enclosed_capsule() {
        let big: Collider = BoxCollider::new(Vec3::ZERO, Vec3::splat(2.0)).into();
        let cap: Collider = CapsuleCollider::new(Vec3::new(-0.5, 0.0, 0.0), Vec3::new(0.5, 0.0, 0.0), 0.25).into();
        let (hit, r) = distance_between(&cap, &RigidTransform::IDENTITY, &big, &RigidTransform::IDENTITY, 0.0);
        assert!(hit);
        assert!((r.distance + 2.25).abs() < 1e-6);
        // Capsule is A here: its normal points out of the box's nearest face.
        assert_eq!(r.normal_b, Vec3::Y);
    }

    #[test]
    fn test_every_pair_type_is_symmetric() {
        let shapes: Vec<(Collider, RigidTransform)> = vec![
            (SphereCollider::new(Vec3::ZERO, 0.5).into(), at(0.2, 0.1, 0.0)),
            (SphereCollider::new(Vec3::ZERO, 0.7).into(), at(1.0, 0.3, -0.2)),
            (
                CapsuleCollider::new(Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0), 0.3).into(),
                RigidTransform::new(Quat::from_rotation_x(0.4), Vec3::new(-0.6, 0.0, 0.5)),
            ),
            (
                CapsuleCollider::new(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), 0.2).into(),
                at(0.0, 1.2, 0.1),
            ),
            (
                BoxCollider::new(Vec3::ZERO, Vec3::new(0.5, 0.8, 0.3)).into(),
                RigidTransform::new(Quat::from_rotation_y(0.9), Vec3::new(0.4, -0.5, 0.2)),
            ),
            (BoxCollider::new(Vec3::new(0.1, 0.0, 0.0), Vec3::ONE).into(), at(2.1, 0.0, -0.4)),
        ];
        for (i, (a, ta)) in shapes.iter().enumerate() {
            for (b, tb) in shapes.iter().skip(i + 1) {
                let (_, r) = distance_between(a, ta, b, tb, 0.0);
                let (_, s) = distance_between(b, tb, a, ta, 0.0);
                assert_mirrored(&r, &s);
                assert!(r.distance.is_finite());
            }
        }
    }

    #[test]
    fn test_compound_is_broadphase_only() {
        let compound: Collider = CompoundCollider::new(vec![CompoundChild {
            collider: unit_box(),
            transform: RigidTransform::IDENTITY,
        }])
        .into();
        let (hit, r) = distance_between(&compound, &RigidTransform::IDENTITY, &unit_box(), &RigidTransform::IDENTITY, 10.0);
        assert!(!hit);
        assert_eq!(r.distance, f32::INFINITY);
        let (hit, _) = distance_between_point(Vec3::ZERO, &compound, &RigidTransform::IDENTITY, 10.0);
        assert!(!hit);
    }

    #[test]
    fn test_point_queries() {
        let (hit, r) = distance_between_point(Vec3::new(3.0, 0.0, 0.0), &unit_box(), &RigidTransform::IDENTITY, 1.0);
        assert!(!hit);
        assert_eq!(r.distance, 2.0);
        assert_eq!(r.normal, Vec3::X);
        let sphere: Collider = SphereCollider::new(Vec3::ZERO, 1.0).into();
        let (hit, r) = distance_between_point(Vec3::new(0.0, 0.5, 0.0), &sphere, &RigidTransform::IDENTITY, 0.0);
        assert!(hit);
        assert!((r.distance + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_sphere_matches_point_query_shrunk_by_radius() {
        let sphere: Collider = SphereCollider::new(Vec3::ZERO, 0.25).into();
        let boxc: Collider = BoxCollider::new(Vec3::ZERO, Vec3::new(1.0, 2.0, 0.5)).into();
        let tb = RigidTransform::new(Quat::from_rotation_z(0.3), Vec3::new(0.5, 0.0, 0.0));
        let p = Vec3::new(2.0, 1.0, 0.2);
        let (_, r) = distance_between(&sphere, &RigidTransform::from_translation(p), &boxc, &tb, 0.0);
        let (_, q) = distance_between_point(p, &boxc, &tb, 0.0);
        assert!((r.distance - (q.distance - 0.25)).abs() < 1e-6);
        assert!((r.hitpoint_b - q.hitpoint).length() < 1e-6);
    }
}
