//! Oriented box against oriented box.
//!
//! Everything runs in A's frame. Overlapping boxes take the shallowest of the
//! 15 separating axis candidates; separated boxes take the exact minimum over
//! corner-vs-box (both ways) and edge-vs-edge features.

use glam::{Mat3, Vec3};

use super::box_capsule::{FACE_ORDER, PARALLEL_EPSILON};
use super::box_point::{box_corners, box_edges, box_frame, support_sign};
use super::segment::closest_points_segment_segment;
use crate::types::*;

#[derive(Copy, Clone, Debug)]
enum Axis {
    FaceA,
    FaceB,
    /// Cross of A's axis `i` and B's axis `j`.
    Edge(usize, usize),
}

/// B described in A's frame.
pub(crate) struct LocalBox {
    center: Vec3,
    axes: Mat3,
    half_size: Vec3,
}

impl LocalBox {
    fn radius_along(&self, n: Vec3) -> f32 {
        self.half_size.x * self.axes.x_axis.dot(n).abs()
            + self.half_size.y * self.axes.y_axis.dot(n).abs()
            + self.half_size.z * self.axes.z_axis.dot(n).abs()
    }

    fn point(&self, local: Vec3) -> Vec3 {
        self.center + self.axes * local
    }

    /// Feature of B reaching furthest along `dir`, collapsed to its center
    /// along axes perpendicular to `dir`.
    fn support(&self, dir: Vec3) -> Vec3 {
        let s = Vec3::new(
            support_sign(self.axes.x_axis.dot(dir)),
            support_sign(self.axes.y_axis.dot(dir)),
            support_sign(self.axes.z_axis.dot(dir)),
        );
        self.point(s * self.half_size)
    }
}

/// Core query with both boxes in A's frame. A is centered at the origin.
pub(crate) fn box_box_local(ha: Vec3, b: &LocalBox) -> ColliderDistanceResult {
    let mut best_axis = Axis::FaceA;
    let mut best_normal = Vec3::AXES[FACE_ORDER[0]];
    let mut best_separation = f32::NEG_INFINITY;
    let mut consider = |n: Vec3, axis: Axis| {
        let offset = b.center.dot(n);
        let separation = offset.abs() - n.abs().dot(ha) - b.radius_along(n);
        if separation > best_separation {
            best_separation = separation;
            best_normal = if offset >= 0.0 { n } else { -n };
            best_axis = axis;
        }
    };
    for i in FACE_ORDER {
        consider(Vec3::AXES[i], Axis::FaceA);
    }
    for j in FACE_ORDER {
        consider(b.axes.col(j), Axis::FaceB);
    }
    for i in 0..3 {
        for j in 0..3 {
            let c = Vec3::AXES[i].cross(b.axes.col(j));
            if c.length_squared() >= PARALLEL_EPSILON {
                consider(c.normalize(), Axis::Edge(i, j));
            }
        }
    }

    if best_separation > 0.0 {
        return separated(ha, b, best_normal);
    }

    let n = best_normal;
    let s = best_separation;
    let (on_a, on_b) = match best_axis {
        Axis::FaceA => {
            let deepest_b = b.support(-n);
            (deepest_b - n * s, deepest_b)
        }
        Axis::FaceB => {
            let sign = Vec3::new(support_sign(n.x), support_sign(n.y), support_sign(n.z));
            let deepest_a = sign * ha;
            (deepest_a, deepest_a + n * s)
        }
        Axis::Edge(i, j) => {
            let mut a0 = Vec3::new(support_sign(n.x), support_sign(n.y), support_sign(n.z)) * ha;
            let mut a1 = a0;
            a0[i] = -ha[i];
            a1[i] = ha[i];
            let mut local = Vec3::new(
                -support_sign(b.axes.x_axis.dot(n)),
                -support_sign(b.axes.y_axis.dot(n)),
                -support_sign(b.axes.z_axis.dot(n)),
            ) * b.half_size;
            local[j] = -b.half_size[j];
            let b0 = b.point(local);
            local[j] = b.half_size[j];
            let b1 = b.point(local);
            closest_points_segment_segment(a0, a1, b0, b1)
        }
    };
    ColliderDistanceResult { hitpoint_a: on_a, hitpoint_b: on_b, normal_a: n, normal_b: -n, distance: s }
}

fn separated(ha: Vec3, b: &LocalBox, fallback: Vec3) -> ColliderDistanceResult {
    let mut best_sq = f32::INFINITY;
    let mut on_a = Vec3::ZERO;
    let mut on_b = b.center;
    let mut keep = |pa: Vec3, pb: Vec3| {
        let dsq = (pb - pa).length_squared();
        if dsq < best_sq {
            best_sq = dsq;
            on_a = pa;
            on_b = pb;
        }
    };

    for corner in box_corners(b.half_size) {
        let p = b.point(corner);
        keep(p.clamp(-ha, ha), p);
    }
    let to_b = b.axes.transpose();
    for corner in box_corners(ha) {
        let in_b = to_b * (corner - b.center);
        keep(corner, b.point(in_b.clamp(-b.half_size, b.half_size)));
    }
    let b_edges = box_edges(b.half_size).map(|(e0, e1)| (b.point(e0), b.point(e1)));
    for (a0, a1) in box_edges(ha) {
        for &(b0, b1) in &b_edges {
            let (pa, pb) = closest_points_segment_segment(a0, a1, b0, b1);
            keep(pa, pb);
        }
    }

    let distance = best_sq.sqrt();
    let n = if distance > f32::EPSILON { (on_b - on_a) / distance } else { fallback };
    ColliderDistanceResult { hitpoint_a: on_a, hitpoint_b: on_b, normal_a: n, normal_b: -n, distance }
}

pub(crate) fn box_box(
    a: &BoxCollider,
    ta: &RigidTransform,
    b: &BoxCollider,
    tb: &RigidTransform,
) -> ColliderDistanceResult {
    let frame_a = box_frame(a, ta);
    let rel = frame_a.relative_to(&box_frame(b, tb));
    let local = LocalBox { center: rel.position, axes: Mat3::from_quat(rel.rotation), half_size: b.half_size };
    box_box_local(a.half_size, &local).transformed(&frame_a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use std::f32::consts::FRAC_PI_4;

    fn unit() -> BoxCollider {
        BoxCollider::new(Vec3::ZERO, Vec3::ONE)
    }

    fn at(x: f32, y: f32, z: f32) -> RigidTransform {
        RigidTransform::from_translation(Vec3::new(x, y, z))
    }

    #[test]
    fn test_separated_along_x() {
        let r = box_box(&unit(), &at(0.0, 0.0, 0.0), &unit(), &at(3.0, 0.0, 0.0));
        assert_eq!(r.distance, 1.0);
        assert_eq!(r.normal_a, Vec3::X);
        assert_eq!(r.normal_b, -Vec3::X);
        assert_eq!(r.hitpoint_a.x, 1.0);
        assert_eq!(r.hitpoint_b.x, 2.0);
    }

    #[test]
    fn test_overlap_half_unit() {
        let r = box_box(&unit(), &at(0.0, 0.0, 0.0), &unit(), &at(0.5, 0.0, 0.0));
        assert_eq!(r.distance, -1.5);
        assert_eq!(r.normal_a, Vec3::X);
        assert!((r.hitpoint_b - r.hitpoint_a - r.normal_a * r.distance).length() < 1e-6);
    }

    #[test]
    fn test_corner_to_corner_gap() {
        let r = box_box(&unit(), &at(0.0, 0.0, 0.0), &unit(), &at(3.0, 3.0, 3.0));
        assert!((r.distance - 3f32.sqrt()).abs() < 1e-6);
        assert!((r.normal_a - Vec3::ONE.normalize()).length() < 1e-6);
    }

    #[test]
    fn test_rotated_box_corner_to_face() {
        // B turned 45 degrees about z presents an edge towards A's +x face.
        let tb = RigidTransform::new(Quat::from_rotation_z(FRAC_PI_4), Vec3::new(4.0, 0.0, 0.0));
        let r = box_box(&unit(), &RigidTransform::IDENTITY, &unit(), &tb);
        assert!((r.distance - (3.0 - 2f32.sqrt())).abs() < 1e-5);
        assert!((r.normal_a - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_crossed_edges() {
        // A's top edge along x faces B's bottom edge along z.
        let ta = RigidTransform::new(Quat::from_rotation_x(FRAC_PI_4), Vec3::ZERO);
        let tb = RigidTransform::new(Quat::from_rotation_z(FRAC_PI_4), Vec3::new(0.0, 4.0, 0.0));
        let r = box_box(&unit(), &ta, &unit(), &tb);
        assert!((r.distance - (4.0 - 2.0 * 2f32.sqrt())).abs() < 1e-5);
        assert!((r.normal_a - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_crossed_edges_penetrating() {
        let ta = RigidTransform::new(Quat::from_rotation_x(FRAC_PI_4), Vec3::ZERO);
        let tb = RigidTransform::new(Quat::from_rotation_z(FRAC_PI_4), Vec3::new(0.0, 2.6, 0.0));
        let r = box_box(&unit(), &ta, &unit(), &tb);
        assert!((r.distance - (2.6 - 2.0 * 2f32.sqrt())).abs() < 1e-5);
        assert!((r.normal_a - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_penetrating_across_a_face_of_b() {
        // A's corner pokes into B's -x face, so B's face gives the shallowest axis.
        let ta = RigidTransform::new(Quat::from_rotation_z(FRAC_PI_4), Vec3::ZERO);
        let r = box_box(&unit(), &ta, &unit(), &at(2.2, 0.0, 0.0));
        assert!((r.distance - (1.2 - 2f32.sqrt())).abs() < 1e-5);
        assert!((r.normal_a - Vec3::X).length() < 1e-5);
        assert!((r.hitpoint_a - Vec3::new(2f32.sqrt(), 0.0, 0.0)).length() < 1e-5);
        assert!((r.hitpoint_b.x - 1.2).abs() < 1e-5);
    }

    #[test]
    fn test_concentric_boxes_pick_a_face() {
        let small = BoxCollider::new(Vec3::ZERO, Vec3::splat(0.5));
        let r = box_box(&unit(), &RigidTransform::IDENTITY, &small, &RigidTransform::IDENTITY);
        assert_eq!(r.distance, -1.5);
        assert_eq!(r.normal_a, Vec3::Y);
    }
}
