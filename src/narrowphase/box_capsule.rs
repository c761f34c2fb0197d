//! Box against capsule.
//!
//! The work happens in the box's frame against the capsule's core segment;
//! the radius is subtracted at the end. Overlapping cores are resolved by a
//! separating axis search over the box faces and the three box-edge crosses,
//! separated cores by the exact minimum over endpoint and edge features.

use glam::Vec3;

use super::box_point::{box_edges, box_frame, support_sign};
use super::segment::closest_points_segment_segment;
use crate::types::*;

/// Face axes in tie-break order.
pub(crate) const FACE_ORDER: [usize; 3] = [1, 2, 0];

/// Crosses whose squared length falls below this (relative to the inputs)
/// come from near-parallel directions and cannot be the separating axis.
pub(crate) const PARALLEL_EPSILON: f32 = 1e-6;

#[derive(Copy, Clone, Debug)]
enum Axis {
    Face(usize),
    Edge(usize),
}

/// Core result for an origin-centered box of half size `h` against the
/// segment `p0..p1`, all in box space. `hitpoint_b` lies on the segment.
pub(crate) fn box_segment_local(h: Vec3, p0: Vec3, p1: Vec3) -> ColliderDistanceResult {
    let d = p1 - p0;
    let d_len_sq = d.length_squared();

    let mut best_axis = Axis::Face(FACE_ORDER[0]);
    let mut best_normal = Vec3::AXES[FACE_ORDER[0]];
    let mut best_separation = f32::NEG_INFINITY;
    let mut consider = |n: Vec3, axis: Axis| {
        let box_r = n.abs().dot(h);
        let (a, b) = (p0.dot(n), p1.dot(n));
        let above = a.min(b) - box_r;
        let below = -box_r - a.max(b);
        let (separation, normal) = if above >= below { (above, n) } else { (below, -n) };
        if separation > best_separation {
            best_separation = separation;
            best_normal = normal;
            best_axis = axis;
        }
    };
    for i in FACE_ORDER {
        consider(Vec3::AXES[i], Axis::Face(i));
    }
    if d_len_sq > f32::EPSILON {
        for i in 0..3 {
            let c = Vec3::AXES[i].cross(d);
            if c.length_squared() >= PARALLEL_EPSILON * d_len_sq {
                consider(c.normalize(), Axis::Edge(i));
            }
        }
    }

    if best_separation > 0.0 {
        return separated(h, p0, p1, best_normal);
    }

    let n = best_normal;
    let (on_box, on_segment) = match best_axis {
        Axis::Face(i) => {
            let (a, b) = (p0.dot(n), p1.dot(n));
            let deepest = if (a - b).abs() <= f32::EPSILON * (a.abs() + b.abs()).max(1.0) {
                clipped_midpoint(h, p0, p1, i)
            } else if a < b {
                p0
            } else {
                p1
            };
            (deepest - n * best_separation, deepest)
        }
        Axis::Edge(i) => {
            let mut e0 = Vec3::new(support_sign(n.x), support_sign(n.y), support_sign(n.z)) * h;
            let mut e1 = e0;
            e0[i] = -h[i];
            e1[i] = h[i];
            closest_points_segment_segment(e0, e1, p0, p1)
        }
    };
    ColliderDistanceResult {
        hitpoint_a: on_box,
        hitpoint_b: on_segment,
        normal_a: n,
        normal_b: -n,
        distance: best_separation,
    }
}

/// Exact closest features when the segment is known to be outside the box.
fn separated(h: Vec3, p0: Vec3, p1: Vec3, fallback: Vec3) -> ColliderDistanceResult {
    let mut best_sq = f32::INFINITY;
    let mut on_box = Vec3::ZERO;
    let mut on_segment = p0;
    for p in [p0, p1] {
        let c = p.clamp(-h, h);
        let dsq = (p - c).length_squared();
        if dsq < best_sq {
            best_sq = dsq;
            on_box = c;
            on_segment = p;
        }
    }
    for (e0, e1) in box_edges(h) {
        let (a, b) = closest_points_segment_segment(e0, e1, p0, p1);
        let dsq = (b - a).length_squared();
        if dsq < best_sq {
            best_sq = dsq;
            on_box = a;
            on_segment = b;
        }
    }
    let distance = best_sq.sqrt();
    let n = if distance > f32::EPSILON { (on_segment - on_box) / distance } else { fallback };
    ColliderDistanceResult { hitpoint_a: on_box, hitpoint_b: on_segment, normal_a: n, normal_b: -n, distance }
}

/// Midpoint of the part of `p0..p1` inside the box slabs other than `skip`.
fn clipped_midpoint(h: Vec3, p0: Vec3, p1: Vec3, skip: usize) -> Vec3 {
    let d = p1 - p0;
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for j in 0..3 {
        if j == skip || d[j].abs() <= f32::EPSILON {
            continue;
        }
        let ta = (-h[j] - p0[j]) / d[j];
        let tb = (h[j] - p0[j]) / d[j];
        t0 = t0.max(ta.min(tb));
        t1 = t1.min(ta.max(tb));
    }
    if t0 > t1 { (p0 + p1) * 0.5 } else { p0 + d * ((t0 + t1) * 0.5) }
}

/// Box as A, capsule as B.
pub(crate) fn box_capsule(
    a: &BoxCollider,
    ta: &RigidTransform,
    b: &CapsuleCollider,
    tb: &RigidTransform,
) -> ColliderDistanceResult {
    let frame = box_frame(a, ta);
    let p0 = frame.inverse_transform_point(tb.transform_point(b.point_a));
    let p1 = frame.inverse_transform_point(tb.transform_point(b.point_b));
    let mut core = box_segment_local(a.half_size, p0, p1);
    core.hitpoint_b -= core.normal_a * b.radius;
    core.distance -= b.radius;
    core.transformed(&frame)
}
