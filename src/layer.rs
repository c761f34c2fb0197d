//! Bucketed spatial index over one step's collider bodies.
//!
//! Bodies are partitioned into the cells of a fixed grid over the world AABB by
//! the cell holding their AABB center. A body stays in that cell only while its
//! AABB reaches no more than half a cell past the cell on any side; NaN bounds,
//! bounds leaving the world, and larger bodies go to the trailing overflow
//! bucket. Within a bucket the per-body arrays are
//! sorted by `xmin` and indexed by an interval tree over the x intervals.

use std::ops::Range;

use glam::{IVec3, UVec3, Vec3, Vec4};
use log::{debug, warn};
use rayon::prelude::*;

use crate::error::Result;
use crate::types::*;

/// Node of a bucket's implicit interval tree.
///
/// Nodes are stored breadth first (children of `k` at `2k+1` and `2k+2`); an
/// in-order walk visits bodies in ascending `xmin`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct IntervalTreeNode {
    pub xmin: f32,
    pub xmax: f32,
    /// Largest `xmax` in this node's subtree.
    pub subtree_xmax: f32,
    /// Index of the body within its bucket's sorted arrays.
    pub bucket_relative_index: u32,
}

/// Immutable spatial index. Build once per step, share read-only.
#[derive(Clone, Debug)]
pub struct CollisionLayer {
    settings: CollisionLayerSettings,
    cell_stride: Vec3,
    bucket_ranges: Vec<Range<usize>>,
    xmins: Vec<f32>,
    xmaxs: Vec<f32>,
    yz_min_max: Vec<Vec4>,
    interval_trees: Vec<IntervalTreeNode>,
    bodies: Vec<ColliderBody>,
    aabbs: Vec<Aabb>,
    source_indices: Vec<u32>,
    body_index_of_source: Vec<u32>,
}

/// Read-only view of one bucket's slice of the layer arrays.
#[derive(Copy, Clone, Debug)]
pub struct BucketSlices<'a> {
    /// Index of this bucket; the last one is the overflow bucket.
    pub bucket_index: usize,
    /// Offset of this bucket's first body in the layer-wide arrays.
    pub global_start: usize,
    /// AABB x minimums, sorted ascending.
    pub xmins: &'a [f32],
    pub xmaxs: &'a [f32],
    /// Packed as `(ymin, zmin, -ymax, -zmax)`.
    pub yz_min_max: &'a [Vec4],
    /// Implicit interval tree over `[xmin, xmax]`, laid out in sort order.
    pub interval_tree: &'a [IntervalTreeNode],
    pub bodies: &'a [ColliderBody],
    pub aabbs: &'a [Aabb],
    /// Index into the `bodies` slice the layer was built from.
    pub source_indices: &'a [u32],
}

/// Packs y/z bounds as `(ymin, zmin, -ymax, -zmax)`.
#[inline]
pub(crate) fn pack_yz(aabb: &Aabb) -> Vec4 {
    Vec4::new(aabb.min.y, aabb.min.z, -aabb.max.y, -aabb.max.z)
}

/// Inclusive y/z overlap of two packed bounds in one four-lane compare.
#[inline]
pub(crate) fn yz_overlaps(a: Vec4, b: Vec4) -> bool {
    use glam::Vec4Swizzles;
    a.cmple(-b.zwxy()).all()
}

#[inline]
fn sort_key(xmin: f32) -> f32 {
    if xmin.is_nan() { f32::INFINITY } else { xmin }
}

impl CollisionLayer {
    /// Builds the layer on the calling thread.
    pub fn build(bodies: &[ColliderBody], settings: CollisionLayerSettings) -> Result<Self> {
        Self::build_internal(bodies, settings, false)
    }

    /// Builds the layer with one rayon task per bucket for sorting and indexing.
    pub fn build_parallel(bodies: &[ColliderBody], settings: CollisionLayerSettings) -> Result<Self> {
        Self::build_internal(bodies, settings, true)
    }

    fn build_internal(bodies: &[ColliderBody], settings: CollisionLayerSettings, parallel: bool) -> Result<Self> {
        settings.validate()?;
        let cell_count = settings.cell_count();
        let bucket_count = cell_count + 1;
        let cell_stride = settings.cell_stride();

        let aabbs: Vec<Aabb> = if parallel {
            bodies.par_iter().map(ColliderBody::aabb).collect()
        } else {
            bodies.iter().map(ColliderBody::aabb).collect()
        };
        let buckets: Vec<u32> = aabbs
            .iter()
            .map(|aabb| classify(aabb, &settings, cell_stride) as u32)
            .collect();

        // Counting sort into contiguous bucket ranges.
        let mut counts = vec![0usize; bucket_count];
        for &b in &buckets {
            counts[b as usize] += 1;
        }
        let mut bucket_ranges = Vec::with_capacity(bucket_count);
        let mut start = 0usize;
        for &count in &counts {
            bucket_ranges.push(start..start + count);
            start += count;
        }
        let mut cursor: Vec<usize> = bucket_ranges.iter().map(|r| r.start).collect();
        let mut order = vec![0u32; bodies.len()];
        for (src, &b) in buckets.iter().enumerate() {
            let slot = &mut cursor[b as usize];
            order[*slot] = src as u32;
            *slot += 1;
        }

        let sort_bucket = |slice: &mut [u32]| {
            slice.sort_by(|&a, &b| {
                sort_key(aabbs[a as usize].min.x)
                    .total_cmp(&sort_key(aabbs[b as usize].min.x))
            });
        };
        {
            let slices = split_by_ranges_mut(&mut order, &bucket_ranges);
            if parallel {
                slices.into_par_iter().for_each(sort_bucket);
            } else {
                slices.into_iter().for_each(sort_bucket);
            }
        }

        let xmins: Vec<f32> = order.iter().map(|&s| aabbs[s as usize].min.x).collect();
        let xmaxs: Vec<f32> = order.iter().map(|&s| aabbs[s as usize].max.x).collect();
        let yz_min_max: Vec<Vec4> = order.iter().map(|&s| pack_yz(&aabbs[s as usize])).collect();
        let sorted_aabbs: Vec<Aabb> = order.iter().map(|&s| aabbs[s as usize]).collect();
        let sorted_bodies: Vec<ColliderBody> = order.iter().map(|&s| bodies[s as usize].clone()).collect();
        let mut body_index_of_source = vec![0u32; bodies.len()];
        for (body_index, &src) in order.iter().enumerate() {
            body_index_of_source[src as usize] = body_index as u32;
        }

        let mut interval_trees = vec![IntervalTreeNode::default(); bodies.len()];
        {
            let trees = split_by_ranges_mut(&mut interval_trees, &bucket_ranges);
            let build_tree = |(nodes, range): (&mut [IntervalTreeNode], &Range<usize>)| {
                build_interval_tree(&xmins[range.clone()], &xmaxs[range.clone()], nodes);
            };
            if parallel {
                trees.into_par_iter().zip(bucket_ranges.par_iter()).for_each(build_tree);
            } else {
                trees.into_iter().zip(bucket_ranges.iter()).for_each(build_tree);
            }
        }

        let overflow = &bucket_ranges[cell_count];
        let nan_count = sorted_aabbs[overflow.clone()].iter().filter(|a| a.is_nan()).count();
        if nan_count > 0 {
            warn!("{} bodies have NaN bounds and were routed to the overflow bucket", nan_count);
        }
        debug!(
            "built collision layer: {} bodies, {} cells, {} in overflow",
            bodies.len(),
            cell_count,
            overflow.len()
        );

        Ok(Self {
            settings,
            cell_stride,
            bucket_ranges,
            xmins,
            xmaxs,
            yz_min_max,
            interval_trees,
            bodies: sorted_bodies,
            aabbs: sorted_aabbs,
            source_indices: order,
            body_index_of_source,
        })
    }

    /// Settings the layer was built with.
    pub fn settings(&self) -> &CollisionLayerSettings {
        &self.settings
    }

    /// Number of bodies across all buckets.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Cell buckets plus the overflow bucket.
    pub fn bucket_count(&self) -> usize {
        self.bucket_ranges.len()
    }

    /// Grid cells, excluding the overflow bucket.
    pub fn cell_count(&self) -> usize {
        self.bucket_ranges.len() - 1
    }

    /// Always equal to [`Self::cell_count`].
    pub fn overflow_bucket_index(&self) -> usize {
        self.bucket_ranges.len() - 1
    }

    /// Layer-relative body indices of a bucket.
    pub fn bucket_range(&self, bucket_index: usize) -> Range<usize> {
        self.bucket_ranges[bucket_index].clone()
    }

    /// Panics if `bucket_index >= bucket_count()`.
    pub fn bucket(&self, bucket_index: usize) -> BucketSlices<'_> {
        let r = self.bucket_ranges[bucket_index].clone();
        BucketSlices {
            bucket_index,
            global_start: r.start,
            xmins: &self.xmins[r.clone()],
            xmaxs: &self.xmaxs[r.clone()],
            yz_min_max: &self.yz_min_max[r.clone()],
            interval_tree: &self.interval_trees[r.clone()],
            bodies: &self.bodies[r.clone()],
            aabbs: &self.aabbs[r.clone()],
            source_indices: &self.source_indices[r],
        }
    }

    /// Every bucket in index order, overflow last.
    pub fn buckets(&self) -> impl ExactSizeIterator<Item = BucketSlices<'_>> + '_ {
        (0..self.bucket_count()).map(|i| self.bucket(i))
    }

    /// Body at a layer-relative index (the sorted order, not input order).
    pub fn body(&self, body_index: usize) -> &ColliderBody {
        &self.bodies[body_index]
    }

    /// World AABB of a body, by layer-relative index.
    pub fn aabb(&self, body_index: usize) -> &Aabb {
        &self.aabbs[body_index]
    }

    /// Input position of the body at a layer-relative index.
    pub fn source_index(&self, body_index: usize) -> usize {
        self.source_indices[body_index] as usize
    }

    /// Layer-relative index of the body built from `bodies[source_index]`.
    pub fn body_index_of_source(&self, source_index: usize) -> usize {
        self.body_index_of_source[source_index] as usize
    }

    /// Bucket holding the body built from `bodies[source_index]`.
    pub fn bucket_of_source(&self, source_index: usize) -> usize {
        let body_index = self.body_index_of_source(source_index);
        self.bucket_ranges.partition_point(|r| r.end <= body_index)
    }

    /// Bucket the layer would assign to a body with these bounds.
    pub fn bucket_for_aabb(&self, aabb: &Aabb) -> usize {
        classify(aabb, &self.settings, self.cell_stride)
    }

    /// Inclusive cell index range touched by `aabb`, clamped to the grid.
    fn cell_range(&self, aabb: &Aabb) -> (UVec3, UVec3) {
        let world_min = self.settings.world_aabb.min;
        let max_cell = self.settings.subdivisions_per_axis.as_ivec3() - IVec3::ONE;
        let lo = ((aabb.min - world_min) / self.cell_stride).floor().as_ivec3().clamp(IVec3::ZERO, max_cell);
        let hi = ((aabb.max - world_min) / self.cell_stride).floor().as_ivec3().clamp(IVec3::ZERO, max_cell);
        (lo.as_uvec3(), hi.as_uvec3())
    }
}

impl<'a> BucketSlices<'a> {
    /// Number of bodies in the bucket.
    pub fn len(&self) -> usize {
        self.xmins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xmins.is_empty()
    }

    /// Visits every body (bucket-relative index) whose `[xmin, xmax]` contains `x`.
    pub fn stab_x(&self, x: f32, mut f: impl FnMut(usize)) {
        stab(self.interval_tree, 0, x, &mut f);
    }
}

fn stab(nodes: &[IntervalTreeNode], k: usize, x: f32, f: &mut impl FnMut(usize)) {
    let Some(node) = nodes.get(k) else { return };
    if !(node.subtree_xmax >= x) {
        return;
    }
    stab(nodes, 2 * k + 1, x, f);
    if node.xmin <= x {
        if node.xmax >= x {
            f(node.bucket_relative_index as usize);
        }
        stab(nodes, 2 * k + 2, x, f);
    }
}

fn build_interval_tree(xmins: &[f32], xmaxs: &[f32], nodes: &mut [IntervalTreeNode]) {
    fn fill(k: usize, next: &mut usize, xmins: &[f32], xmaxs: &[f32], nodes: &mut [IntervalTreeNode]) {
        if k >= nodes.len() {
            return;
        }
        fill(2 * k + 1, next, xmins, xmaxs, nodes);
        let i = *next;
        nodes[k] = IntervalTreeNode {
            xmin: xmins[i],
            xmax: xmaxs[i],
            subtree_xmax: xmaxs[i],
            bucket_relative_index: i as u32,
        };
        *next += 1;
        fill(2 * k + 2, next, xmins, xmaxs, nodes);
    }

    let mut next = 0;
    fill(0, &mut next, xmins, xmaxs, nodes);
    for k in (0..nodes.len()).rev() {
        let mut m = nodes[k].subtree_xmax;
        if let Some(l) = nodes.get(2 * k + 1) {
            m = m.max(l.subtree_xmax);
        }
        if let Some(r) = nodes.get(2 * k + 2) {
            m = m.max(r.subtree_xmax);
        }
        nodes[k].subtree_xmax = m;
    }
}

/// Bucket index for an AABB under `settings`.
pub(crate) fn classify(aabb: &Aabb, settings: &CollisionLayerSettings, stride: Vec3) -> usize {
    let overflow = settings.cell_count();
    if aabb.is_nan() || !settings.world_aabb.contains(aabb) {
        return overflow;
    }
    let s = settings.subdivisions_per_axis;
    let world_min = settings.world_aabb.min;
    let cell = ((aabb.center() - world_min) / stride).floor().as_uvec3().min(s - UVec3::ONE);
    let (lo, hi) = cell_reach(cell, world_min, stride);
    if aabb.min.cmpge(lo).all() && aabb.max.cmplt(hi).all() {
        cell_index(cell, s)
    } else {
        overflow
    }
}

/// Bounds a body of `cell` must stay within: the cell grown by half a stride
/// on every side, max exclusive. Two cells two apart on an axis share the
/// boundary value exactly, so their bodies can never touch.
#[inline]
pub(crate) fn cell_reach(cell: UVec3, world_min: Vec3, stride: Vec3) -> (Vec3, Vec3) {
    let c = cell.as_vec3();
    (world_min + (c - 0.5) * stride, world_min + (c + 1.5) * stride)
}

#[inline]
pub(crate) fn cell_index(cell: UVec3, subdivisions: UVec3) -> usize {
    (cell.x as usize * subdivisions.y as usize + cell.y as usize) * subdivisions.z as usize + cell.z as usize
}

fn split_by_ranges_mut<'a, T>(mut data: &'a mut [T], ranges: &[Range<usize>]) -> Vec<&'a mut [T]> {
    let mut out = Vec::with_capacity(ranges.len());
    let mut consumed = 0;
    for r in ranges {
        let (head, tail) = std::mem::take(&mut data).split_at_mut(r.end - consumed);
        out.push(head);
        data = tail;
        consumed = r.end;
    }
    out
}

/// One hit of [`find_objects`].
#[derive(Copy, Clone, Debug)]
pub struct FindObjectsResult<'a> {
    pub layer: &'a CollisionLayer,
    pub bucket_index: usize,
    /// Layer-relative index.
    pub body_index: usize,
}

impl<'a> FindObjectsResult<'a> {
    /// The body that overlapped the query.
    pub fn body(&self) -> &'a ColliderBody {
        self.layer.body(self.body_index)
    }

    pub fn aabb(&self) -> &'a Aabb {
        self.layer.aabb(self.body_index)
    }

    pub fn entity(&self) -> EntityId {
        self.body().entity
    }

    /// Input position of the hit body.
    pub fn source_index(&self) -> usize {
        self.layer.source_index(self.body_index)
    }
}

/// Visits every body whose AABB overlaps `query`, each exactly once.
///
/// Returns the number of hits.
pub fn find_objects<'a>(layer: &'a CollisionLayer, query: &Aabb, mut f: impl FnMut(&FindObjectsResult<'a>)) -> usize {
    if query.is_nan() {
        return 0;
    }
    let mut hits = 0;
    let packed = pack_yz(query);
    let mut visit_bucket = |bucket_index: usize| {
        let bucket = layer.bucket(bucket_index);
        if bucket.is_empty() {
            return;
        }
        let mut report = |i: usize| {
            if yz_overlaps(bucket.yz_min_max[i], packed) {
                hits += 1;
                f(&FindObjectsResult { layer, bucket_index, body_index: bucket.global_start + i });
            }
        };
        // Intervals that start at or before query.min.x.
        bucket.stab_x(query.min.x, &mut report);
        // Intervals that start inside the query.
        let start = bucket.xmins.partition_point(|&x| x <= query.min.x);
        let end = bucket.xmins.partition_point(|&x| x <= query.max.x);
        for i in start..end.max(start) {
            report(i);
        }
    };

    let s = layer.settings.subdivisions_per_axis;
    // Cell bodies reach half a stride past their cell.
    let half = layer.cell_stride * 0.5;
    let reach = Aabb::new(query.min - half, query.max + half);
    if reach.overlaps(&layer.settings.world_aabb) {
        let (lo, hi) = layer.cell_range(&reach);
        for x in lo.x..=hi.x {
            for y in lo.y..=hi.y {
                for z in lo.z..=hi.z {
                    visit_bucket(cell_index(UVec3::new(x, y, z), s));
                }
            }
        }
    }
    visit_bucket(layer.overflow_bucket_index());
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn settings() -> CollisionLayerSettings {
        CollisionLayerSettings::new(Aabb::new(Vec3::splat(-10.0), Vec3::splat(10.0)), UVec3::new(2, 2, 2))
    }

    fn sphere(id: u64, p: Vec3, r: f32) -> ColliderBody {
        ColliderBody::new(SphereCollider::new(Vec3::ZERO, r), EntityId(id), RigidTransform::from_translation(p))
    }

    #[test]
    fn test_empty_layer_is_queryable() {
        let layer = CollisionLayer::build(&[], settings()).unwrap();
        assert_eq!(layer.body_count(), 0);
        assert_eq!(layer.bucket_count(), 9);
        assert!(layer.buckets().all(|b| b.is_empty()));
        let hits = find_objects(&layer, &Aabb::new(Vec3::splat(-1.0), Vec3::ONE), |_| {});
        assert_eq!(hits, 0);
    }

    #[test]
    fn test_zero_subdivisions_fail_fast() {
        let s = CollisionLayerSettings { subdivisions_per_axis: UVec3::new(0, 1, 1), ..settings() };
        assert!(CollisionLayer::build(&[sphere(0, Vec3::ZERO, 1.0)], s).is_err());
    }

    #[test]
    fn test_bucket_classification() {
        let bodies = vec![
            sphere(0, Vec3::new(-5.0, -5.0, -5.0), 1.0), // cell (0,0,0)
            sphere(1, Vec3::new(5.0, -5.0, 5.0), 1.0),   // cell (1,0,1)
            sphere(2, Vec3::new(0.0, 5.0, 5.0), 1.0),    // straddles x = 0, center in (1,1,1)
            sphere(3, Vec3::new(50.0, 0.0, 0.0), 1.0),   // outside the world
            sphere(4, Vec3::new(f32::NAN, 0.0, 0.0), 1.0),
            sphere(5, Vec3::new(-2.0, -2.0, -2.0), 7.5), // reaches past half a cell
        ];
        let layer = CollisionLayer::build(&bodies, settings()).unwrap();
        let overflow = layer.overflow_bucket_index();
        assert_eq!(overflow, 8);
        assert_eq!(layer.bucket_of_source(0), 0);
        assert_eq!(layer.bucket_of_source(1), 5);
        assert_eq!(layer.bucket_of_source(2), 7);
        assert_eq!(layer.bucket_of_source(3), overflow);
        assert_eq!(layer.bucket_of_source(4), overflow);
        assert_eq!(layer.bucket_of_source(5), overflow);
        assert_eq!(layer.bucket(overflow).len(), 3);
        for i in 0..bodies.len() {
            assert_eq!(layer.bucket_for_aabb(&bodies[i].aabb()), layer.bucket_of_source(i));
        }
    }

    #[test]
    fn test_cell_reach_is_half_open() {
        // Cell 0 on x spans [-10, 0); its bodies may reach [-15, 5).
        let slab = |id: u64, x: f32, half_x: f32| {
            ColliderBody::new(
                BoxCollider::new(Vec3::ZERO, Vec3::new(half_x, 1.0, 1.0)),
                EntityId(id),
                RigidTransform::from_translation(Vec3::new(x, -5.0, -5.0)),
            )
        };
        let bodies = [slab(0, -1.0, 6.0), slab(1, -1.0, 3.5), slab(2, 1.0, 4.0)];
        let layer = CollisionLayer::build(&bodies, settings()).unwrap();
        // Max x lands exactly on the reach limit.
        assert_eq!(layer.bucket_of_source(0), layer.overflow_bucket_index());
        assert_eq!(layer.bucket_of_source(1), 0);
        // Center x = 1 lands in cell x = 1, whose reach starts at -5.
        assert_eq!(layer.bucket_of_source(2), cell_index(UVec3::new(1, 0, 0), UVec3::splat(2)));

        let (lo, hi) = cell_reach(UVec3::ZERO, Vec3::splat(-10.0), Vec3::splat(10.0));
        assert_eq!(lo, Vec3::splat(-15.0));
        assert_eq!(hi, Vec3::splat(5.0));
        let (far_lo, _) = cell_reach(UVec3::new(2, 0, 0), Vec3::splat(-10.0), Vec3::splat(10.0));
        assert_eq!(far_lo.x, hi.x);
    }

    #[test]
    fn test_buckets_sorted_by_xmin() {
        let bodies: Vec<_> = (0..20)
            .map(|i| sphere(i, Vec3::new(8.0 - i as f32 * 0.3, 3.0, 3.0), 0.1))
            .collect();
        let layer = CollisionLayer::build(&bodies, settings()).unwrap();
        for b in layer.buckets() {
            assert!(b.xmins.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_stab_matches_linear_scan() {
        let bodies: Vec<_> = (0..64)
            .map(|i| {
                let x = 1.0 + (i as f32 * 0.37) % 7.5;
                let r = 0.05 + (i % 5) as f32 * 0.2;
                sphere(i, Vec3::new(x, 5.0, 5.0), r)
            })
            .collect();
        let layer = CollisionLayer::build(&bodies, settings()).unwrap();
        for b in layer.buckets() {
            for x in [1.0f32, 2.5, 3.3, 4.0, 6.1, 8.9, 9.9] {
                let mut got = Vec::new();
                b.stab_x(x, |i| got.push(i));
                got.sort_unstable();
                let want: Vec<usize> = (0..b.len()).filter(|&i| b.xmins[i] <= x && x <= b.xmaxs[i]).collect();
                assert_eq!(got, want, "x {x}");
            }
        }
    }

    #[test]
    fn test_find_objects_reports_each_once() {
        let bodies = vec![
            sphere(0, Vec3::new(-5.0, -5.0, -5.0), 1.0),
            sphere(1, Vec3::new(-0.5, -0.5, -0.5), 1.0),
            sphere(2, Vec3::new(30.0, 0.0, 0.0), 1.0),
            ColliderBody::new(
                BoxCollider::new(Vec3::ZERO, Vec3::new(2.0, 0.5, 0.5)),
                EntityId(3),
                RigidTransform::new(Quat::from_rotation_y(0.3), Vec3::new(2.0, 0.0, 0.0)),
            ),
        ];
        let layer = CollisionLayer::build(&bodies, settings()).unwrap();
        let mut seen = Vec::new();
        let n = find_objects(&layer, &Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0)), |r| {
            seen.push(r.entity().0)
        });
        seen.sort_unstable();
        assert_eq!(n, 2);
        assert_eq!(seen, vec![1, 3]);
    }

    #[test]
    fn test_parallel_build_matches_serial() {
        let bodies: Vec<_> = (0..300)
            .map(|i| {
                let f = i as f32;
                sphere(i, Vec3::new((f * 1.7) % 19.0 - 9.5, (f * 2.3) % 19.0 - 9.5, (f * 0.9) % 19.0 - 9.5), 0.4)
            })
            .collect();
        let a = CollisionLayer::build(&bodies, settings()).unwrap();
        let b = CollisionLayer::build_parallel(&bodies, settings()).unwrap();
        assert_eq!(a.source_indices, b.source_indices);
        assert_eq!(a.bucket_ranges, b.bucket_ranges);
        assert_eq!(a.interval_trees, b.interval_trees);
    }
}
