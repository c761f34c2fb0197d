//! Broad phase: every AABB-overlapping pair within one layer or across two.
//!
//! Work is cut into units (a bucket swept against itself, or two buckets swept
//! against each other). A cell body never reaches past half a cell beyond its
//! own cell, so cell buckets only need sweeping against themselves and their
//! 26 neighbours. The overflow bucket is swept against everything.

use glam::{IVec3, UVec3};
use log::trace;
use rayon::prelude::*;

use crate::api::{FindPairsProcessor, MonotonicProcessor};
use crate::error::{CollisionError, Result};
use crate::layer::{BucketSlices, CollisionLayer, cell_index, yz_overlaps};
use crate::types::*;

/// One candidate pair handed to a processor.
///
/// `A` always comes from the first layer argument. In a self-layer run a pair
/// spanning two buckets takes `A` from the lower-numbered bucket.
#[derive(Copy, Clone, Debug)]
pub struct FindPairsResult<'a> {
    layer_a: &'a CollisionLayer,
    layer_b: &'a CollisionLayer,
    bucket_index_a: usize,
    bucket_index_b: usize,
    body_index_a: usize,
    body_index_b: usize,
}

impl<'a> FindPairsResult<'a> {
    /// Layer that A came from; the same layer as B in a self-layer run.
    pub fn layer_a(&self) -> &'a CollisionLayer {
        self.layer_a
    }

    pub fn layer_b(&self) -> &'a CollisionLayer {
        self.layer_b
    }

    pub fn body_a(&self) -> &'a ColliderBody {
        self.layer_a.body(self.body_index_a)
    }

    pub fn body_b(&self) -> &'a ColliderBody {
        self.layer_b.body(self.body_index_b)
    }

    /// World bounds A was bucketed with.
    pub fn aabb_a(&self) -> &'a Aabb {
        self.layer_a.aabb(self.body_index_a)
    }

    pub fn aabb_b(&self) -> &'a Aabb {
        self.layer_b.aabb(self.body_index_b)
    }

    pub fn entity_a(&self) -> EntityId {
        self.body_a().entity
    }

    pub fn entity_b(&self) -> EntityId {
        self.body_b().entity
    }

    /// Index into the body array `layer_a` was built from.
    pub fn source_index_a(&self) -> usize {
        self.layer_a.source_index(self.body_index_a)
    }

    pub fn source_index_b(&self) -> usize {
        self.layer_b.source_index(self.body_index_b)
    }

    /// Bucket of A; equal to `layer_a().cell_count()` for overflow.
    pub fn bucket_index_a(&self) -> usize {
        self.bucket_index_a
    }

    pub fn bucket_index_b(&self) -> usize {
        self.bucket_index_b
    }

    /// Layer-relative (sorted) index of A.
    pub fn body_index_a(&self) -> usize {
        self.body_index_a
    }

    pub fn body_index_b(&self) -> usize {
        self.body_index_b
    }

    /// Both bodies sit in the same bucket index.
    pub fn is_same_bucket(&self) -> bool {
        self.bucket_index_a == self.bucket_index_b
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum WorkUnit {
    /// Bucket of layer A against itself.
    Within(usize),
    /// Bucket of layer A against bucket of layer B.
    Between(usize, usize),
}

/// Pair enumeration over one layer or between two layers.
#[derive(Copy, Clone, Debug)]
pub struct FindPairs<'a> {
    layer_a: &'a CollisionLayer,
    layer_b: &'a CollisionLayer,
    same_layer: bool,
}

/// Units grouped into phases. Units within one phase never touch the same
/// bucket of the same layer; `tail` units all share overflow bodies.
struct Schedule {
    phases: Vec<Vec<WorkUnit>>,
    tail: Vec<WorkUnit>,
}

impl Schedule {
    fn into_units(self) -> impl Iterator<Item = WorkUnit> {
        self.phases.into_iter().flatten().chain(self.tail)
    }
}

/// Neighbour offsets. `forward` keeps one of each `d`/`-d` couple.
fn neighbour_offsets(forward: bool) -> Vec<IVec3> {
    let mut out = Vec::with_capacity(27);
    for x in -1..=1 {
        for y in -1..=1 {
            for z in -1..=1 {
                let d = IVec3::new(x, y, z);
                if !forward || d.to_array() > [0, 0, 0] {
                    out.push(d);
                }
            }
        }
    }
    out
}

/// `(cell, cell + d)` for every cell whose neighbour at `d` exists, optionally
/// restricted to cells of one parity along `axis`.
fn offset_units(subdivisions: UVec3, d: IVec3, parity: Option<(usize, i32)>) -> Vec<WorkUnit> {
    let s = subdivisions.as_ivec3();
    let mut out = Vec::new();
    for x in 0..s.x {
        for y in 0..s.y {
            for z in 0..s.z {
                let c = IVec3::new(x, y, z);
                let n = c + d;
                if n.cmplt(IVec3::ZERO).any() || n.cmpge(s).any() {
                    continue;
                }
                if let Some((axis, p)) = parity {
                    if c[axis].rem_euclid(2) != p {
                        continue;
                    }
                }
                out.push(WorkUnit::Between(cell_index(c.as_uvec3(), subdivisions), cell_index(n.as_uvec3(), subdivisions)));
            }
        }
    }
    out
}

impl<'a> FindPairs<'a> {
    /// Every overlapping pair within one layer, each reported once.
    pub fn self_layer(layer: &'a CollisionLayer) -> Self {
        Self { layer_a: layer, layer_b: layer, same_layer: true }
    }

    /// Both layers must have been built with identical settings.
    pub fn cross_layer(layer_a: &'a CollisionLayer, layer_b: &'a CollisionLayer) -> Result<Self> {
        if layer_a.settings() != layer_b.settings() {
            return Err(CollisionError::IncompatibleLayers);
        }
        Ok(Self { layer_a, layer_b, same_layer: false })
    }

    fn schedule(&self) -> Schedule {
        let cells = self.layer_a.cell_count();
        let overflow = self.layer_a.overflow_bucket_index();
        let subdivisions = self.layer_a.settings().subdivisions_per_axis;
        let mut phases = Vec::new();
        if self.same_layer {
            phases.push((0..=overflow).map(WorkUnit::Within).collect());
            // Along an axis where `d` moves, cells of equal parity never meet
            // each other's neighbour, so each half runs as one phase.
            for d in neighbour_offsets(true) {
                let axis = (0..3).find(|&k| d[k] != 0).unwrap_or(0);
                for p in 0..2 {
                    phases.push(offset_units(subdivisions, d, Some((axis, p))));
                }
            }
            let tail = (0..cells).map(|c| WorkUnit::Between(c, overflow)).collect();
            Schedule { phases, tail }
        } else {
            for d in neighbour_offsets(false) {
                phases.push(offset_units(subdivisions, d, None));
            }
            let tail = (0..cells)
                .map(|c| WorkUnit::Between(c, overflow))
                .chain((0..cells).map(|c| WorkUnit::Between(overflow, c)))
                .chain(std::iter::once(WorkUnit::Between(overflow, overflow)))
                .collect();
            Schedule { phases, tail }
        }
    }

    fn bucket_indices(unit: WorkUnit) -> (usize, usize) {
        match unit {
            WorkUnit::Within(b) => (b, b),
            WorkUnit::Between(a, b) => (a, b),
        }
    }

    fn sweep_unit(&self, unit: WorkUnit, f: &mut impl FnMut(&FindPairsResult<'a>)) -> usize {
        match unit {
            WorkUnit::Within(b) => sweep_within(self.layer_a, self.layer_a.bucket(b), f),
            WorkUnit::Between(a, b) => {
                sweep_between(self.layer_a, self.layer_a.bucket(a), self.layer_b, self.layer_b.bucket(b), f)
            }
        }
    }

    fn run_unit<P: FindPairsProcessor>(&self, unit: WorkUnit, processor: &mut P) -> usize {
        let (a, b) = Self::bucket_indices(unit);
        processor.begin_bucket(a, b);
        let n = self.sweep_unit(unit, &mut |r: &FindPairsResult<'a>| processor.execute(r));
        processor.end_bucket(a, b);
        n
    }

    /// Runs every unit on the calling thread. Units run in a fixed order, so
    /// the pair order is deterministic.
    pub fn run<P: FindPairsProcessor>(&self, processor: &mut P) -> usize {
        let n: usize = self.schedule().into_units().map(|u| self.run_unit(u, processor)).sum();
        trace!("find_pairs (single): {} candidate pairs", n);
        n
    }

    /// Runs each phase of bucket-disjoint units as parallel tasks, each on its
    /// own clone of `processor`, then the overflow units serially on one more
    /// clone.
    ///
    /// No two tasks running at the same time ever see the same body.
    pub fn run_parallel<P>(&self, processor: &P) -> usize
    where
        P: FindPairsProcessor + Clone + Send + Sync,
    {
        let Schedule { phases, tail } = self.schedule();
        let mut first = 0;
        for phase in phases {
            first += phase
                .into_par_iter()
                .map(|u| {
                    let mut p = processor.clone();
                    self.run_unit(u, &mut p)
                })
                .sum::<usize>();
        }
        let mut p = processor.clone();
        let second: usize = tail.into_iter().map(|u| self.run_unit(u, &mut p)).sum();
        trace!("find_pairs (parallel): {} + {} candidate pairs", first, second);
        first + second
    }

    /// Runs every unit in parallel with no phase barrier. Only available to
    /// processors that declare monotonic one-directional mutation.
    pub fn run_parallel_relaxed<P: MonotonicProcessor>(&self, processor: &P) -> usize {
        let units: Vec<WorkUnit> = self.schedule().into_units().collect();
        let n: usize = units
            .into_par_iter()
            .map(|u| self.sweep_unit(u, &mut |r: &FindPairsResult<'a>| processor.execute(r)))
            .sum();
        trace!("find_pairs (relaxed): {} candidate pairs", n);
        n
    }
}

/// Sweep of one `xmin`-sorted bucket against itself. Each overlapping pair
/// `(i, j)` is reported once with `i < j`.
fn sweep_within<'a>(
    layer: &'a CollisionLayer,
    bucket: BucketSlices<'a>,
    f: &mut impl FnMut(&FindPairsResult<'a>),
) -> usize {
    let mut count = 0;
    let n = bucket.len();
    for i in 0..n {
        let xmax = bucket.xmaxs[i];
        let yz = bucket.yz_min_max[i];
        for j in i + 1..n {
            if !(bucket.xmins[j] <= xmax) {
                break;
            }
            if yz_overlaps(yz, bucket.yz_min_max[j]) {
                count += 1;
                f(&FindPairsResult {
                    layer_a: layer,
                    layer_b: layer,
                    bucket_index_a: bucket.bucket_index,
                    bucket_index_b: bucket.bucket_index,
                    body_index_a: bucket.global_start + i,
                    body_index_b: bucket.global_start + j,
                });
            }
        }
    }
    count
}

/// Merged sweep of two `xmin`-sorted buckets. Whichever side starts first scans
/// forward through the other side while the other side's `xmin` is within its
/// `xmax`.
fn sweep_between<'a>(
    layer_a: &'a CollisionLayer,
    a: BucketSlices<'a>,
    layer_b: &'a CollisionLayer,
    b: BucketSlices<'a>,
    f: &mut impl FnMut(&FindPairsResult<'a>),
) -> usize {
    let mut count = 0;
    let mut report = |i: usize, j: usize| {
        count += 1;
        f(&FindPairsResult {
            layer_a,
            layer_b,
            bucket_index_a: a.bucket_index,
            bucket_index_b: b.bucket_index,
            body_index_a: a.global_start + i,
            body_index_b: b.global_start + j,
        });
    };
    let (na, nb) = (a.len(), b.len());
    let (mut i, mut j) = (0, 0);
    while i < na && j < nb {
        if a.xmins[i] <= b.xmins[j] {
            let xmax = a.xmaxs[i];
            let yz = a.yz_min_max[i];
            for k in j..nb {
                if !(b.xmins[k] <= xmax) {
                    break;
                }
                if yz_overlaps(yz, b.yz_min_max[k]) {
                    report(i, k);
                }
            }
            i += 1;
        } else {
            let xmax = b.xmaxs[j];
            let yz = b.yz_min_max[j];
            for k in i..na {
                if !(a.xmins[k] <= xmax) {
                    break;
                }
                if yz_overlaps(a.yz_min_max[k], yz) {
                    report(k, j);
                }
            }
            j += 1;
        }
    }
    count
}
