//! Bucket-routed, append-only storage for per-pair payloads.
//!
//! A stream for `N` cell buckets (plus the overflow bucket) is split into
//! `5N + 2` sub-streams. Where a pair lands is a pure function of its two
//! buckets and which sides it may write, see [`route`]. Pairs in different
//! cell sub-streams never write the same entity, so consumers can process
//! cells in parallel. Pairs that write entities in two different buckets, and
//! pairs that write overflow entities, are grouped into islands first.
//!
//! Writers never lock: every [`ParallelWriter`] owns its own sub-streams and is
//! merged back with [`PairStream::concatenate`].

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use bytemuck::Pod;
use log::debug;
use rayon::prelude::*;

use crate::error::{CollisionError, PairStreamError, Result};
use crate::find_pairs::FindPairsResult;
use crate::layer::CollisionLayer;
use crate::types::{CollisionLayerSettings, EntityId};

/// Payload block size. Larger payloads get a block of the next power of two.
pub const DEFAULT_BLOCK_SIZE: usize = 16 * 1024;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PairFlags: u8 {
        const WRITABLE_A = 1 << 0;
        const WRITABLE_B = 1 << 1;
        const ENABLED = 1 << 2;
    }
}

/// Which sub-stream a pair lives in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Both bodies in this cell.
    SameBucket(usize),
    /// Only A writable; keyed by A's cell.
    WritableA(usize),
    /// Only B writable; keyed by B's cell.
    WritableB(usize),
    /// Neither side writable; keyed by A's bucket clamped into the cells.
    ReadOnly(usize),
    /// Both writable in two different buckets; keyed by A's bucket, or by
    /// B's when A is in the overflow bucket.
    Mixed(usize),
    /// Both sides in the overflow bucket, or the only writable side is.
    Overflow,
    /// Islanded pairs, grouped island by island.
    Aggregate,
}

impl StreamKind {
    /// Position among the `5 * cell_count + 2` sub-streams.
    pub fn index(self, cell_count: usize) -> usize {
        let n = cell_count;
        match self {
            StreamKind::SameBucket(c) => c,
            StreamKind::WritableA(c) => n + c,
            StreamKind::WritableB(c) => 2 * n + c,
            StreamKind::ReadOnly(c) => 3 * n + c,
            StreamKind::Mixed(c) => 4 * n + c,
            StreamKind::Overflow => 5 * n,
            StreamKind::Aggregate => 5 * n + 1,
        }
    }

    /// Inverse of [`Self::index`]; `None` past the aggregate stream.
    pub fn from_index(index: usize, cell_count: usize) -> Option<Self> {
        let n = cell_count;
        let kind = match index / n.max(1) {
            _ if index == 5 * n => StreamKind::Overflow,
            _ if index == 5 * n + 1 => StreamKind::Aggregate,
            0 => StreamKind::SameBucket(index),
            1 => StreamKind::WritableA(index - n),
            2 => StreamKind::WritableB(index - 2 * n),
            3 => StreamKind::ReadOnly(index - 3 * n),
            4 => StreamKind::Mixed(index - 4 * n),
            _ => return None,
        };
        Some(kind)
    }

    /// Whether pairs of this kind are consumed through islands.
    pub fn is_islanded(self) -> bool {
        matches!(self, StreamKind::Mixed(_) | StreamKind::Overflow | StreamKind::Aggregate)
    }
}

/// A pair needs islanding iff it writes both sides and they live in
/// different buckets.
pub fn needs_islanding(bucket_a: usize, writable_a: bool, bucket_b: usize, writable_b: bool) -> bool {
    writable_a && writable_b && bucket_a != bucket_b
}

/// Sub-stream for a pair. `bucket == cell_count` is the overflow bucket.
///
/// Every pair that [`needs_islanding`] routes to [`StreamKind::Mixed`]. With
/// `cell_count == 0` there are no cell streams and every pair is `Overflow`.
pub fn route(cell_count: usize, bucket_a: usize, writable_a: bool, bucket_b: usize, writable_b: bool) -> StreamKind {
    let overflow = cell_count;
    if cell_count == 0 {
        return StreamKind::Overflow;
    }
    if bucket_a == bucket_b {
        return if bucket_a < overflow { StreamKind::SameBucket(bucket_a) } else { StreamKind::Overflow };
    }
    match (writable_a, writable_b) {
        (true, true) => StreamKind::Mixed(if bucket_a < overflow { bucket_a } else { bucket_b }),
        (true, false) if bucket_a < overflow => StreamKind::WritableA(bucket_a),
        (false, true) if bucket_b < overflow => StreamKind::WritableB(bucket_b),
        (true, false) | (false, true) => StreamKind::Overflow,
        (false, false) => StreamKind::ReadOnly(bucket_a.min(overflow - 1)),
    }
}

/// One side of a pair being added.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PairSide {
    pub entity: EntityId,
    pub bucket: usize,
    pub writable: bool,
}

impl PairSide {
    pub fn writable(entity: EntityId, bucket: usize) -> Self {
        Self { entity, bucket, writable: true }
    }

    pub fn read_only(entity: EntityId, bucket: usize) -> Self {
        Self { entity, bucket, writable: false }
    }
}

/// Location of a payload inside its sub-stream's blocks.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PayloadRef {
    block: u32,
    offset: u32,
    len: u32,
}

impl PayloadRef {
    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Per-pair bookkeeping stored alongside the payload bytes.
#[derive(Copy, Clone, Debug)]
pub struct PairHeader {
    pub entity_a: EntityId,
    pub entity_b: EntityId,
    payload: PayloadRef,
    type_id: TypeId,
    type_name: &'static str,
    user_byte: u8,
    flags: PairFlags,
}

impl PairHeader {
    pub fn payload_ref(&self) -> PayloadRef {
        self.payload
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Name of the payload type, for error messages.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Free byte for the consumer, zero on insert.
    pub fn user_byte(&self) -> u8 {
        self.user_byte
    }

    pub fn flags(&self) -> PairFlags {
        self.flags
    }
}

/// Token for re-finding a pair. Only valid on the stream that issued it and
/// only until that stream is concatenated into or islanded.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PairHandle {
    stream: u32,
    index: u32,
    version: u32,
    owner: u64,
}

fn read_payload<T: Pod>(header: &PairHeader, bytes: &[u8]) -> Result<T, PairStreamError> {
    if header.type_id != TypeId::of::<T>() {
        return Err(PairStreamError::PayloadTypeMismatch { stored: header.type_name, requested: type_name::<T>() });
    }
    Ok(bytemuck::pod_read_unaligned(bytes))
}

/// Read-only view of a stored pair.
#[derive(Copy, Clone, Debug)]
pub struct PairRef<'a> {
    header: &'a PairHeader,
    payload: &'a [u8],
    kind: StreamKind,
}

impl<'a> PairRef<'a> {
    pub fn header(&self) -> &'a PairHeader {
        self.header
    }

    pub fn entity_a(&self) -> EntityId {
        self.header.entity_a
    }

    pub fn entity_b(&self) -> EntityId {
        self.header.entity_b
    }

    pub fn is_enabled(&self) -> bool {
        self.header.flags.contains(PairFlags::ENABLED)
    }

    /// Sub-stream the pair currently lives in.
    pub fn stream_kind(&self) -> StreamKind {
        self.kind
    }

    pub fn try_payload<T: Pod>(&self) -> Result<T, PairStreamError> {
        read_payload(self.header, self.payload)
    }

    /// Panics if the payload was stored as another type.
    pub fn payload<T: Pod>(&self) -> T {
        match self.try_payload() {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }

    /// Payload bytes without the type check.
    pub fn raw_payload(&self) -> &'a [u8] {
        self.payload
    }
}

/// Mutable access to one pair during consumption.
#[derive(Debug)]
pub struct PairMut<'a> {
    header: &'a mut PairHeader,
    payload: &'a mut [u8],
}

impl PairMut<'_> {
    pub fn entity_a(&self) -> EntityId {
        self.header.entity_a
    }

    pub fn entity_b(&self) -> EntityId {
        self.header.entity_b
    }

    pub fn flags(&self) -> PairFlags {
        self.header.flags
    }

    pub fn is_writable_a(&self) -> bool {
        self.header.flags.contains(PairFlags::WRITABLE_A)
    }

    pub fn is_writable_b(&self) -> bool {
        self.header.flags.contains(PairFlags::WRITABLE_B)
    }

    pub fn is_enabled(&self) -> bool {
        self.header.flags.contains(PairFlags::ENABLED)
    }

    /// Disabled pairs stay in the stream; consumers decide what that means.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.header.flags.set(PairFlags::ENABLED, enabled);
    }

    pub fn user_byte(&self) -> u8 {
        self.header.user_byte
    }

    pub fn set_user_byte(&mut self, value: u8) {
        self.header.user_byte = value;
    }

    pub fn try_payload<T: Pod>(&self) -> Result<T, PairStreamError> {
        read_payload(self.header, self.payload)
    }

    /// Panics if the payload was stored as another type.
    pub fn payload<T: Pod>(&self) -> T {
        match self.try_payload() {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }

    /// Overwrites the payload; the type must match the stored one.
    pub fn set_payload<T: Pod>(&mut self, value: &T) -> Result<(), PairStreamError> {
        if self.header.type_id != TypeId::of::<T>() {
            return Err(PairStreamError::PayloadTypeMismatch {
                stored: self.header.type_name,
                requested: type_name::<T>(),
            });
        }
        self.payload.copy_from_slice(bytemuck::bytes_of(value));
        Ok(())
    }

    pub fn raw_payload(&self) -> &[u8] {
        self.payload
    }

    pub fn raw_payload_mut(&mut self) -> &mut [u8] {
        self.payload
    }
}

/// Headers plus a block list holding their payload bytes, in header order.
#[derive(Debug, Default)]
struct SubStream {
    headers: Vec<PairHeader>,
    blocks: Vec<Box<[u8]>>,
    tail_used: usize,
}

impl SubStream {
    fn alloc(&mut self, bytes: &[u8]) -> PayloadRef {
        let len = bytes.len();
        if len == 0 {
            return PayloadRef::default();
        }
        let fits = self.blocks.last().is_some_and(|b| b.len() - self.tail_used >= len);
        if !fits {
            let size = if len <= DEFAULT_BLOCK_SIZE { DEFAULT_BLOCK_SIZE } else { len.next_power_of_two() };
            self.blocks.push(vec![0u8; size].into_boxed_slice());
            self.tail_used = 0;
        }
        let block = self.blocks.len() - 1;
        let offset = self.tail_used;
        self.blocks[block][offset..offset + len].copy_from_slice(bytes);
        self.tail_used += len;
        PayloadRef { block: block as u32, offset: offset as u32, len: len as u32 }
    }

    fn payload(&self, r: PayloadRef) -> &[u8] {
        if r.len == 0 {
            return &[];
        }
        let start = r.offset as usize;
        &self.blocks[r.block as usize][start..start + r.len as usize]
    }

    fn pair_mut(&mut self, index: usize) -> PairMut<'_> {
        let header = &mut self.headers[index];
        let r = header.payload;
        let payload: &mut [u8] = if r.len == 0 {
            Default::default()
        } else {
            let start = r.offset as usize;
            &mut self.blocks[r.block as usize][start..start + r.len as usize]
        };
        PairMut { header, payload }
    }

    /// Every pair with its own disjoint payload slice. Payloads are carved off
    /// the blocks front to back, which works because allocation order matches
    /// header order.
    fn pairs_mut(&mut self) -> Vec<PairMut<'_>> {
        let mut rest: Vec<(&mut [u8], usize)> = self.blocks.iter_mut().map(|b| (&mut b[..], 0)).collect();
        let mut out = Vec::with_capacity(self.headers.len());
        for header in self.headers.iter_mut() {
            let r = header.payload;
            let payload: &mut [u8] = if r.len == 0 {
                Default::default()
            } else {
                let (slice, consumed) = &mut rest[r.block as usize];
                let taken = std::mem::take(slice);
                let (_, tail) = taken.split_at_mut(r.offset as usize - *consumed);
                let (mine, tail) = tail.split_at_mut(r.len as usize);
                *slice = tail;
                *consumed = (r.offset + r.len) as usize;
                mine
            };
            out.push(PairMut { header, payload });
        }
        out
    }

    fn append(&mut self, other: SubStream) {
        let base = self.blocks.len() as u32;
        self.headers.extend(other.headers.into_iter().map(|mut h| {
            if h.payload.len != 0 {
                h.payload.block += base;
            }
            h
        }));
        if !other.blocks.is_empty() {
            self.blocks.extend(other.blocks);
            self.tail_used = other.tail_used;
        }
    }

    fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

#[derive(Default)]
struct UnionFind {
    parent: Vec<usize>,
    nodes: HashMap<EntityId, usize>,
}

impl UnionFind {
    fn node(&mut self, entity: EntityId) -> usize {
        let next = self.parent.len();
        let id = *self.nodes.entry(entity).or_insert(next);
        if id == next {
            self.parent.push(next);
        }
        id
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

/// Bucket-routed pair container. See the module docs for the layout.
#[derive(Debug)]
pub struct PairStream {
    streams: Vec<SubStream>,
    cell_count: usize,
    allocator: u64,
    owner: u64,
    version: u32,
    needs_islanding: bool,
    islands: Vec<Range<usize>>,
    islands_current: bool,
}

impl PairStream {
    /// Empty stream for `cell_count` cell buckets plus the overflow bucket.
    /// A stream needs at least one cell.
    pub fn new(cell_count: usize) -> Result<Self> {
        if cell_count == 0 {
            return Err(CollisionError::ZeroCells);
        }
        Ok(Self::with_allocator(cell_count, next_id()))
    }

    /// Empty stream matching the buckets of layers built with `settings`.
    pub fn from_settings(settings: &CollisionLayerSettings) -> Result<Self> {
        settings.validate()?;
        Self::new(settings.cell_count())
    }

    /// Empty stream matching the buckets of `layer`.
    pub fn from_layer(layer: &CollisionLayer) -> Self {
        Self::with_allocator(layer.cell_count(), next_id())
    }

    fn with_allocator(cell_count: usize, allocator: u64) -> Self {
        Self {
            streams: (0..5 * cell_count + 2).map(|_| SubStream::default()).collect(),
            cell_count,
            allocator,
            owner: next_id(),
            version: 0,
            needs_islanding: false,
            islands: Vec::new(),
            islands_current: true,
        }
    }

    /// Cell buckets, excluding overflow.
    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    /// Cells plus the overflow bucket.
    pub fn bucket_count(&self) -> usize {
        self.cell_count + 1
    }

    /// Whether any pair added so far spans two buckets with both sides writable.
    pub fn needs_islanding(&self) -> bool {
        self.needs_islanding
    }

    /// Pairs across every sub-stream.
    pub fn pair_count(&self) -> usize {
        self.streams.iter().map(|s| s.headers.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.iter().all(SubStream::is_empty)
    }

    /// Pairs in one sub-stream; zero for a kind outside this stream's cells.
    pub fn stream_len(&self, kind: StreamKind) -> usize {
        self.streams.get(kind.index(self.cell_count)).map_or(0, |s| s.headers.len())
    }

    fn check_bucket(&self, bucket: usize) -> Result<(), PairStreamError> {
        if bucket >= self.bucket_count() {
            return Err(PairStreamError::BucketOutOfRange {
                index: u32::try_from(bucket).unwrap_or(u32::MAX),
                bucket_count: self.bucket_count(),
            });
        }
        Ok(())
    }

    fn insert(
        &mut self,
        a: PairSide,
        b: PairSide,
        bytes: &[u8],
        type_id: TypeId,
        type_name: &'static str,
    ) -> Result<PairHandle, PairStreamError> {
        self.check_bucket(a.bucket)?;
        self.check_bucket(b.bucket)?;
        let kind = route(self.cell_count, a.bucket, a.writable, b.bucket, b.writable);
        if needs_islanding(a.bucket, a.writable, b.bucket, b.writable) {
            self.needs_islanding = true;
        }
        if kind.is_islanded() {
            self.islands_current = false;
        }

        let mut flags = PairFlags::ENABLED;
        flags.set(PairFlags::WRITABLE_A, a.writable);
        flags.set(PairFlags::WRITABLE_B, b.writable);

        let stream = kind.index(self.cell_count);
        let sub = &mut self.streams[stream];
        let payload = sub.alloc(bytes);
        sub.headers.push(PairHeader {
            entity_a: a.entity,
            entity_b: b.entity,
            payload,
            type_id,
            type_name,
            user_byte: 0,
            flags,
        });
        Ok(PairHandle {
            stream: stream as u32,
            index: (sub.headers.len() - 1) as u32,
            version: self.version,
            owner: self.owner,
        })
    }

    /// Copies `payload` into the sub-stream chosen by [`route`].
    ///
    /// Fails with `BucketOutOfRange` when either side names a bucket past
    /// the overflow bucket.
    pub fn add_pair<T: Pod>(&mut self, a: PairSide, b: PairSide, payload: &T) -> Result<PairHandle, PairStreamError> {
        self.insert(a, b, bytemuck::bytes_of(payload), TypeId::of::<T>(), type_name::<T>())
    }

    /// Adds a pair with `byte_len` zeroed payload bytes, reachable through
    /// [`PairMut::raw_payload_mut`].
    pub fn add_pair_raw(&mut self, a: PairSide, b: PairSide, byte_len: usize) -> Result<PairHandle, PairStreamError> {
        let zeros = vec![0u8; byte_len];
        self.insert(a, b, &zeros, TypeId::of::<[u8]>(), type_name::<[u8]>())
    }

    /// Adds a broad-phase pair using the buckets the layers assigned.
    pub fn add_pair_from_result<T: Pod>(
        &mut self,
        result: &FindPairsResult<'_>,
        writable_a: bool,
        writable_b: bool,
        payload: &T,
    ) -> Result<PairHandle, PairStreamError> {
        let a = PairSide { entity: result.entity_a(), bucket: result.bucket_index_a(), writable: writable_a };
        let b = PairSide { entity: result.entity_b(), bucket: result.bucket_index_b(), writable: writable_b };
        self.add_pair(a, b, payload)
    }

    fn locate(&self, handle: PairHandle) -> Result<(usize, usize), PairStreamError> {
        if handle.owner != self.owner || handle.version != self.version {
            return Err(PairStreamError::StaleHandle);
        }
        let (stream, index) = (handle.stream as usize, handle.index as usize);
        match self.streams.get(stream) {
            Some(s) if index < s.headers.len() => Ok((stream, index)),
            _ => Err(PairStreamError::StaleHandle),
        }
    }

    /// Fails with `StaleHandle` for a handle from another stream or version.
    pub fn pair(&self, handle: PairHandle) -> Result<PairRef<'_>, PairStreamError> {
        let (stream, index) = self.locate(handle)?;
        let sub = &self.streams[stream];
        let header = &sub.headers[index];
        Ok(PairRef { header, payload: sub.payload(header.payload), kind: self.kind_of(stream) })
    }

    /// Mutable access through a handle; the `&mut self` borrow is the write token.
    pub fn pair_mut(&mut self, handle: PairHandle) -> Result<PairMut<'_>, PairStreamError> {
        let (stream, index) = self.locate(handle)?;
        Ok(self.streams[stream].pair_mut(index))
    }

    fn kind_of(&self, stream: usize) -> StreamKind {
        StreamKind::from_index(stream, self.cell_count).unwrap_or(StreamKind::Aggregate)
    }

    /// Every pair, sub-stream by sub-stream.
    pub fn pairs(&self) -> impl Iterator<Item = PairRef<'_>> + '_ {
        self.streams.iter().enumerate().flat_map(move |(i, sub)| {
            let kind = self.kind_of(i);
            sub.headers.iter().map(move |header| PairRef { header, payload: sub.payload(header.payload), kind })
        })
    }

    /// An empty writer that can later be concatenated into this stream.
    pub fn parallel_writer(&self) -> ParallelWriter {
        ParallelWriter { stream: Self::with_allocator(self.cell_count, self.allocator) }
    }

    /// Moves every pair of `other` into this stream. All handles issued by
    /// this stream before the call become stale.
    pub fn concatenate(&mut self, other: PairStream) -> Result<(), PairStreamError> {
        if other.bucket_count() != self.bucket_count() {
            return Err(PairStreamError::BucketCountMismatch {
                ours: self.bucket_count(),
                theirs: other.bucket_count(),
            });
        }
        if other.allocator != self.allocator {
            return Err(PairStreamError::AllocatorMismatch { ours: self.allocator, theirs: other.allocator });
        }
        let added = other.pair_count();
        let islanded_start = 4 * self.cell_count;
        if other.streams[islanded_start..].iter().any(|s| !s.is_empty()) {
            self.islands_current = false;
        }
        self.needs_islanding |= other.needs_islanding;
        for (ours, theirs) in self.streams.iter_mut().zip(other.streams) {
            ours.append(theirs);
        }
        self.version = self.version.wrapping_add(1);
        debug!("pair stream: concatenated {} pairs, {} total", added, self.pair_count());
        Ok(())
    }

    /// Groups every islanded pair (mixed, overflow and previously islanded)
    /// into the aggregate sub-stream so that pairs sharing an entity end up
    /// in the same island. Invalidates handles.
    pub fn island(&mut self) {
        if self.islands_current {
            return;
        }
        let start = 4 * self.cell_count;
        let sources: Vec<SubStream> = self.streams[start..].iter_mut().map(std::mem::take).collect();

        // Both sides are joined so a pair never observes an entity another
        // island writes.
        let mut uf = UnionFind::default();
        for h in sources.iter().flat_map(|s| s.headers.iter()) {
            let (a, b) = (uf.node(h.entity_a), uf.node(h.entity_b));
            uf.union(a, b);
        }
        let mut island_of_root: HashMap<usize, usize> = HashMap::new();
        let mut members: Vec<Vec<(usize, usize)>> = Vec::new();
        for (s, sub) in sources.iter().enumerate() {
            for (i, h) in sub.headers.iter().enumerate() {
                let node = uf.node(h.entity_a);
                let root = uf.find(node);
                let island = *island_of_root.entry(root).or_insert_with(|| {
                    members.push(Vec::new());
                    members.len() - 1
                });
                members[island].push((s, i));
            }
        }

        let mut aggregate = SubStream::default();
        let mut islands = Vec::with_capacity(members.len());
        for group in members {
            let first = aggregate.headers.len();
            for (s, i) in group {
                let mut header = sources[s].headers[i];
                header.payload = aggregate.alloc(sources[s].payload(header.payload));
                aggregate.headers.push(header);
            }
            islands.push(first..aggregate.headers.len());
        }
        debug!("pair stream: {} islanded pairs in {} islands", aggregate.headers.len(), islands.len());
        self.streams[StreamKind::Aggregate.index(self.cell_count)] = aggregate;
        self.islands = islands;
        self.islands_current = true;
        self.version = self.version.wrapping_add(1);
    }

    /// Island ranges over the aggregate sub-stream, as of the last
    /// [`island`](Self::island).
    pub fn islands(&self) -> &[Range<usize>] {
        &self.islands
    }

    /// Visits every pair on the calling thread, sub-stream by sub-stream.
    pub fn for_each_pair(&mut self, mut f: impl FnMut(&mut PairMut<'_>)) {
        for sub in &mut self.streams {
            for mut pair in sub.pairs_mut() {
                f(&mut pair);
            }
        }
    }

    /// Visits every pair exactly once from the rayon pool.
    ///
    /// First one task per cell runs that cell's same-bucket, directional and
    /// read-only pairs. Then the islanded pairs run one task per island.
    /// Within a task pairs are visited in stream order.
    pub fn for_each_pair_parallel<F>(&mut self, f: F)
    where
        F: Fn(&mut PairMut<'_>) + Sync,
    {
        self.island();
        let n = self.cell_count;
        let (cells, islanded) = self.streams.split_at_mut(4 * n);
        let (same, rest) = cells.split_at_mut(n);
        let (writable_a, rest) = rest.split_at_mut(n);
        let (writable_b, read_only) = rest.split_at_mut(n);
        same.par_iter_mut()
            .zip(writable_a.par_iter_mut())
            .zip(writable_b.par_iter_mut())
            .zip(read_only.par_iter_mut())
            .for_each(|(((s, a), b), r)| {
                for sub in [s, a, b, r] {
                    for mut pair in sub.pairs_mut() {
                        f(&mut pair);
                    }
                }
            });

        let mut pairs = islanded[n + 1].pairs_mut();
        let mut groups = Vec::with_capacity(self.islands.len());
        for range in self.islands.iter().rev() {
            groups.push(pairs.split_off(range.start));
        }
        groups.into_par_iter().for_each(|mut group| {
            for pair in group.iter_mut() {
                f(pair);
            }
        });
    }

    /// Frees the stream on the rayon pool instead of the calling thread.
    pub fn dispose_in_background(self) {
        debug!("pair stream: disposing {} pairs in background", self.pair_count());
        rayon::spawn(move || drop(self));
    }
}

/// Lock-free writer for one worker. Owns its sub-streams outright; merge it
/// back with `stream.concatenate(writer.into_stream())`.
#[derive(Debug)]
pub struct ParallelWriter {
    stream: PairStream,
}

impl ParallelWriter {
    /// Same as [`PairStream::add_pair`].
    pub fn add_pair<T: Pod>(&mut self, a: PairSide, b: PairSide, payload: &T) -> Result<PairHandle, PairStreamError> {
        self.stream.add_pair(a, b, payload)
    }

    pub fn add_pair_raw(&mut self, a: PairSide, b: PairSide, byte_len: usize) -> Result<PairHandle, PairStreamError> {
        self.stream.add_pair_raw(a, b, byte_len)
    }

    pub fn add_pair_from_result<T: Pod>(
        &mut self,
        result: &FindPairsResult<'_>,
        writable_a: bool,
        writable_b: bool,
        payload: &T,
    ) -> Result<PairHandle, PairStreamError> {
        self.stream.add_pair_from_result(result, writable_a, writable_b, payload)
    }

    /// Another empty writer for the same destination stream.
    pub fn fork(&self) -> ParallelWriter {
        ParallelWriter { stream: PairStream::with_allocator(self.stream.cell_count, self.stream.allocator) }
    }

    /// Pairs written by this writer.
    pub fn len(&self) -> usize {
        self.stream.pair_count()
    }

    pub fn is_empty(&self) -> bool {
        self.stream.is_empty()
    }

    pub fn into_stream(self) -> PairStream {
        self.stream
    }
}
