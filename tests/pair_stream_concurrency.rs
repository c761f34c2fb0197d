use std::sync::atomic::{AtomicUsize, Ordering};

use bucketbonk::pair_stream::{needs_islanding, route};
use bucketbonk::*;
use bytemuck::{Pod, Zeroable};
use rayon::prelude::*;

const CELLS: usize = 6;
const TASKS: u64 = 16;
const PER_TASK: u64 = 2_000;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct Tagged {
    id: u64,
    bucket_a: u32,
    bucket_b: u32,
    writable: u32,
    _pad: u32,
    checksum: u64,
}

fn splitmix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

fn tagged(id: u64) -> Tagged {
    let h = splitmix(id);
    // Buckets range over the cells plus the overflow bucket.
    let bucket_a = (h % (CELLS as u64 + 1)) as u32;
    let bucket_b = ((h >> 8) % (CELLS as u64 + 1)) as u32;
    let writable = ((h >> 16) & 0b11) as u32;
    let checksum = splitmix(id ^ ((bucket_a as u64) << 32) ^ ((bucket_b as u64) << 40) ^ writable as u64);
    Tagged { id, bucket_a, bucket_b, writable, _pad: 0, checksum }
}

fn sides(t: &Tagged) -> (PairSide, PairSide) {
    let a = PairSide { entity: EntityId(t.id * 2), bucket: t.bucket_a as usize, writable: t.writable & 1 != 0 };
    let b = PairSide { entity: EntityId(t.id * 2 + 1), bucket: t.bucket_b as usize, writable: t.writable & 2 != 0 };
    (a, b)
}

fn filled_stream() -> PairStream {
    let mut stream = PairStream::new(CELLS).unwrap();
    let parts: Vec<PairStream> = (0..TASKS)
        .into_par_iter()
        .map(|task| {
            let mut writer = stream.parallel_writer();
            for k in 0..PER_TASK {
                let t = tagged(task * PER_TASK + k);
                let (a, b) = sides(&t);
                writer.add_pair(a, b, &t).unwrap();
            }
            writer.into_stream()
        })
        .collect();
    for part in parts {
        stream.concatenate(part).unwrap();
    }
    stream
}

#[test]
fn concurrent_writers_merge_without_loss() {
    let _ = env_logger::builder().is_test(true).try_init();
    let stream = filled_stream();
    let total = (TASKS * PER_TASK) as usize;
    assert_eq!(stream.pair_count(), total);

    let mut ids = Vec::with_capacity(total);
    for pair in stream.pairs() {
        let t: Tagged = pair.payload();
        assert_eq!(t.checksum, tagged(t.id).checksum, "payload {} corrupted", t.id);
        assert_eq!(pair.entity_a(), EntityId(t.id * 2));
        assert_eq!(pair.entity_b(), EntityId(t.id * 2 + 1));
        ids.push(t.id);
    }
    ids.sort_unstable();
    assert!(ids.iter().copied().eq(0..total as u64));
}

#[test]
fn pairs_land_in_their_routed_sub_stream() {
    let stream = filled_stream();
    for pair in stream.pairs() {
        let t: Tagged = pair.payload();
        let (a, b) = sides(&t);
        let kind = pair.stream_kind();
        assert_eq!(kind, route(CELLS, a.bucket, a.writable, b.bucket, b.writable));

        let islanded = needs_islanding(a.bucket, a.writable, b.bucket, b.writable);
        assert_eq!(matches!(kind, StreamKind::Mixed(_)), islanded);
        if let StreamKind::Mixed(cell) = kind {
            assert!(cell < CELLS);
            assert!(cell == a.bucket || cell == b.bucket);
        }
    }
}

#[test]
fn parallel_visit_after_merge_sees_every_pair_once() {
    let mut stream = filled_stream();
    let total = (TASKS * PER_TASK) as usize;
    let seen: Vec<AtomicUsize> = (0..total).map(|_| AtomicUsize::new(0)).collect();
    stream.for_each_pair_parallel(|pair| {
        let t: Tagged = pair.payload();
        seen[t.id as usize].fetch_add(1, Ordering::Relaxed);
    });
    assert!(seen.iter().all(|c| c.load(Ordering::Relaxed) == 1));
    assert_eq!(stream.pair_count(), total);

    // Islands tile the aggregate and no island writes an entity another island writes.
    let islands = stream.islands().to_vec();
    let aggregate: Vec<_> = stream.pairs().filter(|p| p.stream_kind() == StreamKind::Aggregate).collect();
    let mut next = 0;
    let mut owner = std::collections::HashMap::new();
    for (i, range) in islands.iter().enumerate() {
        assert_eq!(range.start, next);
        next = range.end;
        for pair in &aggregate[range.clone()] {
            for entity in [pair.entity_a(), pair.entity_b()] {
                assert_eq!(*owner.entry(entity).or_insert(i), i);
            }
        }
    }
    assert_eq!(next, aggregate.len());
}
