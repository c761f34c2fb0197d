use std::sync::atomic::{AtomicU64, Ordering};

use crate::find_pairs::FindPairsResult;

/// Capability invoked once per AABB-overlapping candidate pair.
///
/// For parallel schedules the processor is cloned once per task, so any state
/// meant to outlive the run must be shared through the clone (a
/// [`ParallelWriter`](crate::pair_stream::ParallelWriter) per task, an `Arc`
/// of atomics, ...).
pub trait FindPairsProcessor {
    fn execute(&mut self, result: &FindPairsResult<'_>);

    /// Called before a task starts sweeping a bucket or bucket pair.
    fn begin_bucket(&mut self, _bucket_index_a: usize, _bucket_index_b: usize) {}

    /// Called after the task finished that bucket or bucket pair.
    fn end_bucket(&mut self, _bucket_index_a: usize, _bucket_index_b: usize) {}
}

impl<F> FindPairsProcessor for F
where
    F: FnMut(&FindPairsResult<'_>),
{
    fn execute(&mut self, result: &FindPairsResult<'_>) {
        self(result)
    }
}

/// Opt-in for [`FindPairs::run_parallel_relaxed`](crate::find_pairs::FindPairs::run_parallel_relaxed).
///
/// Implementors promise that `execute` only performs monotonic,
/// one-directional state transitions (for example clearing an "alive" bit and
/// never setting it again), so the outcome is the same whichever task reaches
/// a body first and no phase barrier is needed between buckets.
pub trait MonotonicProcessor: Sync {
    fn execute(&self, result: &FindPairsResult<'_>);
}

/// Bitset whose only mutation is clearing a bit.
///
/// Bits start set. Concurrent clears of the same bit commute, which makes this
/// the natural state holder for a [`MonotonicProcessor`].
#[derive(Debug)]
pub struct MonotonicFlags {
    words: Box<[AtomicU64]>,
    len: usize,
}

impl MonotonicFlags {
    pub fn all_set(len: usize) -> Self {
        let words = (0..len.div_ceil(64))
            .map(|w| {
                let remaining = len - w * 64;
                let bits = if remaining >= 64 { u64::MAX } else { (1u64 << remaining) - 1 };
                AtomicU64::new(bits)
            })
            .collect();
        Self { words, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_set(&self, index: usize) -> bool {
        assert!(index < self.len, "flag index {index} out of range {}", self.len);
        self.words[index / 64].load(Ordering::Relaxed) & (1 << (index % 64)) != 0
    }

    /// Clears the bit and returns whether this call was the one that cleared it.
    pub fn clear(&self, index: usize) -> bool {
        assert!(index < self.len, "flag index {index} out of range {}", self.len);
        let mask = 1u64 << (index % 64);
        self.words[index / 64].fetch_and(!mask, Ordering::Relaxed) & mask != 0
    }

    pub fn count_set(&self) -> usize {
        self.words.iter().map(|w| w.load(Ordering::Relaxed).count_ones() as usize).sum()
    }
}
