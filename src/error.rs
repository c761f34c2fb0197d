use glam::{UVec3, Vec3};
use thiserror::Error;

/// Configuration errors. Surfaced at construction, never clamped away.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollisionError {
    #[error("subdivisions per axis must be at least 1 on every axis, got {0}")]
    ZeroSubdivisions(UVec3),

    #[error("world AABB is degenerate or non-finite: min {min}, max {max}")]
    DegenerateWorldAabb { min: Vec3, max: Vec3 },

    #[error("layer would need {0} cells, which exceeds the addressable bucket range")]
    TooManyCells(u64),

    #[error("a pair stream needs at least one cell bucket")]
    ZeroCells,

    #[error("cross-layer FindPairs requires both layers to share identical settings")]
    IncompatibleLayers,
}

/// PairStream contract violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PairStreamError {
    #[error("cannot concatenate streams with {ours} and {theirs} buckets")]
    BucketCountMismatch { ours: usize, theirs: usize },

    #[error("cannot concatenate streams backed by different allocators ({ours} vs {theirs})")]
    AllocatorMismatch { ours: u64, theirs: u64 },

    #[error("pair handle is stale: the stream was concatenated or the handle belongs to another stream")]
    StaleHandle,

    #[error("payload was written as {stored} but read as {requested}")]
    PayloadTypeMismatch { stored: &'static str, requested: &'static str },

    #[error("bucket index {index} is out of range for a stream with {bucket_count} buckets")]
    BucketOutOfRange { index: u32, bucket_count: usize },
}

pub type Result<T, E = CollisionError> = std::result::Result<T, E>;
