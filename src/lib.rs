//! bucketbonk: bucketed collision layers, broad-phase pair finding, signed distance queries

pub mod types;
pub mod error;
pub mod api;
pub mod layer;
pub mod find_pairs;
pub mod narrowphase;
pub mod pair_stream;

pub use crate::types::*;
pub use crate::error::{CollisionError, PairStreamError, Result};
pub use crate::api::{FindPairsProcessor, MonotonicFlags, MonotonicProcessor};
pub use crate::layer::{find_objects, BucketSlices, CollisionLayer, FindObjectsResult};
pub use crate::find_pairs::{FindPairs, FindPairsResult};
pub use crate::narrowphase::{distance_between, distance_between_point};
pub use crate::pair_stream::{
    PairFlags, PairHandle, PairMut, PairRef, PairSide, PairStream, ParallelWriter, StreamKind,
};
