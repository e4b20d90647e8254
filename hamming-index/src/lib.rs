//! This library provides a range search on binary sketches in the Hamming space,
//! backed by a [multi-index](https://doi.org/10.1109/TKDE.2019.2899597) of exact block buckets.
//!
//! A sketch is split into a fixed number of disjoint bit blocks. By the pigeonhole principle,
//! two sketches within Hamming distance `r` differ in at most `r / num_blocks` bits on at
//! least one block, so probing the buckets within that many bits of each query block finds
//! every neighbor.
#![deny(missing_docs)]

pub mod bucket_index;
pub mod errors;
pub mod sketch;

pub use bucket_index::{max_radius, BucketIndex, MAX_FLIPPED_BITS};
pub use errors::{HammingIndexError, Result};
pub use sketch::Sketch;
