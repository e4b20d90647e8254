//! Locality-sensitive hashing over word shingles.
#![deny(missing_docs)]

pub mod simhash;

use rand_xoshiro::rand_core::{RngCore, SeedableRng};
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Separates tokens inside a shingle so that `["ab", "c"]` and `["a", "bc"]` hash differently.
const TOKEN_SEPARATOR: u8 = 0x1f;

/// Mixes a 64-bit value with a seed.
#[inline(always)]
pub fn hash_u64(x: u64, seed: u64) -> u64 {
    rand_xoshiro::SplitMix64::seed_from_u64(x ^ seed).next_u64()
}

/// Hashes a shingle of tokens into 64 bits.
///
/// # Examples
///
/// ```
/// use lsh::hash_shingle;
///
/// assert_eq!(hash_shingle(&["a", "b"], 7), hash_shingle(&["a", "b"], 7));
/// assert_ne!(hash_shingle(&["ab", "c"], 7), hash_shingle(&["a", "bc"], 7));
/// ```
pub fn hash_shingle<T>(tokens: &[T], seed: u64) -> u64
where
    T: AsRef<str>,
{
    let len = tokens.iter().map(|t| t.as_ref().len() + 1).sum();
    let mut buf = Vec::with_capacity(len);
    for (i, t) in tokens.iter().enumerate() {
        if i != 0 {
            buf.push(TOKEN_SEPARATOR);
        }
        buf.extend_from_slice(t.as_ref().as_bytes());
    }
    xxh3_64_with_seed(&buf, seed)
}

/// Computes the Hamming distance between two 64-bit sketches.
///
/// # Examples
///
/// ```
/// use lsh::hamming_distance;
///
/// assert_eq!(hamming_distance(0b1011, 0b0001), 2);
/// ```
#[inline(always)]
pub const fn hamming_distance(lhs: u64, rhs: u64) -> u32 {
    (lhs ^ rhs).count_ones()
}
