//! Bucket index answering Hamming range queries without scanning every sketch.
use std::hash::Hash;

use hashbrown::HashMap;

use crate::errors::{HammingIndexError, Result};
use crate::sketch::Sketch;

/// Maximum number of bits flipped inside one block when looking up buckets.
pub const MAX_FLIPPED_BITS: usize = 2;

/// Multi-index of exact block buckets over sketches of type `S`, identified by keys of type `K`.
///
/// Each of the `num_blocks` tables maps the masked bits of one block to the keys whose
/// sketches carry exactly those bits. A query with radius `r` looks up, in every table, the
/// buckets within `r / num_blocks` bits of the query block, and verifies the full Hamming
/// distance of every colliding key.
#[derive(Clone, Debug)]
pub struct BucketIndex<S, K> {
    masks: Vec<S>,
    block_bits: Vec<Vec<usize>>,
    tables: Vec<HashMap<S, Vec<K>>>,
    sketches: HashMap<K, S>,
}

impl<S, K> BucketIndex<S, K>
where
    S: Sketch,
    K: Copy + Eq + Hash + Ord,
{
    /// Creates an instance splitting sketches into `num_blocks` blocks.
    ///
    /// Queries are answered exactly for radii up to [`Self::max_radius`].
    /// More blocks allow larger radii, but make each bucket coarser.
    pub fn new(num_blocks: usize) -> Result<Self> {
        if num_blocks == 0 || num_blocks > S::dim() {
            return Err(HammingIndexError::InvalidBlocks {
                num_blocks,
                dim: S::dim(),
            });
        }
        let masks = S::block_masks(num_blocks);
        let block_bits = masks
            .iter()
            .map(|&mask| {
                (0..S::dim())
                    .filter(|&j| mask & (S::one() << j) != S::zero())
                    .collect()
            })
            .collect();
        Ok(Self {
            masks,
            block_bits,
            tables: vec![HashMap::new(); num_blocks],
            sketches: HashMap::new(),
        })
    }

    /// Inserts a sketch, replacing the one previously stored under `key`.
    pub fn insert(&mut self, key: K, sketch: S) -> Option<S> {
        let old = self.remove(&key);
        for (mask, table) in self.masks.iter().zip(self.tables.iter_mut()) {
            table.entry(sketch & *mask).or_default().push(key);
        }
        self.sketches.insert(key, sketch);
        old
    }

    /// Removes the sketch stored under `key`.
    pub fn remove(&mut self, key: &K) -> Option<S> {
        let sketch = self.sketches.remove(key)?;
        for (mask, table) in self.masks.iter().zip(self.tables.iter_mut()) {
            let block = sketch & *mask;
            if let Some(bucket) = table.get_mut(&block) {
                bucket.retain(|k| k != key);
                if bucket.is_empty() {
                    table.remove(&block);
                }
            }
        }
        Some(sketch)
    }

    /// Gets the sketch stored under `key`.
    pub fn get(&self, key: &K) -> Option<S> {
        self.sketches.get(key).copied()
    }

    /// Finds all keys whose sketches are within Hamming distance `radius` of `sketch`,
    /// returning pairs of the key and its distance sorted by distance and then key.
    pub fn query(&self, sketch: S, radius: usize) -> Result<Vec<(K, usize)>> {
        if radius > self.max_radius() {
            return Err(HammingIndexError::RadiusTooLarge {
                radius,
                max_radius: self.max_radius(),
            });
        }
        // At least one block differs in at most `radius / num_blocks` bits.
        let flip_bits = radius / self.num_blocks();
        let mut candidates = vec![];
        let mut keys = vec![];
        for ((mask, bits), table) in self
            .masks
            .iter()
            .zip(self.block_bits.iter())
            .zip(self.tables.iter())
        {
            keys.clear();
            keys.push(sketch & *mask);
            push_flipped(sketch & *mask, bits, flip_bits, &mut keys);
            for key in &keys {
                if let Some(bucket) = table.get(key) {
                    candidates.extend_from_slice(bucket);
                }
            }
        }
        candidates.sort_unstable();
        candidates.dedup();

        let mut matched: Vec<_> = candidates
            .into_iter()
            .filter_map(|key| {
                let dist = self.sketches.get(&key)?.hamdist(sketch);
                (dist <= radius).then_some((key, dist))
            })
            .collect();
        matched.sort_unstable_by_key(|&(key, dist)| (dist, key));
        Ok(matched)
    }

    /// Gets the number of blocks.
    pub fn num_blocks(&self) -> usize {
        self.masks.len()
    }

    /// Gets the largest radius a query accepts.
    pub fn max_radius(&self) -> usize {
        max_radius(self.num_blocks())
    }

    /// Gets the number of stored sketches.
    pub fn len(&self) -> usize {
        self.sketches.len()
    }

    /// Checks if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.sketches.is_empty()
    }

    /// Gets the number of non-empty buckets over all tables.
    pub fn num_buckets(&self) -> usize {
        self.tables.iter().map(|t| t.len()).sum()
    }
}

/// Gets the largest radius answered exactly by an index of `num_blocks` blocks.
pub const fn max_radius(num_blocks: usize) -> usize {
    num_blocks * (MAX_FLIPPED_BITS + 1) - 1
}

/// Appends every variant of `block` with between 1 and `depth` of `bits` flipped.
fn push_flipped<S: Sketch>(block: S, bits: &[usize], depth: usize, out: &mut Vec<S>) {
    if depth == 0 {
        return;
    }
    for (i, &j) in bits.iter().enumerate() {
        let flipped = block ^ (S::one() << j);
        out.push(flipped);
        push_flipped(flipped, &bits[i + 1..], depth - 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_sketches() -> Vec<u16> {
        vec![
            0b_1110_0011_1111_1011, // 0
            0b_0001_0111_0111_1101, // 1
            0b_1100_1101_1000_1100, // 2
            0b_1100_1101_0001_0100, // 3
            0b_1010_1110_0010_1010, // 4
            0b_0111_1001_0011_1111, // 5
            0b_1110_0011_0001_0000, // 6
            0b_1000_0111_1001_0101, // 7
            0b_1110_1101_1000_1101, // 8
            0b_0111_1001_0011_1001, // 9
        ]
    }

    fn naive_search(sketches: &[u16], query: u16, radius: usize) -> Vec<(usize, usize)> {
        let mut results: Vec<_> = sketches
            .iter()
            .enumerate()
            .map(|(i, &s)| (i, s.hamdist(query)))
            .filter(|&(_, d)| d <= radius)
            .collect();
        results.sort_unstable_by_key(|&(i, d)| (d, i));
        results
    }

    #[test]
    fn test_query_for_all() {
        let sketches = example_sketches();
        let mut index = BucketIndex::new(8).unwrap();
        for (i, &s) in sketches.iter().enumerate() {
            index.insert(i, s);
        }
        for &query in &sketches {
            for radius in 0..=16 {
                assert_eq!(
                    index.query(query, radius).unwrap(),
                    naive_search(&sketches, query, radius)
                );
            }
        }
    }

    #[test]
    fn test_remove() {
        let sketches = example_sketches();
        let mut index = BucketIndex::new(4).unwrap();
        for (i, &s) in sketches.iter().enumerate() {
            index.insert(i, s);
        }
        assert_eq!(index.remove(&5), Some(sketches[5]));
        assert_eq!(index.remove(&5), None);
        assert_eq!(index.len(), 9);
        let found = index.query(sketches[5], 0).unwrap();
        assert!(found.is_empty());
        let found = index.query(sketches[9], 3).unwrap();
        assert_eq!(found, vec![(9, 0)]);
    }

    #[test]
    fn test_insert_replaces() {
        let mut index = BucketIndex::<u64, u32>::new(4).unwrap();
        assert_eq!(index.insert(1, 0), None);
        assert_eq!(index.insert(1, u64::MAX), Some(0));
        assert_eq!(index.len(), 1);
        assert!(index.query(0, 3).unwrap().is_empty());
        assert_eq!(index.query(u64::MAX, 0).unwrap(), vec![(1, 0)]);
        assert_eq!(index.num_buckets(), 4);
    }

    #[test]
    fn test_invalid_blocks() {
        assert!(BucketIndex::<u8, u32>::new(0).is_err());
        assert!(BucketIndex::<u8, u32>::new(9).is_err());
        assert!(BucketIndex::<u8, u32>::new(8).is_ok());
    }

    #[test]
    fn test_query_with_flipped_bits() {
        let mut index = BucketIndex::<u64, u32>::new(8).unwrap();
        // Two bits differ in every 8-bit block.
        index.insert(1, 0x0303_0303_0303_0303);
        index.insert(2, u64::MAX);
        assert_eq!(index.query(0, 15).unwrap(), vec![]);
        assert_eq!(index.query(0, 16).unwrap(), vec![(1, 16)]);
    }

    #[test]
    fn test_flipped_variants() {
        let mut out = vec![];
        push_flipped(0u8, &[0, 1, 2], 2, &mut out);
        out.sort_unstable();
        assert_eq!(out, vec![0b001, 0b010, 0b011, 0b100, 0b101, 0b110]);
    }

    #[test]
    fn test_radius_too_large() {
        let index = BucketIndex::<u64, u32>::new(4).unwrap();
        assert_eq!(index.max_radius(), 11);
        assert!(index.query(0, 11).is_ok());
        assert!(matches!(
            index.query(0, 12),
            Err(HammingIndexError::RadiusTooLarge { radius: 12, max_radius: 11 })
        ));
    }
}
