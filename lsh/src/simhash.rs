//! Frequency-weighted simhash over word shingles.
use hashbrown::HashMap;

/// [Simhash](https://doi.org/10.1145/509907.509965) sketcher producing 64-bit fingerprints.
///
/// Every feature votes on each bit position with its weight: `+w` if the bit of its
/// (re-mixed) hash is set, `-w` otherwise. An output bit is 1 iff the accumulated vote
/// is positive. Documents sharing most of their shingles therefore differ in few bits.
#[derive(Clone, Copy, Debug)]
pub struct SimHasher {
    seed: u64,
}

impl SimHasher {
    /// Creates an instance.
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Produces a sketch from weighted feature hashes.
    pub fn sketch(&self, feature: &[(u64, f64)]) -> u64 {
        let mut weights = [0f64; 64];
        for (h, x) in feature
            .iter()
            .map(|&(i, x)| (crate::hash_u64(i, self.seed), x))
        {
            for (j, w) in weights.iter_mut().enumerate() {
                if (h >> j) & 1 == 1 {
                    *w += x;
                } else {
                    *w -= x;
                }
            }
        }
        weights
            .iter()
            .enumerate()
            .fold(0, |acc, (j, w)| if *w > 0. { acc | (1 << j) } else { acc })
    }

    /// Produces a sketch from the overlapping `window`-token shingles of `tokens`,
    /// weighting each distinct shingle by its frequency.
    ///
    /// A token sequence shorter than `window` is treated as a single shingle.
    pub fn sketch_shingles<T>(&self, tokens: &[T], window: usize) -> u64
    where
        T: AsRef<str>,
    {
        if tokens.is_empty() {
            return 0;
        }
        let window = window.clamp(1, tokens.len());
        let mut counter = HashMap::<u64, usize>::new();
        for shingle in tokens.windows(window) {
            *counter
                .entry(crate::hash_shingle(shingle, self.seed))
                .or_insert(0) += 1;
        }
        let mut feature: Vec<_> = counter.into_iter().map(|(h, c)| (h, c as f64)).collect();
        // Fixed order keeps the floating-point accumulation reproducible.
        feature.sort_unstable_by_key(|&(h, _)| h);
        self.sketch(&feature)
    }
}
