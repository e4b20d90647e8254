//! Traits of binary short sketches of primitive integer types.
use std::hash::Hash;
use std::ops::Range;

use num_traits::int::PrimInt;
use num_traits::{FromPrimitive, ToPrimitive};

/// Trait of a binary short sketch from a primitive integer type.
pub trait Sketch: Default + Hash + PrimInt + FromPrimitive + ToPrimitive {
    /// Gets the number of dimensions.
    fn dim() -> usize;
    /// Gets the Hamming distance to the other sketch.
    fn hamdist(self, rhs: Self) -> usize;
    /// Produces a sketch for masking a given bit-position range.
    fn mask(rng: Range<usize>) -> Self;

    /// Splits the dimensions into `num_blocks` contiguous masks of (almost) equal width.
    fn block_masks(num_blocks: usize) -> Vec<Self> {
        let mut masks = Vec::with_capacity(num_blocks);
        let mut i = 0;
        for b in 0..num_blocks {
            let dim = (b + Self::dim()) / num_blocks;
            masks.push(Self::mask(i..i + dim));
            i += dim;
        }
        masks
    }
}

macro_rules! impl_sketch {
    ($t:ty, $dim:expr) => {
        impl Sketch for $t {
            #[inline(always)]
            fn dim() -> usize {
                $dim
            }
            #[inline(always)]
            fn hamdist(self, rhs: Self) -> usize {
                (self ^ rhs).count_ones() as usize
            }
            #[inline(always)]
            fn mask(rng: Range<usize>) -> Self {
                debug_assert!(rng.end <= Self::dim());
                if rng.len() == Self::dim() {
                    Self::MAX
                } else {
                    ((1 << rng.len()) - 1) << rng.start
                }
            }
        }
    };
}

impl_sketch!(u8, 8);
impl_sketch!(u16, 16);
impl_sketch!(u32, 32);
impl_sketch!(u64, 64);
