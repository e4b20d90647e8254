//! Error definitions.
use std::result;

/// A specialized Result type for this library.
pub type Result<T, E = HammingIndexError> = result::Result<T, E>;

/// Errors in this library.
#[derive(Debug, thiserror::Error)]
pub enum HammingIndexError {
    /// The number of blocks does not fit the sketch width.
    #[error("InputError: the number of blocks must be in 1..={dim}, but got {num_blocks}.")]
    InvalidBlocks {
        /// Requested number of blocks.
        num_blocks: usize,
        /// Number of dimensions of the sketch type.
        dim: usize,
    },

    /// The search radius cannot be answered without missing neighbors.
    #[error("InputError: the radius must be at most {max_radius}, but got {radius}.")]
    RadiusTooLarge {
        /// Requested radius.
        radius: usize,
        /// Largest radius the index answers.
        max_radius: usize,
    },
}
