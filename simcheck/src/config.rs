//! Engine configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or [`SimcheckConfig::default()`]) is a
//! working configuration. The n-gram size and the classification thresholds are policy
//! choices, not properties of the algorithm.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classify::Thresholds;
use crate::errors::{Result, SimcheckError};

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimcheckConfig {
    /// Fingerprint generation.
    #[serde(default)]
    pub fingerprint: FingerprintConfig,
    /// Input limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Candidate selection.
    #[serde(default)]
    pub candidates: CandidateConfig,
    /// Pairwise scoring and segment reporting.
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Classification policy.
    #[serde(default)]
    pub thresholds: Thresholds,
}

/// Parameters of the fingerprint generator.
///
/// Changing any of them invalidates fingerprints already stored in a repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FingerprintConfig {
    /// Tokens per n-gram used for indexing and segment matching.
    #[serde(default = "default_ngram_size")]
    pub ngram_size: usize,
    /// Tokens per shingle fed into the simhash.
    #[serde(default = "default_simhash_window")]
    pub simhash_window: usize,
    /// Seed of the shingle hash.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_ngram_size() -> usize {
    3
}
fn default_simhash_window() -> usize {
    3
}
fn default_seed() -> u64 {
    42
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            ngram_size: default_ngram_size(),
            simhash_window: default_simhash_window(),
            seed: default_seed(),
        }
    }
}

/// Hard limits checked before fingerprinting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum number of words after normalization.
    #[serde(default = "default_max_word_count")]
    pub max_word_count: usize,
}

fn default_max_word_count() -> usize {
    50_000
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_word_count: default_max_word_count(),
        }
    }
}

/// Parameters of the candidate selector and the simhash buckets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CandidateConfig {
    /// Maximum simhash Hamming distance for a bucket hit.
    #[serde(default = "default_max_hamming_distance")]
    pub max_hamming_distance: usize,
    /// Number of simhash blocks in the bucket index. A lookup flips up to
    /// `max_hamming_distance / num_blocks` bits per block, which must not exceed 2.
    #[serde(default = "default_num_blocks")]
    pub num_blocks: usize,
    /// Minimum number of distinct shared n-grams for an inverted-index hit.
    #[serde(default = "default_min_shared_ngrams")]
    pub min_shared_ngrams: usize,
    /// Maximum number of candidates passed to the scorer.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

fn default_max_hamming_distance() -> usize {
    20
}
fn default_num_blocks() -> usize {
    16
}
fn default_min_shared_ngrams() -> usize {
    2
}
fn default_max_candidates() -> usize {
    50
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            max_hamming_distance: default_max_hamming_distance(),
            num_blocks: default_num_blocks(),
            min_shared_ngrams: default_min_shared_ngrams(),
            max_candidates: default_max_candidates(),
        }
    }
}

/// Parameters of the similarity scorer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// Matches scoring below this value are not reported.
    #[serde(default = "default_min_report_score")]
    pub min_report_score: f64,
    /// Simhash distance at or below which the n-gram score is fully trusted.
    #[serde(default = "default_near_distance")]
    pub near_distance: usize,
    /// Simhash distance at or above which the confidence bottoms out.
    #[serde(default = "default_far_distance")]
    pub far_distance: usize,
    /// Confidence multiplier for very distant simhashes.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Shared n-grams needed before a contained document is trusted regardless of the
    /// simhash distance. Fewer shared n-grams are scaled by the confidence as is.
    #[serde(default = "default_min_containment_ngrams")]
    pub min_containment_ngrams: usize,
    /// Occurrences of one n-gram paired unconditionally per document when rebuilding
    /// segments. Further occurrences are only checked against known diagonals.
    #[serde(default = "default_max_positions_per_ngram")]
    pub max_positions_per_ngram: usize,
    /// Maximum length of a segment excerpt in characters.
    #[serde(default = "default_max_excerpt_chars")]
    pub max_excerpt_chars: usize,
    /// Segments shorter than this many tokens are not reported.
    #[serde(default = "default_min_segment_tokens")]
    pub min_segment_tokens: usize,
}

fn default_min_report_score() -> f64 {
    0.05
}
fn default_near_distance() -> usize {
    6
}
fn default_far_distance() -> usize {
    28
}
fn default_min_confidence() -> f64 {
    0.5
}
fn default_min_containment_ngrams() -> usize {
    8
}
fn default_max_positions_per_ngram() -> usize {
    32
}
fn default_max_excerpt_chars() -> usize {
    400
}
fn default_min_segment_tokens() -> usize {
    3
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_report_score: default_min_report_score(),
            near_distance: default_near_distance(),
            far_distance: default_far_distance(),
            min_confidence: default_min_confidence(),
            min_containment_ngrams: default_min_containment_ngrams(),
            max_positions_per_ngram: default_max_positions_per_ngram(),
            max_excerpt_chars: default_max_excerpt_chars(),
            min_segment_tokens: default_min_segment_tokens(),
        }
    }
}

impl SimcheckConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| SimcheckError::config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|e| {
            SimcheckError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&s)
    }

    /// Checks that the values are consistent with each other.
    pub fn validate(&self) -> Result<()> {
        let fp = &self.fingerprint;
        if fp.ngram_size == 0 {
            return Err(SimcheckError::config("ngram_size must not be 0"));
        }
        if fp.simhash_window == 0 {
            return Err(SimcheckError::config("simhash_window must not be 0"));
        }
        if self.limits.max_word_count == 0 {
            return Err(SimcheckError::config("max_word_count must not be 0"));
        }

        let cand = &self.candidates;
        if cand.num_blocks == 0 || cand.num_blocks > 64 {
            return Err(SimcheckError::config("num_blocks must be in 1..=64"));
        }
        let max_radius = hamming_index::max_radius(cand.num_blocks);
        if cand.max_hamming_distance > max_radius {
            return Err(SimcheckError::config(format!(
                "max_hamming_distance ({}) must be at most {max_radius} for {} blocks",
                cand.max_hamming_distance, cand.num_blocks
            )));
        }
        if cand.min_shared_ngrams == 0 {
            return Err(SimcheckError::config("min_shared_ngrams must not be 0"));
        }
        if cand.max_candidates == 0 {
            return Err(SimcheckError::config("max_candidates must not be 0"));
        }

        let sc = &self.scoring;
        if !(0.0..=1.0).contains(&sc.min_report_score) {
            return Err(SimcheckError::config("min_report_score must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&sc.min_confidence) {
            return Err(SimcheckError::config("min_confidence must be within [0, 1]"));
        }
        if sc.far_distance <= sc.near_distance || sc.far_distance > 64 {
            return Err(SimcheckError::config(
                "far_distance must be greater than near_distance and at most 64",
            ));
        }
        if sc.max_positions_per_ngram == 0 {
            return Err(SimcheckError::config("max_positions_per_ngram must not be 0"));
        }

        self.thresholds.validate()
    }
}
