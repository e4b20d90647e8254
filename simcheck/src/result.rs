//! Records produced by a comparison run.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::{Status, Thresholds};
use crate::document::{DocumentMeta, Partition};
use crate::index::EntryId;
use crate::segments::MatchedSegment;

/// Version of the [`ComparisonResult`] layout.
pub const RESULT_SCHEMA_VERSION: u32 = 1;

/// What a match score is made of.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContributionBreakdown {
    /// The normalized texts are identical; the scorer was skipped.
    pub exact_duplicate: bool,
    /// Distinct n-grams present in both documents.
    pub shared_ngrams: usize,
    /// `shared_ngrams` over the n-gram count of the smaller document.
    pub ngram_score: f64,
    /// Hamming distance between the simhashes.
    pub simhash_distance: usize,
    /// Multiplier derived from `simhash_distance`.
    pub confidence: f64,
    /// Incoming tokens covered by reported segments.
    pub matched_tokens: usize,
}

/// Similarity between the incoming document and one repository entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonMatch {
    /// Matched repository entry.
    pub entry_id: EntryId,
    /// Identifier of the matched document.
    pub document_id: String,
    /// Display name of the matched document.
    pub document_name: String,
    /// Score in `[0, 1]`.
    pub score: f64,
    /// Shared passages ordered by their position in the incoming document.
    pub segments: Vec<MatchedSegment>,
    /// Score components.
    pub breakdown: ContributionBreakdown,
}

/// Typed metadata of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// See [`RESULT_SCHEMA_VERSION`].
    pub schema_version: u32,
    /// Candidates found before applying the cap, excluding exact duplicates.
    pub candidates_considered: usize,
    /// Candidates passed to the scorer.
    pub candidates_scored: usize,
    /// The candidate cap dropped some candidates.
    pub truncated: bool,
    /// An exact duplicate short-circuited the run.
    pub exact_duplicate: bool,
    /// Thresholds the status was derived with.
    pub thresholds: Thresholds,
}

/// Outcome of one comparison run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Result identifier, unique per run.
    pub id: Uuid,
    /// Identifier of the compared document.
    pub document_id: String,
    /// Submitter correlation id.
    pub submitter: Option<String>,
    /// Partition the document was compared in.
    pub partition: Partition,
    /// Highest match score, 0 without matches.
    pub highest_score: f64,
    /// `highest_score` as a percentage with one decimal, for display.
    pub highest_percentage: f64,
    /// Number of reported matches.
    pub total_matches: usize,
    /// Number of matches at or above the flagged threshold.
    pub high_risk_matches: usize,
    /// Classification of `highest_score`.
    pub status: Status,
    /// Matches, highest score first.
    pub matches: Vec<ComparisonMatch>,
    /// Run metadata.
    pub metadata: ResultMetadata,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl ComparisonResult {
    /// Aggregates sorted matches into a classified result.
    pub fn aggregate(
        meta: &DocumentMeta,
        matches: Vec<ComparisonMatch>,
        thresholds: Thresholds,
        candidates_considered: usize,
        candidates_scored: usize,
        truncated: bool,
    ) -> Self {
        let highest_score = matches.iter().map(|m| m.score).fold(0., f64::max);
        let high_risk_matches = matches
            .iter()
            .filter(|m| thresholds.is_high_risk(m.score))
            .count();
        let exact_duplicate = matches.iter().any(|m| m.breakdown.exact_duplicate);
        Self {
            id: Uuid::new_v4(),
            document_id: meta.id.clone(),
            submitter: meta.submitter.clone(),
            partition: meta.partition.clone(),
            highest_score,
            highest_percentage: (highest_score * 1000.).round() / 10.,
            total_matches: matches.len(),
            high_risk_matches,
            status: thresholds.classify(highest_score),
            matches,
            metadata: ResultMetadata {
                schema_version: RESULT_SCHEMA_VERSION,
                candidates_considered,
                candidates_scored,
                truncated,
                exact_duplicate,
                thresholds,
            },
            created_at: Utc::now(),
        }
    }

    /// Whether two results report the same scores and matches, ignoring identity and time.
    pub fn same_outcome(&self, other: &Self) -> bool {
        self.document_id == other.document_id
            && self.highest_score == other.highest_score
            && self.status == other.status
            && self.matches == other.matches
            && self.metadata == other.metadata
    }
}
