//! Pairwise similarity scoring.
use std::sync::Arc;

use rayon::prelude::*;

use crate::config::ScoringConfig;
use crate::document::AnalyzedDocument;
use crate::index::RepositoryEntry;
use crate::result::{ComparisonMatch, ContributionBreakdown};
use crate::segments::{self, MatchedSegment, TokenSpan};

/// Scorer of an incoming document against repository entries.
///
/// The score of a pair is derived from the fraction `s` of shared n-grams, relative to the
/// smaller n-gram set, and a confidence multiplier `m` computed from the simhash distance:
///
/// ```text
/// score = s * (m + (1 - m) * s)
/// ```
///
/// For a fixed `m` the score is non-decreasing in `s` and reaches 1 when one document's
/// n-grams are contained in the other's. A pair sharing fewer than `min_containment_ngrams`
/// n-grams scores `s * m` instead, so a short entry matching a handful of common phrases
/// is still capped by a distant simhash.
#[derive(Clone, Copy, Debug)]
pub struct SimilarityScorer {
    config: ScoringConfig,
}

impl SimilarityScorer {
    /// Creates an instance. The configuration is assumed to be validated.
    pub const fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Computes the confidence multiplier of a simhash distance.
    pub fn confidence(&self, distance: usize) -> f64 {
        let ScoringConfig {
            near_distance: near,
            far_distance: far,
            min_confidence,
            ..
        } = self.config;
        if distance <= near {
            1.
        } else if distance >= far {
            min_confidence
        } else {
            let t = (distance - near) as f64 / (far - near) as f64;
            1. - t * (1. - min_confidence)
        }
    }

    /// Combines an n-gram base score from `shared` n-grams with a simhash distance.
    pub fn combine(&self, base: f64, shared: usize, distance: usize) -> f64 {
        let base = base.clamp(0., 1.);
        let m = self.confidence(distance);
        if shared < self.config.min_containment_ngrams {
            return base * m;
        }
        // Same as `base * (m + (1 - m) * base)`, exact at both ends.
        (base - (1. - m) * base * (1. - base)).clamp(0., 1.)
    }

    /// Scores one candidate, or returns `None` if the pair is not worth reporting.
    pub fn score(
        &self,
        incoming: &AnalyzedDocument,
        entry: &RepositoryEntry,
    ) -> Option<ComparisonMatch> {
        let fp_a = &incoming.fingerprint;
        let fp_b = entry.fingerprint();

        let shared = fp_a.shared_ngrams(fp_b);
        if shared == 0 {
            return None;
        }
        let denom = fp_a.num_ngrams().min(fp_b.num_ngrams());
        let base = shared as f64 / denom as f64;
        let distance = lsh::hamming_distance(fp_a.simhash(), fp_b.simhash()) as usize;
        let confidence = self.confidence(distance);
        let score = self.combine(base, shared, distance);
        if score < self.config.min_report_score {
            return None;
        }

        let segments: Vec<_> =
            segments::reconstruct(fp_a, fp_b, self.config.max_positions_per_ngram)
                .into_iter()
                .filter(|(a, _)| a.len() >= self.config.min_segment_tokens)
                .map(|(a, b)| self.segment(incoming, a, b))
                .collect();
        let matched_tokens = segments.iter().map(|s| s.incoming.len()).sum();

        Some(ComparisonMatch {
            entry_id: entry.id,
            document_id: entry.document.meta.id.clone(),
            document_name: entry.document.meta.name.clone(),
            score,
            segments,
            breakdown: ContributionBreakdown {
                exact_duplicate: false,
                shared_ngrams: shared,
                ngram_score: base,
                simhash_distance: distance,
                confidence,
                matched_tokens,
            },
        })
    }

    /// Builds the match of an entry whose normalized text equals the incoming one.
    pub fn exact_match(
        &self,
        incoming: &AnalyzedDocument,
        entry: &RepositoryEntry,
    ) -> ComparisonMatch {
        let word_count = incoming.word_count();
        let distance =
            lsh::hamming_distance(incoming.fingerprint.simhash(), entry.fingerprint().simhash())
                as usize;
        let segment = self.segment(
            incoming,
            TokenSpan::new(0, word_count),
            TokenSpan::new(0, entry.document.word_count()),
        );
        ComparisonMatch {
            entry_id: entry.id,
            document_id: entry.document.meta.id.clone(),
            document_name: entry.document.meta.name.clone(),
            score: 1.,
            segments: vec![segment],
            breakdown: ContributionBreakdown {
                exact_duplicate: true,
                shared_ngrams: incoming.fingerprint.num_ngrams(),
                ngram_score: 1.,
                simhash_distance: distance,
                confidence: 1.,
                matched_tokens: word_count,
            },
        }
    }

    /// Scores candidates in parallel.
    ///
    /// Matches are sorted by score in descending order, then by entry id.
    pub fn score_all(
        &self,
        incoming: &AnalyzedDocument,
        entries: &[Arc<RepositoryEntry>],
    ) -> Vec<ComparisonMatch> {
        let mut matches: Vec<_> = entries
            .par_iter()
            .filter_map(|entry| self.score(incoming, entry))
            .collect();
        sort_matches(&mut matches);
        matches
    }

    fn segment(&self, incoming: &AnalyzedDocument, a: TokenSpan, b: TokenSpan) -> MatchedSegment {
        MatchedSegment {
            incoming: a,
            repository: b,
            excerpt: incoming
                .normalized
                .excerpt(a.range(), self.config.max_excerpt_chars),
        }
    }
}

/// Sorts matches by score in descending order, then by entry id.
pub fn sort_matches(matches: &mut [ComparisonMatch]) {
    matches.sort_by(|x, y| {
        y.score
            .total_cmp(&x.score)
            .then_with(|| x.entry_id.cmp(&y.entry_id))
    });
}
