//! Reconstruction of contiguous shared passages from n-gram hits.
//!
//! Every occurrence pair of a shared n-gram is a hit `(a, b)` of an incoming offset `a`
//! and a repository offset `b`. A copied passage shows up as hits on one diagonal
//! `a - b` with consecutive `a`, so hits are sorted by diagonal and merged into runs.
//! A run of `k` hits covers `k + n - 1` tokens in both documents.
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::fingerprint::FingerprintSet;

/// Half-open range of token offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenSpan {
    /// First token.
    pub start: usize,
    /// One past the last token.
    pub end: usize,
}

impl TokenSpan {
    /// Creates a span.
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Gets the number of tokens.
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Checks if the span covers no token.
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Checks if two spans share at least one token.
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Converts into a range.
    pub const fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// A passage shared by the incoming document and a repository document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedSegment {
    /// Tokens of the incoming document.
    pub incoming: TokenSpan,
    /// Tokens of the repository document.
    pub repository: TokenSpan,
    /// Normalized incoming text of the passage, possibly truncated.
    pub excerpt: String,
}

#[derive(Clone, Copy, Debug)]
struct Run {
    diag: isize,
    start_a: usize,
    start_b: usize,
    /// Tokens covered in both documents.
    len: usize,
}

impl Run {
    const fn end_a(&self) -> usize {
        self.start_a + self.len
    }
}

/// Rebuilds the shared passages of two documents.
///
/// An n-gram occurring more than `max_positions` times in either document only pairs its
/// first `max_positions` occurrences, plus every occurrence lying on a diagonal already
/// found through the other n-grams. Runs on one diagonal that overlap or touch are merged.
/// The returned span pairs do not overlap in either document and are ordered by their
/// incoming offset.
pub fn reconstruct(
    incoming: &FingerprintSet,
    candidate: &FingerprintSet,
    max_positions: usize,
) -> Vec<(TokenSpan, TokenSpan)> {
    let mut hits = vec![];
    let mut frequent = vec![];
    for (ngram, positions_a) in incoming.ngrams() {
        if let Some(positions_b) = candidate.positions(ngram) {
            if positions_a.len() > max_positions || positions_b.len() > max_positions {
                frequent.push((positions_a, positions_b));
            }
            for &a in positions_a.iter().take(max_positions) {
                for &b in positions_b.iter().take(max_positions) {
                    hits.push((a as isize - b as isize, a, b));
                }
            }
        }
    }
    if hits.is_empty() {
        return vec![];
    }

    if !frequent.is_empty() {
        let mut diags: Vec<_> = hits.iter().map(|&(diag, _, _)| diag).collect();
        diags.sort_unstable();
        diags.dedup();
        for (positions_a, positions_b) in frequent {
            for &a in positions_a {
                for &diag in &diags {
                    let b = a as isize - diag;
                    if b >= 0 && positions_b.binary_search(&(b as usize)).is_ok() {
                        hits.push((diag, a, b as usize));
                    }
                }
            }
        }
    }
    hits.sort_unstable();
    hits.dedup();

    let span = incoming.ngram_span();
    let mut runs: Vec<Run> = vec![];
    for (diag, a, b) in hits {
        // Hits arrive ordered by diagonal, then by incoming offset.
        if let Some(run) = runs
            .last_mut()
            .filter(|run| run.diag == diag && a <= run.end_a())
        {
            run.len = run.len.max(a + span - run.start_a);
            continue;
        }
        runs.push(Run {
            diag,
            start_a: a,
            start_b: b,
            len: span,
        });
    }

    // Longest first; ties broken by position so the choice is deterministic.
    runs.sort_unstable_by(|x, y| {
        y.len
            .cmp(&x.len)
            .then(x.start_a.cmp(&y.start_a))
            .then(x.start_b.cmp(&y.start_b))
    });

    let mut kept: Vec<(TokenSpan, TokenSpan)> = vec![];
    for run in runs {
        let a = TokenSpan::new(run.start_a, run.end_a());
        let b = TokenSpan::new(run.start_b, run.start_b + run.len);
        if kept
            .iter()
            .all(|(ka, kb)| !ka.overlaps(&a) && !kb.overlaps(&b))
        {
            kept.push((a, b));
        }
    }
    kept.sort_unstable();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FingerprintConfig;
    use crate::fingerprint::Fingerprinter;
    use crate::normalize::normalize;

    fn fp(text: &str) -> FingerprintSet {
        Fingerprinter::new(&FingerprintConfig::default())
            .unwrap()
            .fingerprint(&normalize(text).unwrap())
    }

    fn words(prefix: &str, n: usize) -> String {
        (0..n)
            .map(|i| format!("{prefix}{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    const PASSAGE: &str = "p0 p1 p2 p3 p4 p5 p6 p7 p8 p9";

    #[test]
    fn test_verbatim_passage_is_one_segment() {
        let a = fp(&format!("alpha beta {PASSAGE} gamma"));
        let b = fp(&format!("one two three four {PASSAGE} five six"));
        let segments = reconstruct(&a, &b, 32);
        assert_eq!(
            segments,
            vec![(TokenSpan::new(2, 12), TokenSpan::new(4, 14))]
        );
    }

    #[test]
    fn test_segments_follow_incoming_order() {
        let a = fp("q0 q1 q2 q3 x y z r0 r1 r2 r3");
        let b = fp("r0 r1 r2 r3 u v q0 q1 q2 q3");
        let segments = reconstruct(&a, &b, 32);
        assert_eq!(
            segments,
            vec![
                (TokenSpan::new(0, 4), TokenSpan::new(6, 10)),
                (TokenSpan::new(7, 11), TokenSpan::new(0, 4)),
            ]
        );
    }

    #[test]
    fn test_repeated_ngram_is_reported_once() {
        let a = fp("a b c a b c");
        let b = fp("a b c");
        let segments = reconstruct(&a, &b, 32);
        assert_eq!(segments, vec![(TokenSpan::new(0, 3), TokenSpan::new(0, 3))]);
    }

    #[test]
    fn test_frequent_ngram_inside_passage() {
        let passage = format!("{} x y z {}", words("q", 10), words("r", 10));
        let a = fp(&format!("intro0 intro1 {passage}"));
        let b = fp(&format!("{}{passage}", "x y z ".repeat(40)));
        let segments = reconstruct(&a, &b, 32);
        assert_eq!(
            segments,
            vec![(TokenSpan::new(2, 25), TokenSpan::new(120, 143))]
        );
    }

    #[test]
    fn test_gap_of_missing_hits_is_not_bridged() {
        let a = fp("p0 p1 p2 p3 p4 new p6 p7 p8 p9 p10");
        let b = fp("p0 p1 p2 p3 p4 p5 p6 p7 p8 p9 p10");
        let segments = reconstruct(&a, &b, 32);
        assert_eq!(
            segments,
            vec![
                (TokenSpan::new(0, 5), TokenSpan::new(0, 5)),
                (TokenSpan::new(6, 11), TokenSpan::new(6, 11)),
            ]
        );
    }

    #[test]
    fn test_no_shared_ngrams() {
        let a = fp("one two three four");
        let b = fp("five six seven eight");
        assert!(reconstruct(&a, &b, 32).is_empty());
    }

    #[test]
    fn test_span_overlaps() {
        let x = TokenSpan::new(0, 3);
        assert!(x.overlaps(&TokenSpan::new(2, 5)));
        assert!(!x.overlaps(&TokenSpan::new(3, 5)));
        assert_eq!(x.len(), 3);
        assert!(TokenSpan::new(4, 4).is_empty());
    }
}
