//! Candidate selection over the repository index.
use hashbrown::HashMap;

use crate::config::CandidateConfig;
use crate::document::Partition;
use crate::fingerprint::FingerprintSet;
use crate::index::{EntryId, IndexError, RepositoryIndex};

/// A repository entry worth scoring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Entry identifier.
    pub entry_id: EntryId,
    /// Shared distinct n-grams reported by the inverted index,
    /// or 0 for entries found only through the simhash buckets.
    pub shared_ngrams: usize,
    /// Simhash distance, if the entry was found through the simhash buckets.
    pub simhash_distance: Option<usize>,
}

/// Output of [`CandidateSelector::select`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CandidateSet {
    /// Entries with the same content hash, sorted by id. If not empty,
    /// `candidates` is empty.
    pub exact: Vec<EntryId>,
    /// Ranked candidates, at most `max_candidates`.
    pub candidates: Vec<Candidate>,
    /// Number of candidates before truncation.
    pub considered: usize,
    /// Whether candidates were dropped by the cap.
    pub truncated: bool,
}

impl CandidateSet {
    /// Checks if the run is short-circuited by exact duplicates.
    pub fn is_exact(&self) -> bool {
        !self.exact.is_empty()
    }

    /// Iterates over the entries to fetch, exact duplicates first.
    pub fn entry_ids(&self) -> impl Iterator<Item = EntryId> + '_ {
        self.exact
            .iter()
            .copied()
            .chain(self.candidates.iter().map(|c| c.entry_id))
    }
}

/// Selector of the repository entries an incoming document is scored against.
#[derive(Clone, Copy, Debug)]
pub struct CandidateSelector {
    config: CandidateConfig,
}

impl CandidateSelector {
    /// Creates an instance. The configuration is assumed to be validated.
    pub const fn new(config: CandidateConfig) -> Self {
        Self { config }
    }

    /// Selects candidates within `partition`.
    ///
    /// Exact duplicates short-circuit the other lookups. Otherwise simhash bucket hits and
    /// inverted-index hits are merged, ranked by shared n-grams (descending), simhash
    /// distance (ascending) and entry id, and capped at `max_candidates`.
    pub async fn select(
        &self,
        index: &dyn RepositoryIndex,
        partition: &Partition,
        fingerprint: &FingerprintSet,
    ) -> Result<CandidateSet, IndexError> {
        let mut exact = index
            .find_by_content_hash(partition, fingerprint.content_hash())
            .await?;
        if !exact.is_empty() {
            exact.sort_unstable();
            return Ok(CandidateSet {
                exact,
                ..CandidateSet::default()
            });
        }

        let bucket_hits = index
            .candidates_by_simhash_bucket(
                partition,
                fingerprint.simhash(),
                self.config.max_hamming_distance,
            )
            .await?;
        let ngram_hits = index
            .candidates_by_shared_ngrams(partition, fingerprint, self.config.min_shared_ngrams)
            .await?;

        let mut merged = HashMap::<EntryId, Candidate>::new();
        for hit in bucket_hits {
            merged.insert(
                hit.entry_id,
                Candidate {
                    entry_id: hit.entry_id,
                    shared_ngrams: 0,
                    simhash_distance: Some(hit.distance),
                },
            );
        }
        for hit in ngram_hits {
            merged
                .entry(hit.entry_id)
                .or_insert(Candidate {
                    entry_id: hit.entry_id,
                    shared_ngrams: 0,
                    simhash_distance: None,
                })
                .shared_ngrams = hit.shared;
        }

        let mut candidates: Vec<_> = merged.into_values().collect();
        candidates.sort_unstable_by(|x, y| {
            y.shared_ngrams
                .cmp(&x.shared_ngrams)
                .then_with(|| {
                    let dx = x.simhash_distance.unwrap_or(usize::MAX);
                    let dy = y.simhash_distance.unwrap_or(usize::MAX);
                    dx.cmp(&dy)
                })
                .then_with(|| x.entry_id.cmp(&y.entry_id))
        });

        let considered = candidates.len();
        let truncated = considered > self.config.max_candidates;
        candidates.truncate(self.config.max_candidates);

        Ok(CandidateSet {
            exact,
            candidates,
            considered,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FingerprintConfig;
    use crate::document::{AnalyzedDocument, DocumentMeta, GradeLevel};
    use crate::fingerprint::Fingerprinter;
    use crate::index::{InMemoryIndex, RepositoryEntry};
    use crate::normalize::normalize;

    fn partition() -> Partition {
        Partition::new(GradeLevel::new(11).unwrap(), "essay").unwrap()
    }

    fn analyze(id: &str, text: &str) -> AnalyzedDocument {
        let normalized = normalize(text).unwrap();
        let fingerprint = Fingerprinter::new(&FingerprintConfig::default())
            .unwrap()
            .fingerprint(&normalized);
        AnalyzedDocument {
            meta: DocumentMeta::new(id, id, partition()),
            normalized,
            fingerprint,
        }
    }

    fn words(prefix: &str, n: usize) -> String {
        (0..n)
            .map(|i| format!("{prefix}{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn index_with(texts: &[(&str, String)]) -> InMemoryIndex {
        let index = InMemoryIndex::new(8).unwrap();
        for (id, text) in texts {
            index
                .insert(RepositoryEntry::new(analyze(id, text)))
                .await
                .unwrap();
        }
        index
    }

    #[tokio::test]
    async fn test_exact_short_circuit() {
        let text = words("w", 30);
        let index = index_with(&[
            ("a", text.clone()),
            ("b", text.clone()),
            ("c", words("w", 20)),
        ])
        .await;
        let selector = CandidateSelector::new(CandidateConfig::default());
        let set = selector
            .select(&index, &partition(), &analyze("in", &text).fingerprint)
            .await
            .unwrap();
        assert!(set.is_exact());
        assert_eq!(set.exact.len(), 2);
        assert!(set.candidates.is_empty());
        assert_eq!(set.considered, 0);
    }

    #[tokio::test]
    async fn test_ranking_by_shared_ngrams() {
        let index = index_with(&[
            ("few", format!("{} {}", words("w", 10), words("x", 30))),
            ("many", format!("{} {}", words("w", 30), words("y", 10))),
            ("none", words("z", 40)),
        ])
        .await;
        // Bucket hits carry no shared n-grams; keep them out of the ranking.
        let selector = CandidateSelector::new(CandidateConfig {
            max_hamming_distance: 0,
            ..CandidateConfig::default()
        });
        let set = selector
            .select(&index, &partition(), &analyze("in", &words("w", 40)).fingerprint)
            .await
            .unwrap();
        assert!(!set.is_exact());
        let shared: Vec<_> = set.candidates.iter().map(|c| c.shared_ngrams).collect();
        assert_eq!(shared, vec![28, 8]);
        assert!(!set.truncated);
    }

    #[tokio::test]
    async fn test_truncation() {
        let texts: Vec<_> = (0..5)
            .map(|i| (["a", "b", "c", "d", "e"][i], format!("{} tail{i}", words("w", 20))))
            .collect();
        let index = index_with(&texts).await;
        let selector = CandidateSelector::new(CandidateConfig {
            max_candidates: 3,
            ..CandidateConfig::default()
        });
        let set = selector
            .select(&index, &partition(), &analyze("in", &words("w", 20)).fingerprint)
            .await
            .unwrap();
        assert_eq!(set.considered, 5);
        assert_eq!(set.candidates.len(), 3);
        assert!(set.truncated);
    }
}
