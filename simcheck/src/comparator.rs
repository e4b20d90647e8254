//! Comparison orchestrator.
//!
//! A run goes through the stages of [`RunStage`] in order. Every failure is terminal for
//! the run and reported with the stage it happened at; nothing is persisted by a run that
//! does not reach [`RunStage::Persisted`].
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::SimcheckConfig;
use crate::document::{AnalyzedDocument, IncomingDocument, Partition};
use crate::errors::{Result, SimcheckError};
use crate::fingerprint::Fingerprinter;
use crate::index::{EntryId, EntrySummary, IndexError, RepositoryEntry, RepositoryIndex};
use crate::normalize::{normalize, NormalizedText};
use crate::result::ComparisonResult;
use crate::scorer::{sort_matches, SimilarityScorer};
use crate::selector::CandidateSelector;
use crate::store::ResultStore;

/// Stages of a comparison run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStage {
    /// The document was accepted.
    Received,
    /// The text was normalized.
    Normalized,
    /// Fingerprints were computed.
    Fingerprinted,
    /// Candidates were looked up in the index.
    CandidatesSelected,
    /// Candidates were scored.
    Scored,
    /// The result was classified.
    Classified,
    /// The result was persisted.
    Persisted,
}

impl RunStage {
    /// Gets the kebab-case name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Normalized => "normalized",
            Self::Fingerprinted => "fingerprinted",
            Self::CandidatesSelected => "candidates-selected",
            Self::Scored => "scored",
            Self::Classified => "classified",
            Self::Persisted => "persisted",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry point of the similarity engine.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use simcheck::{
///     Comparator, DocumentMeta, GradeLevel, InMemoryIndex, InMemoryResultStore,
///     IncomingDocument, Partition, SimcheckConfig, Status,
/// };
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let config = SimcheckConfig::default();
/// let index = Arc::new(InMemoryIndex::new(config.candidates.num_blocks).unwrap());
/// let store = Arc::new(InMemoryResultStore::new());
/// let comparator = Comparator::new(config, index, store).unwrap();
///
/// let partition = Partition::new(GradeLevel::new(10).unwrap(), "essay").unwrap();
/// let text = "The water cycle moves water between the oceans, the air and the land.";
/// let meta = DocumentMeta::new("old", "old.pdf", partition.clone());
/// let stored = IncomingDocument::new(meta, text);
/// comparator.ingest(&stored).await.unwrap();
///
/// let incoming = IncomingDocument::new(DocumentMeta::new("new", "new.pdf", partition), text);
/// let result = comparator.compare(&incoming).await.unwrap();
/// assert_eq!(result.status, Status::Flagged);
/// assert_eq!(result.highest_score, 1.);
/// # });
/// ```
pub struct Comparator {
    config: SimcheckConfig,
    fingerprinter: Fingerprinter,
    selector: CandidateSelector,
    scorer: SimilarityScorer,
    index: Arc<dyn RepositoryIndex>,
    results: Arc<dyn ResultStore>,
}

impl Comparator {
    /// Creates an instance.
    ///
    /// # Errors
    ///
    /// An error will be returned if the configuration is inconsistent.
    pub fn new(
        config: SimcheckConfig,
        index: Arc<dyn RepositoryIndex>,
        results: Arc<dyn ResultStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fingerprinter: Fingerprinter::new(&config.fingerprint)?,
            selector: CandidateSelector::new(config.candidates),
            scorer: SimilarityScorer::new(config.scoring),
            config,
            index,
            results,
        })
    }

    /// Gets the configuration.
    pub const fn config(&self) -> &SimcheckConfig {
        &self.config
    }

    /// Normalizes and fingerprints a document without touching the index.
    pub fn analyze(&self, doc: &IncomingDocument) -> Result<AnalyzedDocument> {
        let normalized = self.normalize(doc)?;
        Ok(self.fingerprint(doc, normalized))
    }

    /// Compares a document against its partition and persists the result.
    /// The index is never modified.
    pub async fn compare(&self, doc: &IncomingDocument) -> Result<ComparisonResult> {
        self.compare_with_cancel(doc, &CancellationToken::new()).await
    }

    /// Same as [`Self::compare`], but gives up as soon as `cancel` is triggered.
    ///
    /// Cancellation is observed after normalization, after fingerprinting and after
    /// candidate selection.
    pub async fn compare_with_cancel(
        &self,
        doc: &IncomingDocument,
        cancel: &CancellationToken,
    ) -> Result<ComparisonResult> {
        let span = info_span!(
            "compare",
            document_id = %doc.meta.id,
            partition = %doc.meta.partition,
        );
        let outcome = self.run_compare(doc, cancel).instrument(span.clone()).await;
        if let Err(e) = &outcome {
            span.in_scope(|| warn!(kind = e.kind(), stage = ?e.stage(), "comparison failed: {e}"));
        }
        outcome
    }

    async fn run_compare(
        &self,
        doc: &IncomingDocument,
        cancel: &CancellationToken,
    ) -> Result<ComparisonResult> {
        let document_id = &doc.meta.id;
        debug!(stage = %RunStage::Received, bytes = doc.raw_text.len());

        let normalized = self.normalize(doc)?;
        check_cancel(cancel, RunStage::Normalized, document_id)?;

        let analyzed = self.fingerprint(doc, normalized);
        check_cancel(cancel, RunStage::Fingerprinted, document_id)?;

        let index_err = |source: IndexError| SimcheckError::IndexUnavailable {
            stage: RunStage::CandidatesSelected,
            document_id: document_id.clone(),
            source,
        };
        let selection = self
            .selector
            .select(self.index.as_ref(), analyzed.partition(), &analyzed.fingerprint)
            .await
            .map_err(index_err)?;
        if selection.truncated {
            warn!(
                considered = selection.considered,
                kept = selection.candidates.len(),
                "candidate set truncated"
            );
        }

        let mut entries = Vec::with_capacity(selection.exact.len() + selection.candidates.len());
        for entry_id in selection.entry_ids() {
            match self.index.get(entry_id).await.map_err(index_err)? {
                Some(entry) => entries.push(entry),
                // Removed between the lookups.
                None => debug!(%entry_id, "candidate vanished"),
            }
        }
        debug!(
            stage = %RunStage::CandidatesSelected,
            exact = selection.exact.len(),
            candidates = entries.len(),
        );
        check_cancel(cancel, RunStage::CandidatesSelected, document_id)?;

        let (matches, scored) = if selection.is_exact() {
            let mut matches: Vec<_> = entries
                .iter()
                .map(|entry| self.scorer.exact_match(&analyzed, entry))
                .collect();
            sort_matches(&mut matches);
            (matches, 0)
        } else {
            (self.scorer.score_all(&analyzed, &entries), entries.len())
        };
        debug!(stage = %RunStage::Scored, matches = matches.len());

        let result = ComparisonResult::aggregate(
            &doc.meta,
            matches,
            self.config.thresholds,
            selection.considered,
            scored,
            selection.truncated,
        );
        debug!(stage = %RunStage::Classified, status = %result.status);

        self.results
            .persist(&result)
            .await
            .map_err(|source| SimcheckError::Persistence {
                document_id: document_id.clone(),
                source,
            })?;
        info!(
            result_id = %result.id,
            status = %result.status,
            highest_score = result.highest_score,
            total_matches = result.total_matches,
            "comparison finished"
        );
        Ok(result)
    }

    /// Adds a document to the repository.
    ///
    /// Ingestion never deduplicates: ingesting the same document twice yields two entries.
    pub async fn ingest(&self, doc: &IncomingDocument) -> Result<Arc<RepositoryEntry>> {
        let span = info_span!(
            "ingest",
            document_id = %doc.meta.id,
            partition = %doc.meta.partition,
        );
        self.run_ingest(doc).instrument(span).await
    }

    async fn run_ingest(&self, doc: &IncomingDocument) -> Result<Arc<RepositoryEntry>> {
        let analyzed = self.analyze(doc)?;
        let entry = self
            .index
            .insert(RepositoryEntry::new(analyzed))
            .await
            .map_err(|source| SimcheckError::IndexUnavailable {
                stage: RunStage::Persisted,
                document_id: doc.meta.id.clone(),
                source,
            })?;
        info!(entry_id = %entry.id, words = entry.document.word_count(), "document ingested");
        Ok(entry)
    }

    /// Lists the entries of a partition.
    pub async fn list(&self, partition: &Partition) -> Result<Vec<EntrySummary>> {
        self.index
            .list(partition)
            .await
            .map_err(SimcheckError::Repository)
    }

    /// Removes an entry, returning whether it existed.
    pub async fn remove(&self, entry_id: EntryId) -> Result<bool> {
        let removed = self
            .index
            .remove(entry_id)
            .await
            .map_err(SimcheckError::Repository)?;
        info!(%entry_id, removed, "repository entry removal");
        Ok(removed)
    }

    fn normalize(&self, doc: &IncomingDocument) -> Result<NormalizedText> {
        let normalized =
            normalize(&doc.raw_text).ok_or_else(|| SimcheckError::EmptyDocument {
                document_id: doc.meta.id.clone(),
            })?;
        let word_count = normalized.word_count();
        debug!(stage = %RunStage::Normalized, script = %normalized.script(), word_count);
        let limit = self.config.limits.max_word_count;
        if word_count > limit {
            return Err(SimcheckError::TooLarge {
                document_id: doc.meta.id.clone(),
                word_count,
                limit,
            });
        }
        Ok(normalized)
    }

    fn fingerprint(&self, doc: &IncomingDocument, normalized: NormalizedText) -> AnalyzedDocument {
        let fingerprint = self.fingerprinter.fingerprint(&normalized);
        debug!(
            stage = %RunStage::Fingerprinted,
            content_hash = %fingerprint.content_hash(),
            simhash = %format!("{:016x}", fingerprint.simhash()),
            ngrams = fingerprint.num_ngrams(),
        );
        AnalyzedDocument {
            meta: doc.meta.clone(),
            normalized,
            fingerprint,
        }
    }
}

fn check_cancel(cancel: &CancellationToken, stage: RunStage, document_id: &str) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(SimcheckError::Cancelled {
            stage,
            document_id: document_id.to_string(),
        });
    }
    Ok(())
}
