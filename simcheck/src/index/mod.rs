//! Repository index abstraction.
//!
//! The [`RepositoryIndex`] trait is the only seam between the comparison pipeline and the
//! storage holding previously ingested documents. Every lookup is scoped to a [`Partition`].
//! Implementations must be `Send + Sync`; lookups and insertion are the suspension points
//! of a comparison run.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{AnalyzedDocument, Partition};
use crate::fingerprint::{ContentHash, FingerprintSet};

pub use memory::{InMemoryIndex, IndexSnapshot};

/// Identifier of a repository entry. A new one is minted on every ingestion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Mints a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gets the UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EntryId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for EntryId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A document stored in the repository together with its fingerprints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    /// Entry identifier.
    pub id: EntryId,
    /// The stored document.
    pub document: AnalyzedDocument,
    /// Time of ingestion.
    pub ingested_at: DateTime<Utc>,
}

impl RepositoryEntry {
    /// Wraps an analyzed document into a new entry.
    pub fn new(document: AnalyzedDocument) -> Self {
        Self {
            id: EntryId::new(),
            document,
            ingested_at: Utc::now(),
        }
    }

    /// Gets the partition.
    pub const fn partition(&self) -> &Partition {
        &self.document.meta.partition
    }

    /// Gets the fingerprints.
    pub const fn fingerprint(&self) -> &FingerprintSet {
        &self.document.fingerprint
    }

    /// Builds the listing summary.
    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            id: self.id,
            document_id: self.document.meta.id.clone(),
            name: self.document.meta.name.clone(),
            partition: self.partition().clone(),
            word_count: self.document.word_count(),
            content_hash: *self.fingerprint().content_hash(),
            ingested_at: self.ingested_at,
        }
    }
}

/// Lightweight listing record for repository administration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
    /// Entry identifier.
    pub id: EntryId,
    /// Identifier of the stored document.
    pub document_id: String,
    /// Display name.
    pub name: String,
    /// Partition.
    pub partition: Partition,
    /// Number of words.
    pub word_count: usize,
    /// Content hash.
    pub content_hash: ContentHash,
    /// Time of ingestion.
    pub ingested_at: DateTime<Utc>,
}

/// A simhash bucket hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimhashHit {
    /// Entry identifier.
    pub entry_id: EntryId,
    /// Hamming distance between the simhashes.
    pub distance: usize,
}

/// An inverted-index hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SharedNgramHit {
    /// Entry identifier.
    pub entry_id: EntryId,
    /// Number of distinct shared n-grams.
    pub shared: usize,
}

/// Errors reported by index backends.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The backing store could not be reached.
    #[error("index backend unavailable: {0}")]
    Unavailable(String),
    /// The query cannot be answered with the index configuration.
    #[error("invalid index query: {0}")]
    InvalidQuery(String),
    /// A snapshot could not be read or written.
    #[error("index snapshot error: {0}")]
    Snapshot(String),
}

/// Storage of repository entries with the lookups needed for candidate selection.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](RepositoryIndex::insert) | Append an entry |
/// | [`get`](RepositoryIndex::get) | Fetch an entry for scoring |
/// | [`remove`](RepositoryIndex::remove) | Administrative deletion |
/// | [`list`](RepositoryIndex::list) | Administrative listing |
/// | [`find_by_content_hash`](RepositoryIndex::find_by_content_hash) | Exact duplicates |
/// | [`candidates_by_simhash_bucket`](RepositoryIndex::candidates_by_simhash_bucket) | Near duplicates |
/// | [`candidates_by_shared_ngrams`](RepositoryIndex::candidates_by_shared_ngrams) | Shared passages |
#[async_trait]
pub trait RepositoryIndex: Send + Sync {
    /// Appends an entry. Existing entries are never modified.
    async fn insert(&self, entry: RepositoryEntry) -> Result<Arc<RepositoryEntry>, IndexError>;

    /// Fetches an entry.
    async fn get(&self, id: EntryId) -> Result<Option<Arc<RepositoryEntry>>, IndexError>;

    /// Removes an entry, returning whether it existed.
    async fn remove(&self, id: EntryId) -> Result<bool, IndexError>;

    /// Lists the entries of a partition in ingestion order.
    async fn list(&self, partition: &Partition) -> Result<Vec<EntrySummary>, IndexError>;

    /// Finds entries whose normalized text hashes to `hash`.
    async fn find_by_content_hash(
        &self,
        partition: &Partition,
        hash: &ContentHash,
    ) -> Result<Vec<EntryId>, IndexError>;

    /// Finds entries whose simhash is within `max_distance` bits of `simhash`,
    /// nearest first.
    async fn candidates_by_simhash_bucket(
        &self,
        partition: &Partition,
        simhash: u64,
        max_distance: usize,
    ) -> Result<Vec<SimhashHit>, IndexError>;

    /// Finds entries sharing at least `min_shared` distinct n-grams with `fingerprint`,
    /// most shared first.
    async fn candidates_by_shared_ngrams(
        &self,
        partition: &Partition,
        fingerprint: &FingerprintSet,
        min_shared: usize,
    ) -> Result<Vec<SharedNgramHit>, IndexError>;
}
