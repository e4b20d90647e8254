//! In-memory [`RepositoryIndex`] implementation.
//!
//! All partitions live behind one `parking_lot::RwLock`: comparison runs read concurrently
//! and ingestion takes the write lock. The lock is never held across an `.await`.
//! Derived structures (simhash buckets, n-gram postings) are rebuilt from the entries when a
//! snapshot is loaded, so only the entries themselves are persisted.
use std::sync::Arc;

use async_trait::async_trait;
use hamming_index::BucketIndex;
use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::document::Partition;
use crate::fingerprint::{ContentHash, FingerprintSet};

use super::{
    EntryId, EntrySummary, IndexError, RepositoryEntry, RepositoryIndex, SharedNgramHit,
    SimhashHit,
};

/// Version of the snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable content of an [`InMemoryIndex`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    /// Format version.
    pub version: u32,
    /// Entries in ingestion order.
    pub entries: Vec<RepositoryEntry>,
}

impl IndexSnapshot {
    /// Serializes the snapshot as JSON.
    pub fn to_json(&self) -> Result<String, IndexError> {
        serde_json::to_string(self).map_err(|e| IndexError::Snapshot(e.to_string()))
    }

    /// Parses a JSON snapshot.
    pub fn from_json(s: &str) -> Result<Self, IndexError> {
        let snapshot: Self =
            serde_json::from_str(s).map_err(|e| IndexError::Snapshot(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(IndexError::Snapshot(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }
}

#[derive(Clone)]
struct PartitionIndex {
    /// Entry ids in ingestion order.
    order: Vec<EntryId>,
    by_content: HashMap<ContentHash, Vec<EntryId>>,
    simhashes: BucketIndex<u64, EntryId>,
    postings: HashMap<String, Vec<EntryId>>,
}

impl PartitionIndex {
    fn insert(&mut self, entry: &RepositoryEntry) {
        let fp = entry.fingerprint();
        self.order.push(entry.id);
        self.by_content
            .entry(*fp.content_hash())
            .or_default()
            .push(entry.id);
        self.simhashes.insert(entry.id, fp.simhash());
        for (ngram, _) in fp.ngrams() {
            self.postings
                .entry(ngram.to_string())
                .or_default()
                .push(entry.id);
        }
    }

    fn remove(&mut self, entry: &RepositoryEntry) {
        let fp = entry.fingerprint();
        let id = entry.id;
        self.order.retain(|e| *e != id);
        remove_from(&mut self.by_content, fp.content_hash(), id);
        self.simhashes.remove(&id);
        for (ngram, _) in fp.ngrams() {
            remove_from(&mut self.postings, ngram, id);
        }
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn remove_from<K, Q>(map: &mut HashMap<K, Vec<EntryId>>, key: &Q, id: EntryId)
where
    K: std::hash::Hash + Eq + std::borrow::Borrow<Q>,
    Q: std::hash::Hash + Eq + ?Sized,
{
    if let Some(ids) = map.get_mut(key) {
        ids.retain(|e| *e != id);
        if ids.is_empty() {
            map.remove(key);
        }
    }
}

#[derive(Default)]
struct Inner {
    partitions: HashMap<Partition, PartitionIndex>,
    entries: HashMap<EntryId, Arc<RepositoryEntry>>,
}

/// In-memory repository index, usable as a test double or behind a snapshot file.
pub struct InMemoryIndex {
    empty_partition: PartitionIndex,
    inner: RwLock<Inner>,
}

impl InMemoryIndex {
    /// Creates an empty index whose simhash buckets use `num_blocks` blocks.
    pub fn new(num_blocks: usize) -> Result<Self, IndexError> {
        let simhashes =
            BucketIndex::new(num_blocks).map_err(|e| IndexError::InvalidQuery(e.to_string()))?;
        Ok(Self {
            empty_partition: PartitionIndex {
                order: vec![],
                by_content: HashMap::new(),
                simhashes,
                postings: HashMap::new(),
            },
            inner: RwLock::new(Inner::default()),
        })
    }

    /// Rebuilds an index from a snapshot.
    pub fn from_snapshot(num_blocks: usize, snapshot: IndexSnapshot) -> Result<Self, IndexError> {
        let index = Self::new(num_blocks)?;
        for entry in snapshot.entries {
            index.insert_entry(entry);
        }
        Ok(index)
    }

    /// Copies all entries into a snapshot, in ingestion order per partition.
    pub fn snapshot(&self) -> IndexSnapshot {
        let inner = self.inner.read();
        let mut partitions: Vec<_> = inner.partitions.iter().collect();
        partitions.sort_by(|a, b| a.0.cmp(b.0));
        let entries = partitions
            .into_iter()
            .flat_map(|(_, p)| p.order.iter())
            .filter_map(|id| inner.entries.get(id))
            .map(|e| e.as_ref().clone())
            .collect();
        IndexSnapshot {
            version: SNAPSHOT_VERSION,
            entries,
        }
    }

    /// Gets the number of entries over all partitions.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Checks if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets the number of blocks of the simhash buckets.
    pub fn num_blocks(&self) -> usize {
        self.empty_partition.simhashes.num_blocks()
    }

    fn insert_entry(&self, entry: RepositoryEntry) -> Arc<RepositoryEntry> {
        let entry = Arc::new(entry);
        let mut inner = self.inner.write();
        if let Some(old) = inner.entries.remove(&entry.id) {
            if let Some(p) = inner.partitions.get_mut(old.partition()) {
                p.remove(&old);
            }
        }
        inner
            .partitions
            .entry(entry.partition().clone())
            .or_insert_with(|| self.empty_partition.clone())
            .insert(&entry);
        inner.entries.insert(entry.id, Arc::clone(&entry));
        entry
    }
}

#[async_trait]
impl RepositoryIndex for InMemoryIndex {
    async fn insert(&self, entry: RepositoryEntry) -> Result<Arc<RepositoryEntry>, IndexError> {
        Ok(self.insert_entry(entry))
    }

    async fn get(&self, id: EntryId) -> Result<Option<Arc<RepositoryEntry>>, IndexError> {
        Ok(self.inner.read().entries.get(&id).cloned())
    }

    async fn remove(&self, id: EntryId) -> Result<bool, IndexError> {
        let mut inner = self.inner.write();
        let Some(entry) = inner.entries.remove(&id) else {
            return Ok(false);
        };
        let partition = entry.partition();
        let emptied = inner.partitions.get_mut(partition).map_or(false, |p| {
            p.remove(&entry);
            p.is_empty()
        });
        if emptied {
            inner.partitions.remove(partition);
        }
        Ok(true)
    }

    async fn list(&self, partition: &Partition) -> Result<Vec<EntrySummary>, IndexError> {
        let inner = self.inner.read();
        Ok(inner.partitions.get(partition).map_or_else(Vec::new, |p| {
            p.order
                .iter()
                .filter_map(|id| inner.entries.get(id))
                .map(|e| e.summary())
                .collect()
        }))
    }

    async fn find_by_content_hash(
        &self,
        partition: &Partition,
        hash: &ContentHash,
    ) -> Result<Vec<EntryId>, IndexError> {
        let inner = self.inner.read();
        Ok(inner
            .partitions
            .get(partition)
            .and_then(|p| p.by_content.get(hash))
            .cloned()
            .unwrap_or_default())
    }

    async fn candidates_by_simhash_bucket(
        &self,
        partition: &Partition,
        simhash: u64,
        max_distance: usize,
    ) -> Result<Vec<SimhashHit>, IndexError> {
        let max_radius = hamming_index::max_radius(self.num_blocks());
        if max_distance > max_radius {
            return Err(IndexError::InvalidQuery(format!(
                "max_distance {max_distance} exceeds {max_radius} for {} simhash blocks",
                self.num_blocks()
            )));
        }
        let inner = self.inner.read();
        let Some(p) = inner.partitions.get(partition) else {
            return Ok(vec![]);
        };
        let hits = p
            .simhashes
            .query(simhash, max_distance)
            .map_err(|e| IndexError::InvalidQuery(e.to_string()))?;
        Ok(hits
            .into_iter()
            .map(|(entry_id, distance)| SimhashHit { entry_id, distance })
            .collect())
    }

    async fn candidates_by_shared_ngrams(
        &self,
        partition: &Partition,
        fingerprint: &FingerprintSet,
        min_shared: usize,
    ) -> Result<Vec<SharedNgramHit>, IndexError> {
        let inner = self.inner.read();
        let Some(p) = inner.partitions.get(partition) else {
            return Ok(vec![]);
        };
        let mut counter = HashMap::<EntryId, usize>::new();
        for (ngram, _) in fingerprint.ngrams() {
            if let Some(ids) = p.postings.get(ngram) {
                for &id in ids {
                    *counter.entry(id).or_insert(0) += 1;
                }
            }
        }
        let mut hits: Vec<_> = counter
            .into_iter()
            .filter(|&(_, shared)| shared >= min_shared)
            .map(|(entry_id, shared)| SharedNgramHit { entry_id, shared })
            .collect();
        hits.sort_unstable_by(|a, b| b.shared.cmp(&a.shared).then(a.entry_id.cmp(&b.entry_id)));
        Ok(hits)
    }
}
