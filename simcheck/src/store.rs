//! Persistence of comparison results.
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::result::ComparisonResult;

/// Errors reported by result stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("result store unavailable: {0}")]
    Unavailable(String),
}

/// Sink for finished comparison results. Results are appended, never overwritten.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persists one result together with its matches.
    async fn persist(&self, result: &ComparisonResult) -> Result<(), StoreError>;
}

/// In-memory result store for tests and the command-line driver.
#[derive(Default)]
pub struct InMemoryResultStore {
    results: RwLock<Vec<ComparisonResult>>,
}

impl InMemoryResultStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets all results of a document, oldest first.
    pub fn results_for(&self, document_id: &str) -> Vec<ComparisonResult> {
        self.results
            .read()
            .iter()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect()
    }

    /// Gets the number of stored results.
    pub fn len(&self) -> usize {
        self.results.read().len()
    }

    /// Checks if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn persist(&self, result: &ComparisonResult) -> Result<(), StoreError> {
        self.results.write().push(result.clone());
        Ok(())
    }
}
