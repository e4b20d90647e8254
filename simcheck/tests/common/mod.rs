#![allow(dead_code)]

use std::sync::Arc;

use simcheck::{
    Comparator, DocumentMeta, GradeLevel, InMemoryIndex, InMemoryResultStore, IncomingDocument,
    Partition, SimcheckConfig,
};

pub struct Harness {
    pub comparator: Comparator,
    pub index: Arc<InMemoryIndex>,
    pub store: Arc<InMemoryResultStore>,
}

impl Harness {
    pub fn new(config: SimcheckConfig) -> Self {
        let index = Arc::new(InMemoryIndex::new(config.candidates.num_blocks).unwrap());
        let store = Arc::new(InMemoryResultStore::new());
        let comparator = Comparator::new(config, index.clone(), store.clone()).unwrap();
        Self {
            comparator,
            index,
            store,
        }
    }

    pub async fn ingest(&self, id: &str, partition: &Partition, text: &str) {
        self.comparator
            .ingest(&doc(id, partition, text))
            .await
            .unwrap();
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(SimcheckConfig::default())
    }
}

pub fn partition(grade: u8, project_type: &str) -> Partition {
    Partition::new(GradeLevel::new(grade).unwrap(), project_type).unwrap()
}

pub fn doc(id: &str, partition: &Partition, text: &str) -> IncomingDocument {
    let meta = DocumentMeta::new(id, format!("{id}.pdf"), partition.clone())
        .byte_size(text.len() as u64)
        .submitter("staff-1");
    IncomingDocument::new(meta, text)
}

/// `n` distinct tokens `{prefix}0 {prefix}1 ...`.
pub fn words(prefix: &str, n: usize) -> String {
    (0..n)
        .map(|i| format!("{prefix}{i}"))
        .collect::<Vec<_>>()
        .join(" ")
}
