//! Similarity checking of submitted project documents.
//!
//! A submission is normalized, fingerprinted (content hash, simhash and n-gram
//! positions) and compared against the documents of its repository partition.
//! Candidates are retrieved through simhash buckets and an inverted n-gram index,
//! scored in parallel, and reported with the passages they share with the submission.
//!
//! [`Comparator`] drives the whole pipeline.
#![deny(missing_docs)]

pub mod classify;
pub mod comparator;
pub mod config;
pub mod document;
pub mod errors;
pub mod fingerprint;
pub mod index;
pub mod normalize;
pub mod result;
pub mod scorer;
pub mod segments;
pub mod selector;
pub mod store;

pub(crate) mod shingling;

pub use classify::{Status, Thresholds};
pub use comparator::{Comparator, RunStage};
pub use config::SimcheckConfig;
pub use document::{AnalyzedDocument, DocumentMeta, GradeLevel, IncomingDocument, Partition};
pub use errors::{ErrorReport, Result, SimcheckError};
pub use index::{
    EntryId, EntrySummary, InMemoryIndex, IndexError, IndexSnapshot, RepositoryEntry,
    RepositoryIndex,
};
pub use result::{ComparisonMatch, ComparisonResult};
pub use store::{InMemoryResultStore, ResultStore, StoreError};
