//! Error definitions.
use std::result;

use serde::Serialize;

use crate::comparator::RunStage;
use crate::index::IndexError;
use crate::store::StoreError;

/// A specialized Result type for this library.
pub type Result<T, E = SimcheckError> = result::Result<T, E>;

/// Errors in simcheck.
///
/// Every run-level variant names the document and the pipeline stage it failed at,
/// so that a reviewer can be told why a submission was not checked.
#[derive(Debug, thiserror::Error)]
pub enum SimcheckError {
    /// The normalized text has no tokens.
    #[error("document {document_id} has no comparable text")]
    EmptyDocument {
        /// Identifier of the document.
        document_id: String,
    },

    /// The document exceeds the configured word-count ceiling.
    #[error("document {document_id} has {word_count} words, exceeding the limit of {limit}")]
    TooLarge {
        /// Identifier of the document.
        document_id: String,
        /// Number of words after normalization.
        word_count: usize,
        /// Configured ceiling.
        limit: usize,
    },

    /// The repository index failed during lookup or insertion.
    #[error("repository index unavailable at stage {stage} for document {document_id}")]
    IndexUnavailable {
        /// Stage the run was in.
        stage: RunStage,
        /// Identifier of the document.
        document_id: String,
        /// Backend error.
        #[source]
        source: IndexError,
    },

    /// The comparison result could not be persisted.
    #[error("failed to persist the comparison result of document {document_id}")]
    Persistence {
        /// Identifier of the document.
        document_id: String,
        /// Backend error.
        #[source]
        source: StoreError,
    },

    /// The caller cancelled the run.
    #[error("run for document {document_id} cancelled after {stage}")]
    Cancelled {
        /// Last completed stage.
        stage: RunStage,
        /// Identifier of the document.
        document_id: String,
    },

    /// An administrative repository operation failed.
    #[error("repository index operation failed")]
    Repository(#[source] IndexError),

    /// The configuration is inconsistent.
    #[error("ConfigError: {0}")]
    Config(String),

    /// An input argument is invalid.
    #[error("InputError: {0}")]
    Input(String),
}

impl SimcheckError {
    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn input<S: Into<String>>(msg: S) -> Self {
        Self::Input(msg.into())
    }

    /// Short machine-readable name of the error kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::EmptyDocument { .. } => "empty-document",
            Self::TooLarge { .. } => "too-large",
            Self::IndexUnavailable { .. } => "index-unavailable",
            Self::Persistence { .. } => "persistence",
            Self::Cancelled { .. } => "cancelled",
            Self::Repository(_) => "repository",
            Self::Config(_) => "config",
            Self::Input(_) => "input",
        }
    }

    /// Gets the pipeline stage the error is attached to.
    pub fn stage(&self) -> Option<RunStage> {
        match self {
            Self::EmptyDocument { .. } => Some(RunStage::Normalized),
            Self::TooLarge { .. } => Some(RunStage::Fingerprinted),
            Self::IndexUnavailable { stage, .. } | Self::Cancelled { stage, .. } => Some(*stage),
            Self::Persistence { .. } => Some(RunStage::Persisted),
            Self::Repository(_) | Self::Config(_) | Self::Input(_) => None,
        }
    }

    /// Gets the identifier of the document the error is about.
    pub fn document_id(&self) -> Option<&str> {
        match self {
            Self::EmptyDocument { document_id }
            | Self::TooLarge { document_id, .. }
            | Self::IndexUnavailable { document_id, .. }
            | Self::Persistence { document_id, .. }
            | Self::Cancelled { document_id, .. } => Some(document_id),
            Self::Repository(_) | Self::Config(_) | Self::Input(_) => None,
        }
    }

    /// Whether rerunning the same input may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::IndexUnavailable { .. }
                | Self::Persistence { .. }
                | Self::Cancelled { .. }
                | Self::Repository(IndexError::Unavailable(_))
        )
    }

    /// Builds a structured report for the administrative UI.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            stage: self.stage(),
            document_id: self.document_id().map(str::to_string),
            reason: error_chain(self),
            retryable: self.is_retryable(),
        }
    }
}

/// Structured, serializable description of a failed run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    /// See [`SimcheckError::kind`].
    pub kind: &'static str,
    /// See [`SimcheckError::stage`].
    pub stage: Option<RunStage>,
    /// See [`SimcheckError::document_id`].
    pub document_id: Option<String>,
    /// Human-readable reason including the causes.
    pub reason: String,
    /// See [`SimcheckError::is_retryable`].
    pub retryable: bool,
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(e) = source {
        msg.push_str(": ");
        msg.push_str(&e.to_string());
        source = e.source();
    }
    msg
}
