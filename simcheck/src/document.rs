//! Documents and repository partitions.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SimcheckError};
use crate::fingerprint::FingerprintSet;
use crate::normalize::NormalizedText;

/// School grade of a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GradeLevel(u8);

impl GradeLevel {
    /// Lowest valid grade.
    pub const MIN: u8 = 1;
    /// Highest valid grade.
    pub const MAX: u8 = 12;

    /// Creates a validated grade.
    pub fn new(grade: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&grade) {
            Ok(Self(grade))
        } else {
            Err(SimcheckError::input(format!(
                "grade level must be in {}..={}, but got {grade}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    /// Gets the numeric grade.
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for GradeLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GradeLevel {
    type Err = SimcheckError;
    fn from_str(s: &str) -> Result<Self> {
        let grade = s
            .trim()
            .parse::<u8>()
            .map_err(|_| SimcheckError::input(format!("invalid grade level {s:?}")))?;
        Self::new(grade)
    }
}

impl TryFrom<String> for GradeLevel {
    type Error = SimcheckError;
    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<GradeLevel> for String {
    fn from(grade: GradeLevel) -> Self {
        grade.to_string()
    }
}

/// Repository partition. Documents are only ever compared within one partition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPartition")]
pub struct Partition {
    grade: GradeLevel,
    project_type: String,
}

#[derive(Deserialize)]
struct RawPartition {
    grade: GradeLevel,
    project_type: String,
}

impl TryFrom<RawPartition> for Partition {
    type Error = SimcheckError;

    fn try_from(raw: RawPartition) -> Result<Self> {
        Self::new(raw.grade, raw.project_type)
    }
}

impl Partition {
    /// Creates a partition. The project type is trimmed and ASCII lower-cased.
    pub fn new<S>(grade: GradeLevel, project_type: S) -> Result<Self>
    where
        S: AsRef<str>,
    {
        let project_type = project_type.as_ref().trim().to_ascii_lowercase();
        if project_type.is_empty() {
            return Err(SimcheckError::input("project type must not be empty"));
        }
        Ok(Self {
            grade,
            project_type,
        })
    }

    /// Gets the grade level.
    pub const fn grade(&self) -> GradeLevel {
        self.grade
    }

    /// Gets the normalized project type.
    pub fn project_type(&self) -> &str {
        &self.project_type
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "grade-{}/{}", self.grade, self.project_type)
    }
}

/// Metadata of a submitted or stored document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Identifier assigned by the caller.
    pub id: String,
    /// Display name, usually the file name.
    pub name: String,
    /// Size of the original file in bytes.
    pub byte_size: u64,
    /// Partition the document belongs to.
    pub partition: Partition,
    /// Opaque correlation id of the submitter.
    pub submitter: Option<String>,
    /// Language tag supplied by the extraction service, if any.
    pub language: Option<String>,
}

impl DocumentMeta {
    /// Creates metadata with no size, submitter or language.
    pub fn new<I, N>(id: I, name: N, partition: Partition) -> Self
    where
        I: Into<String>,
        N: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            byte_size: 0,
            partition,
            submitter: None,
            language: None,
        }
    }

    /// Sets the original file size.
    pub const fn byte_size(mut self, byte_size: u64) -> Self {
        self.byte_size = byte_size;
        self
    }

    /// Sets the submitter correlation id.
    pub fn submitter<S: Into<String>>(mut self, submitter: S) -> Self {
        self.submitter = Some(submitter.into());
        self
    }

    /// Sets the language tag.
    pub fn language<S: Into<String>>(mut self, language: S) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// A document as received from the text-extraction service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingDocument {
    /// Metadata.
    pub meta: DocumentMeta,
    /// Raw extracted text.
    pub raw_text: String,
}

impl IncomingDocument {
    /// Creates an instance.
    pub fn new<S: Into<String>>(meta: DocumentMeta, raw_text: S) -> Self {
        Self {
            meta,
            raw_text: raw_text.into(),
        }
    }
}

/// A normalized and fingerprinted document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedDocument {
    /// Metadata.
    pub meta: DocumentMeta,
    /// Normalized text and tokens.
    pub normalized: NormalizedText,
    /// Fingerprints derived from `normalized`.
    pub fingerprint: FingerprintSet,
}

impl AnalyzedDocument {
    /// Gets the number of words.
    pub fn word_count(&self) -> usize {
        self.normalized.word_count()
    }

    /// Gets the partition.
    pub const fn partition(&self) -> &Partition {
        &self.meta.partition
    }
}
