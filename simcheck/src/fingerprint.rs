//! Content hash, simhash and n-gram positions of a normalized document.
use std::collections::BTreeMap;
use std::fmt;

use lsh::simhash::SimHasher;
use rand_xoshiro::rand_core::{RngCore, SeedableRng};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::config::FingerprintConfig;
use crate::errors::{Result, SimcheckError};
use crate::normalize::NormalizedText;
use crate::shingling::ShingleIter;

/// SHA-256 digest of a normalized text, serialized as lower-case hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hashes a normalized text.
    pub fn of(text: &str) -> Self {
        Self(Sha256::digest(text.as_bytes()).into())
    }

    /// Parses a 64-digit hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| SimcheckError::input(format!("invalid content hash {s:?}: {e}")))?;
        Ok(Self(bytes))
    }

    /// Formats the digest as lower-case hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Gets the raw digest.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(de::Error::custom)
    }
}

/// The fingerprints of one document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintSet {
    content_hash: ContentHash,
    simhash: u64,
    ngram_size: usize,
    word_count: usize,
    ngrams: BTreeMap<String, Vec<usize>>,
}

impl FingerprintSet {
    /// Gets the content hash.
    pub const fn content_hash(&self) -> &ContentHash {
        &self.content_hash
    }

    /// Gets the 64-bit simhash.
    pub const fn simhash(&self) -> u64 {
        self.simhash
    }

    /// Gets the configured n-gram size.
    pub const fn ngram_size(&self) -> usize {
        self.ngram_size
    }

    /// Gets the number of tokens an n-gram of this document actually spans,
    /// which is smaller than [`Self::ngram_size()`] only for very short documents.
    pub fn ngram_span(&self) -> usize {
        self.ngram_size.min(self.word_count)
    }

    /// Gets the number of words of the document.
    pub const fn word_count(&self) -> usize {
        self.word_count
    }

    /// Gets the number of distinct n-grams.
    pub fn num_ngrams(&self) -> usize {
        self.ngrams.len()
    }

    /// Gets the start offsets of an n-gram, in ascending order.
    pub fn positions(&self, ngram: &str) -> Option<&[usize]> {
        self.ngrams.get(ngram).map(Vec::as_slice)
    }

    /// Iterates over distinct n-grams and their start offsets in key order.
    pub fn ngrams(&self) -> impl Iterator<Item = (&str, &[usize])> + '_ {
        self.ngrams.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Counts the distinct n-grams occurring in both sets.
    pub fn shared_ngrams(&self, other: &Self) -> usize {
        let (small, large) = if self.ngrams.len() <= other.ngrams.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .ngrams
            .keys()
            .filter(|k| large.ngrams.contains_key(*k))
            .count()
    }
}

/// Generator of [`FingerprintSet`]s.
#[derive(Clone, Copy, Debug)]
pub struct Fingerprinter {
    ngram_size: usize,
    simhash_window: usize,
    hasher: SimHasher,
}

impl Fingerprinter {
    /// Creates an instance.
    pub fn new(config: &FingerprintConfig) -> Result<Self> {
        if config.ngram_size == 0 || config.simhash_window == 0 {
            return Err(SimcheckError::config("Window size must not be 0."));
        }
        let mut seeder = rand_xoshiro::SplitMix64::seed_from_u64(config.seed);
        Ok(Self {
            ngram_size: config.ngram_size,
            simhash_window: config.simhash_window,
            hasher: SimHasher::new(seeder.next_u64()),
        })
    }

    /// Fingerprints a normalized document.
    pub fn fingerprint(&self, text: &NormalizedText) -> FingerprintSet {
        let tokens = text.tokens();

        let mut ngrams = BTreeMap::<String, Vec<usize>>::new();
        for (offset, window) in ShingleIter::new(tokens, self.ngram_size) {
            // Offsets are pushed in ascending order.
            ngrams.entry(window.join(" ")).or_default().push(offset);
        }

        FingerprintSet {
            content_hash: ContentHash::of(text.text()),
            simhash: self.hasher.sketch_shingles(tokens, self.simhash_window),
            ngram_size: self.ngram_size,
            word_count: tokens.len(),
            ngrams,
        }
    }
}
