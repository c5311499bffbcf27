//! Content identity and cache keys.
//!
//! Identity is two-stage: a [`ContentDigest`] over the raw source bytes, and
//! a [`Fingerprint`] combining that digest with the canonical settings tag.
//! The split lets reprocessing derive a new cache key from a stored digest
//! without re-reading the source file.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::settings::ClipSettings;

/// SHA-256 of the raw source bytes, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Hash the full input byte stream.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache key: SHA-256 over the content digest hex plus the canonical
/// settings tag, lowercase hex.
///
/// Identical bytes with identical effective settings always produce the same
/// fingerprint; any settings difference produces a distinct one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Combine a content digest with canonicalized settings.
    pub fn compute(digest: &ContentDigest, settings: &ClipSettings) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(digest.as_str().as_bytes());
        hasher.update(settings.canonical_tag().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// One-shot fingerprint of in-memory bytes.
    pub fn of(bytes: &[u8], settings: &ClipSettings) -> Self {
        Self::compute(&ContentDigest::from_bytes(bytes), settings)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 hex chars, used as the settings fragment in clip filenames.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
