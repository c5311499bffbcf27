//! Stored record shapes.

use serde::{Deserialize, Serialize};

use gifsplit_models::{Fingerprint, Job};

/// One durable cache entry: a fingerprint and the job it resolved to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub fingerprint: Fingerprint,
    pub job: Job,
}

impl CacheRecord {
    pub fn new(fingerprint: Fingerprint, job: Job) -> Self {
        Self { fingerprint, job }
    }
}

/// Result of an atomic insert-if-absent.
#[derive(Debug)]
pub enum InsertOutcome {
    /// The fingerprint was free; the caller's record is now stored.
    Inserted(CacheRecord),
    /// Another record already owns this fingerprint; no mutation happened.
    Existing(CacheRecord),
}
