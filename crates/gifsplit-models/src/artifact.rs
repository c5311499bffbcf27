//! Generated artifacts and their naming rules.
//!
//! Artifact filenames are always derived server-side (sequence numbers,
//! fingerprint fragments, random tags) and never built from user-supplied
//! strings. Names crossing the boundary inbound are checked against
//! [`is_safe_artifact_name`] before they can reach the store or filesystem.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::Fingerprint;

/// The single output extension this system produces.
pub const ARTIFACT_EXT: &str = "gif";

/// Time range in seconds within the source video, `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// One rendered clip artifact. Owned by exactly one job; immutable once
/// created except for deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clip {
    /// Derived filename within the job's artifact directory
    pub filename: String,
    /// Artifact size on disk
    pub size_bytes: u64,
    /// Source time range this clip was rendered from
    pub range: TimeRange,
}

/// One merge output and the ordered clips it was built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResult {
    /// Derived filename within the job's artifact directory
    pub filename: String,
    /// Source clip filenames in the order they were concatenated
    pub sources: Vec<String>,
    /// Artifact size on disk
    pub size_bytes: u64,
}

/// Derived clip name: 1-based sequence plus the fingerprint fragment.
///
/// The fragment ties the name to the settings that rendered it, so clips
/// from different settings runs can never collide in shared tooling.
pub fn clip_filename(seq: usize, fingerprint: &Fingerprint) -> String {
    format!("clip_{:04}_{}.{}", seq, fingerprint.short(), ARTIFACT_EXT)
}

/// Derived merge name: 1-based sequence plus a random tag.
pub fn merge_filename(seq: usize) -> String {
    let tag = Uuid::new_v4().simple().to_string();
    format!("merged_{:04}_{}.{}", seq, &tag[..8], ARTIFACT_EXT)
}

/// Derived grayscale-variant name for a clip artifact.
///
/// Returns `None` when the source name does not carry the fixed extension.
/// Recoloring an already-recolored name is idempotent.
pub fn recolor_filename(source: &str) -> Option<String> {
    let stem = source.strip_suffix(".gif")?;
    if stem.is_empty() {
        return None;
    }
    if stem.ends_with("_gray") {
        return Some(source.to_string());
    }
    Some(format!("{stem}_gray.{ARTIFACT_EXT}"))
}

/// Strict artifact-name check: restricted character set, one fixed
/// extension, no path separators or dot-dot sequences.
pub fn is_safe_artifact_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 128 {
        return false;
    }
    let Some(stem) = name.strip_suffix(".gif") else {
        return false;
    };
    !stem.is_empty()
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
