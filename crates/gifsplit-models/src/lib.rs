//! Shared data models for Gifsplit.
//!
//! This crate provides Serde-serializable types for:
//! - Job records, ids, and lifecycle states
//! - Clip and merge artifacts with derived naming rules
//! - Boundary-validated output settings
//! - Content fingerprints forming the cache key space
//! - The progress event schema for the stream protocol

pub mod artifact;
pub mod event;
pub mod fingerprint;
pub mod job;
pub mod settings;

// Re-export common types
pub use artifact::{
    clip_filename, is_safe_artifact_name, merge_filename, recolor_filename, Clip, MergeResult,
    TimeRange, ARTIFACT_EXT,
};
pub use event::{sanitize_message, JobEvent};
pub use fingerprint::{ContentDigest, Fingerprint};
pub use job::{Job, JobId, JobStatus, JobSummary};
pub use settings::{ClipSettings, RawSettings};
