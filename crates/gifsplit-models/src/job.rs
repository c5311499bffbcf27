//! Job records and lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::artifact::{Clip, MergeResult};
use crate::fingerprint::ContentDigest;
use crate::settings::ClipSettings;

/// Unique identifier for a processing job.
///
/// Always a hyphenated lowercase UUID v4, which doubles as the name of the
/// job's artifact directory and retained source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string without validation.
    ///
    /// Only for values that originated inside the process; external input
    /// goes through [`JobId::parse`].
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Validate an identifier received from outside the process.
    ///
    /// Accepts only the hyphenated 36-character UUID form this system emits,
    /// normalized to lowercase. Anything else is rejected before it can reach
    /// the store or the filesystem.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 36 {
            return None;
        }
        Uuid::parse_str(s).ok().map(|u| Self(u.to_string()))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, execution not yet started
    #[default]
    Queued,
    /// Execution task is live
    Running,
    /// All segments rendered
    Completed,
    /// Stopped at a safe point after a cancel request
    Cancelled,
    /// Aborted on segmentation or encode failure
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Failed
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accepted processing request and its accumulated output state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Lifecycle state
    #[serde(default)]
    pub status: JobStatus,

    /// Effective settings the clips were rendered with
    pub settings: ClipSettings,

    /// Digest of the source bytes; reprocessing reuses it without
    /// re-reading the retained source file
    pub source_digest: ContentDigest,

    /// Clips in segment order
    #[serde(default)]
    pub clips: Vec<Clip>,

    /// Merge outputs in creation order
    #[serde(default)]
    pub merges: Vec<MergeResult>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Terminal timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Sanitized error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Job {
    /// Create a new queued job.
    pub fn new(settings: ClipSettings, source_digest: ContentDigest) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            status: JobStatus::Queued,
            settings,
            source_digest,
            clips: Vec::new(),
            merges: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            error_message: None,
        }
    }

    /// Mark the job running.
    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.updated_at = Utc::now();
    }

    /// Mark the job completed.
    pub fn mark_completed(&mut self) {
        self.status = JobStatus::Completed;
        let now = Utc::now();
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Mark the job cancelled. Clips already produced stay in place.
    pub fn mark_cancelled(&mut self) {
        self.status = JobStatus::Cancelled;
        let now = Utc::now();
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Mark the job failed with an already-sanitized message.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error_message = Some(error.into());
        let now = Utc::now();
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Whether `name` is one of this job's clip artifacts.
    pub fn has_clip(&self, name: &str) -> bool {
        self.clips.iter().any(|c| c.filename == name)
    }

    /// Whether `name` is any artifact of this job (clip or merge output).
    pub fn has_artifact(&self, name: &str) -> bool {
        self.has_clip(name) || self.merges.iter().any(|m| m.filename == name)
    }
}

/// Compact listing row: everything `list_jobs` needs without artifact bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub status: JobStatus,
    pub settings: ClipSettings,
    pub clip_count: usize,
    pub merge_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status,
            settings: job.settings,
            clip_count: job.clips.len(),
            merge_count: job.merges.len(),
            created_at: job.created_at,
        }
    }
}
