//! Error types for the cache store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur against the durable record table.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No record for job {0}")]
    RecordNotFound(String),

    #[error("Job {job_id} has no artifact named {filename}")]
    ArtifactNotFound { job_id: String, filename: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
