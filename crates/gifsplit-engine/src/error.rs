//! Engine error taxonomy.

use thiserror::Error;

use gifsplit_media::MediaError;
use gifsplit_store::StoreError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the orchestration engine.
///
/// `CapacityExceeded` is transient; everything else reflects the request or
/// the stored state. Failures inside a running execution task are classified
/// here too, but are never returned from engine methods — they finalize the
/// job and emit a terminal `error` event carrying the message.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("All processing slots are busy")]
    CapacityExceeded,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid merge selection: {0}")]
    InvalidSelection(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Segmentation failed: {0}")]
    SegmentationFailed(String),

    #[error("Stored record out of sync with disk: {0}")]
    StoreCorruption(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_selection(msg: impl Into<String>) -> Self {
        Self::InvalidSelection(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn encoding_failed(msg: impl Into<String>) -> Self {
        Self::EncodingFailed(msg.into())
    }

    pub fn segmentation_failed(msg: impl Into<String>) -> Self {
        Self::SegmentationFailed(msg.into())
    }

    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::StoreCorruption(msg.into())
    }
}
