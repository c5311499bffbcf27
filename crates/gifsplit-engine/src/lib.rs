//! Job orchestration for the clip service.
//!
//! This crate ties the media layer and the cache store together:
//!
//! - [`Engine`]: submission with a hard concurrency ceiling, cache
//!   resolution, cancellation, reprocessing, and shutdown
//! - Deterministic splitting of detected scenes under the duration cap
//! - Per-job progress broadcasting with keepalive synthesis for idle feeds
//! - Merge, recolor, and delete operations over stored artifacts
//! - A background janitor that expires aged-out jobs

pub mod config;
pub mod error;
pub mod events;
pub mod janitor;
mod ops;
pub mod orchestrator;
pub mod split;
#[cfg(test)]
mod testutil;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use events::{EventHub, EventStream};
pub use janitor::Janitor;
pub use orchestrator::{Engine, Submission};
