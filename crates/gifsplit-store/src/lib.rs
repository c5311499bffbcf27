//! Durable content-addressed cache store.
//!
//! This crate provides:
//! - A fingerprint-keyed record table with a secondary job-id index
//! - Atomic insert-if-absent for submission races
//! - Crash-safe persistence (temp file + rename)
//! - Load-time repair: corrupt records dropped, interrupted jobs finalized
//! - Oldest-first eviction past a configurable capacity

pub mod error;
pub mod record;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use record::{CacheRecord, InsertOutcome};
pub use store::CacheStore;
