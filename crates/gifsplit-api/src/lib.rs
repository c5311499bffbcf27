//! Axum HTTP API server.
//!
//! This crate provides:
//! - Multipart video intake and job submission
//! - Job listing, cancellation, reprocess, merge, recolor, and delete
//! - SSE progress streaming
//! - CORS, request-id, and request-logging middleware

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
