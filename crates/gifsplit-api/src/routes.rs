//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::events::job_events;
use crate::handlers::health;
use crate::handlers::jobs::{
    cancel_job, delete_clip, get_job, list_jobs, merge_clips, recolor_clip, reprocess_job,
    submit_job,
};
use crate::middleware::{cors_layer, request_id, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let job_routes = Router::new()
        // Submission and listing
        .route("/jobs", post(submit_job))
        .route("/jobs", get(list_jobs))
        // Single job operations
        .route("/jobs/:job_id", get(get_job))
        .route("/jobs/:job_id/events", get(job_events))
        .route("/jobs/:job_id/cancel", post(cancel_job))
        .route("/jobs/:job_id/reprocess", post(reprocess_job))
        // Artifact operations
        .route("/jobs/:job_id/merge", post(merge_clips))
        .route("/jobs/:job_id/clips/:filename/recolor", post(recolor_clip))
        .route("/jobs/:job_id/clips/:filename", delete(delete_clip));

    let health_routes = Router::new().route("/health", get(health));

    Router::new()
        .nest("/api", job_routes)
        .merge(health_routes)
        // The built-in 2 MB body cap would reject uploads before the
        // configured limit gets a say
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
