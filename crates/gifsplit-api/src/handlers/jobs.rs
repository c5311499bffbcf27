//! Job API handlers.

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use gifsplit_models::{Clip, Job, JobId, JobSummary, MergeResult, RawSettings};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Response for a submission: the job record plus whether it was served
/// from the cache instead of starting a new execution.
#[derive(Serialize)]
pub struct SubmissionResponse {
    pub cached: bool,
    #[serde(flatten)]
    pub job: Job,
}

/// Query parameters for the job listing.
#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// Request body for a merge.
#[derive(Deserialize)]
pub struct MergeRequest {
    pub filenames: Vec<String>,
}

/// Upload a video and start a splitting job (or join the cached one).
///
/// Multipart form: one `video` part with the file bytes, plus optional
/// `max_duration`, `fps`, `width`, and `threshold` parts. Unknown parts
/// are ignored; out-of-range values clamp to their documented bounds.
pub async fn submit_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<SubmissionResponse>> {
    let mut video: Option<Vec<u8>> = None;
    let mut raw = RawSettings::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart body: {e}")))?
    {
        let name = field.name().map(|s| s.to_string()).unwrap_or_default();
        match name.as_str() {
            "video" => {
                let data = field.bytes().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed to read the video part: {e}"))
                })?;
                video = Some(data.to_vec());
            }
            "max_duration" => raw.max_duration = Some(parse_part(&name, field).await?),
            "fps" => raw.fps = Some(parse_part(&name, field).await?),
            "width" => raw.width = Some(parse_part(&name, field).await?),
            "threshold" => raw.threshold = Some(parse_part(&name, field).await?),
            _ => {}
        }
    }

    let video = video.ok_or_else(|| ApiError::bad_request("Missing 'video' part"))?;
    let submission = state.engine.submit(&video, &raw).await?;
    info!(
        job_id = %submission.job.id,
        cached = submission.cached,
        "Submission accepted"
    );

    Ok(Json(SubmissionResponse {
        cached: submission.cached,
        job: submission.job,
    }))
}

/// List recent jobs, newest first.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<JobSummary>> {
    Json(state.engine.list_jobs(query.limit).await)
}

/// Fetch one job record, including its clips and merges.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let id = parse_job_id(&job_id)?;
    let job = state.engine.load_job(&id).await?;
    Ok(Json(job))
}

/// Request cancellation of a running job.
///
/// Cancellation is cooperative: the clip currently encoding finishes (or
/// times out) before the job turns terminal, so this returns 202 rather
/// than 200.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_job_id(&job_id)?;
    state.engine.cancel(&id).await?;
    info!(job_id = %id, "Cancellation requested");
    Ok(StatusCode::ACCEPTED)
}

/// Re-run a job's retained source under new settings.
pub async fn reprocess_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Json(raw): Json<RawSettings>,
) -> ApiResult<Json<SubmissionResponse>> {
    let id = parse_job_id(&job_id)?;
    let submission = state.engine.reprocess(&id, &raw).await?;
    info!(
        job_id = %submission.job.id,
        source_job_id = %id,
        cached = submission.cached,
        "Reprocess accepted"
    );

    Ok(Json(SubmissionResponse {
        cached: submission.cached,
        job: submission.job,
    }))
}

/// Concatenate a selection of a job's clips into one artifact.
pub async fn merge_clips(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Json(request): Json<MergeRequest>,
) -> ApiResult<Json<MergeResult>> {
    let id = parse_job_id(&job_id)?;
    let merge = state.engine.merge(&id, request.filenames).await?;
    Ok(Json(merge))
}

/// Render a grayscale variant of one clip.
pub async fn recolor_clip(
    State(state): State<AppState>,
    Path((job_id, filename)): Path<(String, String)>,
) -> ApiResult<Json<Clip>> {
    let id = parse_job_id(&job_id)?;
    let clip = state.engine.recolor(&id, &filename).await?;
    Ok(Json(clip))
}

/// Delete one clip or merge artifact.
pub async fn delete_clip(
    State(state): State<AppState>,
    Path((job_id, filename)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let id = parse_job_id(&job_id)?;
    state.engine.delete_artifact(&id, &filename).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn parse_job_id(raw: &str) -> ApiResult<JobId> {
    JobId::parse(raw).ok_or_else(|| ApiError::bad_request("Invalid job id format"))
}

async fn parse_part<T: std::str::FromStr>(name: &str, field: Field<'_>) -> ApiResult<T> {
    let text = field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read the '{name}' part: {e}")))?;
    text.trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid value for '{name}'")))
}
