//! SSE progress stream handler.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, BoxStream, StreamExt};

use gifsplit_models::JobEvent;

use crate::error::ApiResult;
use crate::handlers::jobs::parse_job_id;
use crate::state::AppState;

/// Attach to a job's progress stream.
///
/// Each event goes out as one JSON data frame tagged by its `type` field.
/// Attachment covers events from this point onward only; a consumer
/// arriving after the job finished gets a single `error` frame and the
/// stream closes. The job read endpoint is the late-attach path.
pub async fn job_events(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Sse<BoxStream<'static, Result<Event, Infallible>>>> {
    let id = parse_job_id(&job_id)?;
    let keepalive = Duration::from_secs(state.engine.config().keepalive_secs);

    let stream = match state.engine.attach(&id).await {
        Some(events) => stream::unfold(events, |mut events| async move {
            let event = events.next().await?;
            let frame = Event::default().json_data(&event).ok()?;
            Some((Ok(frame), events))
        })
        .boxed(),
        None => {
            let closing = JobEvent::error("unknown or finished job");
            let frame = Event::default().json_data(&closing).ok().map(Ok);
            stream::iter(frame).boxed()
        }
    };

    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(keepalive).text("keepalive")))
}
