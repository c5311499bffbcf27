//! The orchestration engine: accepts uploads, resolves them against the
//! cache, and drives accepted jobs through segmentation and encoding on a
//! bounded pool of execution slots.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use gifsplit_media::{Encoder, Segmenter};
use gifsplit_models::{
    clip_filename, sanitize_message, Clip, ClipSettings, ContentDigest, Fingerprint, Job, JobEvent,
    JobId, JobSummary, RawSettings,
};
use gifsplit_store::{CacheStore, InsertOutcome};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::{EventHub, EventStream};
use crate::janitor::Janitor;
use crate::split;

/// How long shutdown waits for in-flight jobs to drain.
const SHUTDOWN_DRAIN_SECS: u64 = 60;

/// Outcome of an accepted submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub job: Job,
    /// True when the result came out of the cache and no work was launched.
    pub cached: bool,
}

/// Shared orchestrator handle. Cloning is cheap; all clones drive the same
/// slot pool, store, and event hub.
#[derive(Clone)]
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) store: Arc<CacheStore>,
    segmenter: Arc<dyn Segmenter>,
    pub(crate) encoder: Arc<dyn Encoder>,
    slots: Arc<Semaphore>,
    hub: Arc<EventHub>,
    running: Arc<Mutex<HashMap<JobId, watch::Sender<bool>>>>,
    shutdown: watch::Sender<bool>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        store: CacheStore,
        segmenter: Arc<dyn Segmenter>,
        encoder: Arc<dyn Encoder>,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let hub = Arc::new(EventHub::new(Duration::from_secs(config.keepalive_secs)));
        let (shutdown, _) = watch::channel(false);
        Self {
            store: Arc::new(store),
            segmenter,
            encoder,
            slots,
            hub,
            running: Arc::new(Mutex::new(HashMap::new())),
            shutdown,
            config,
        }
    }

    /// Accept an upload: resolve it against the cache, or claim a slot and
    /// launch a new job.
    ///
    /// The slot is claimed before the cache lookup so that acceptance is a
    /// single atomic step; a cache hit releases it immediately.
    pub async fn submit(&self, bytes: &[u8], raw: &RawSettings) -> EngineResult<Submission> {
        if bytes.is_empty() {
            return Err(EngineError::invalid_input("the uploaded file is empty"));
        }

        let permit = Arc::clone(&self.slots)
            .try_acquire_owned()
            .map_err(|_| EngineError::CapacityExceeded)?;

        let settings = ClipSettings::from_raw(raw, &self.config.defaults);
        let digest = ContentDigest::from_bytes(bytes);
        let fingerprint = Fingerprint::compute(&digest, &settings);

        if let Some(job) = self.resolve_cached(&fingerprint, None).await? {
            return Ok(Submission { job, cached: true });
        }

        let job = Job::new(settings, digest);
        tokio::fs::create_dir_all(&self.config.upload_dir).await?;
        tokio::fs::write(self.config.source_path(&job.id), bytes).await?;

        match self.store.insert_new(fingerprint.clone(), job.clone()).await? {
            InsertOutcome::Existing(record) => {
                // Lost the insertion race; the winner's job is the answer.
                let _ = tokio::fs::remove_file(self.config.source_path(&job.id)).await;
                Ok(Submission {
                    job: record.job,
                    cached: true,
                })
            }
            InsertOutcome::Inserted(_) => {
                let job = self.launch(job.id, fingerprint, permit).await?;
                Ok(Submission { job, cached: false })
            }
        }
    }

    /// Re-run a finished job's retained source under new settings.
    ///
    /// The job reference is validated before a slot is claimed: an unknown id
    /// is `NotFound` even on a saturated engine.
    pub async fn reprocess(&self, id: &JobId, raw: &RawSettings) -> EngineResult<Submission> {
        let record = self
            .store
            .get_by_job(id)
            .await
            .ok_or_else(|| EngineError::not_found(format!("job {id}")))?;
        let source = self.config.source_path(id);
        if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
            return Err(EngineError::not_found(format!(
                "retained source for job {id}"
            )));
        }

        let permit = Arc::clone(&self.slots)
            .try_acquire_owned()
            .map_err(|_| EngineError::CapacityExceeded)?;

        let settings = ClipSettings::from_raw(raw, &self.config.defaults);
        let fingerprint = Fingerprint::compute(&record.job.source_digest, &settings);

        // The old job's record must survive a stale-entry cleanup: its source
        // file is the input we are about to copy.
        if let Some(job) = self.resolve_cached(&fingerprint, Some(id)).await? {
            return Ok(Submission { job, cached: true });
        }

        let job = Job::new(settings, record.job.source_digest.clone());
        tokio::fs::create_dir_all(&self.config.upload_dir).await?;
        tokio::fs::copy(&source, self.config.source_path(&job.id)).await?;

        match self.store.insert_new(fingerprint.clone(), job.clone()).await? {
            InsertOutcome::Existing(existing) => {
                let _ = tokio::fs::remove_file(self.config.source_path(&job.id)).await;
                Ok(Submission {
                    job: existing.job,
                    cached: true,
                })
            }
            InsertOutcome::Inserted(_) => {
                let job = self.launch(job.id, fingerprint, permit).await?;
                Ok(Submission { job, cached: false })
            }
        }
    }

    /// Request cancellation. Running jobs get their flag raised; finished
    /// jobs are a no-op; unknown ids are an error.
    pub async fn cancel(&self, id: &JobId) -> EngineResult<()> {
        if let Some(cancel) = self.running.lock().await.get(id) {
            info!(job_id = %id, "Cancellation requested");
            let _ = cancel.send(true);
            return Ok(());
        }
        if self.store.get_by_job(id).await.is_some() {
            debug!(job_id = %id, "Cancel on a finished job is a no-op");
            return Ok(());
        }
        Err(EngineError::not_found(format!("job {id}")))
    }

    /// Attach to a running job's event feed. Returns `None` once the job has
    /// finished (or was never known).
    pub async fn attach(&self, id: &JobId) -> Option<EventStream> {
        self.hub.subscribe(id).await
    }

    pub async fn list_jobs(&self, limit: Option<usize>) -> Vec<JobSummary> {
        let n = limit
            .unwrap_or(self.config.list_jobs_max)
            .min(self.config.list_jobs_max);
        self.store.list_recent(n).await
    }

    pub async fn load_job(&self, id: &JobId) -> EngineResult<Job> {
        self.store
            .get_by_job(id)
            .await
            .map(|record| record.job)
            .ok_or_else(|| EngineError::not_found(format!("job {id}")))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The expiry janitor for this engine, if expiry is enabled.
    pub fn janitor(&self) -> Option<Janitor> {
        if self.config.job_expiry_hours == 0 {
            return None;
        }
        Some(Janitor::new(
            self.config.clone(),
            Arc::clone(&self.store),
            self.shutdown.subscribe(),
        ))
    }

    /// Cancel everything in flight and wait (bounded) for slots to drain.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        {
            let running = self.running.lock().await;
            if !running.is_empty() {
                info!(jobs = running.len(), "Cancelling in-flight jobs for shutdown");
                for cancel in running.values() {
                    let _ = cancel.send(true);
                }
            }
        }
        let drain = tokio::time::timeout(
            Duration::from_secs(SHUTDOWN_DRAIN_SECS),
            self.wait_for_drain(),
        );
        if drain.await.is_err() {
            warn!("Shutdown timed out with jobs still running");
        }
        info!("Engine stopped");
    }

    async fn wait_for_drain(&self) {
        while self.slots.available_permits() < self.config.max_concurrent_jobs {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Return the cached job for a fingerprint, dropping the record first if
    /// its artifacts no longer hold up on disk.
    ///
    /// `keep_source` protects one job's retained source from the cleanup.
    async fn resolve_cached(
        &self,
        fingerprint: &Fingerprint,
        keep_source: Option<&JobId>,
    ) -> EngineResult<Option<Job>> {
        let Some(record) = self.store.lookup(fingerprint).await else {
            return Ok(None);
        };

        if self.artifacts_intact(&record.job).await {
            info!(job_id = %record.job.id, fingerprint = %fingerprint.short(), "Cache hit");
            return Ok(Some(record.job));
        }

        warn!(job_id = %record.job.id, "Dropping stale cache record");
        self.store.remove_record(fingerprint).await?;
        let _ = tokio::fs::remove_dir_all(self.config.job_dir(&record.job.id)).await;
        if keep_source != Some(&record.job.id) {
            let _ = tokio::fs::remove_file(self.config.source_path(&record.job.id)).await;
        }
        Ok(None)
    }

    /// Take a just-inserted record back out, along with its retained source.
    async fn discard_unlaunched(&self, id: &JobId, fingerprint: &Fingerprint) {
        warn!(job_id = %id, "Discarding job that never launched");
        let _ = self.store.remove_record(fingerprint).await;
        let _ = tokio::fs::remove_file(self.config.source_path(id)).await;
    }

    /// A live record is always usable. A terminal one counts only if it
    /// produced clips and every clip file is still present.
    async fn artifacts_intact(&self, job: &Job) -> bool {
        if !job.status.is_terminal() {
            return true;
        }
        if job.clips.is_empty() {
            return false;
        }
        for clip in &job.clips {
            let path = self.config.artifact_path(&job.id, &clip.filename);
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return false;
            }
        }
        true
    }

    /// Mark the freshly inserted job running and spawn its execution task.
    /// The returned handle already reflects the running state.
    ///
    /// A record that never launches is removed again: left in place it would
    /// sit non-terminal forever and shadow its fingerprint as a cache hit.
    async fn launch(
        &self,
        id: JobId,
        fingerprint: Fingerprint,
        permit: OwnedSemaphorePermit,
    ) -> EngineResult<Job> {
        let record = match self.store.mark_running(&id).await {
            Ok(()) => self.store.get_by_job(&id).await,
            Err(e) => {
                self.discard_unlaunched(&id, &fingerprint).await;
                return Err(e.into());
            }
        };
        let Some(record) = record else {
            self.discard_unlaunched(&id, &fingerprint).await;
            return Err(EngineError::not_found(format!("job {id}")));
        };

        self.hub.register(&id).await;
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.running.lock().await.insert(id.clone(), cancel_tx);

        let ctx = ExecCtx {
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            segmenter: Arc::clone(&self.segmenter),
            encoder: Arc::clone(&self.encoder),
            hub: Arc::clone(&self.hub),
            running: Arc::clone(&self.running),
        };
        let settings = record.job.settings;
        info!(job_id = %id, settings = %settings.canonical_tag(), "Launching job");
        tokio::spawn(async move {
            let _permit = permit;
            let outcome = run_job(&ctx, &id, settings, &fingerprint, cancel_rx).await;
            finalize(&ctx, &id, outcome).await;
        });

        Ok(record.job)
    }
}

/// Everything an execution task needs, detached from the engine handle.
struct ExecCtx {
    config: EngineConfig,
    store: Arc<CacheStore>,
    segmenter: Arc<dyn Segmenter>,
    encoder: Arc<dyn Encoder>,
    hub: Arc<EventHub>,
    running: Arc<Mutex<HashMap<JobId, watch::Sender<bool>>>>,
}

enum RunOutcome {
    Completed { total: usize },
    Cancelled,
    Failed { message: String },
}

impl RunOutcome {
    /// Classify a mid-run failure and flatten it to a sanitized message, the
    /// one form every downstream surface (record, log, event) carries.
    fn failed(error: EngineError) -> Self {
        Self::Failed {
            message: sanitize_message(&error.to_string()),
        }
    }
}

/// Drive one job: probe, gate, segment, plan, and encode interval by
/// interval. The cancel flag is consulted before each encode and again after
/// it returns; a clip rendered past the flag is discarded, never recorded.
async fn run_job(
    ctx: &ExecCtx,
    id: &JobId,
    settings: ClipSettings,
    fingerprint: &Fingerprint,
    cancel: watch::Receiver<bool>,
) -> RunOutcome {
    let source = ctx.config.source_path(id);

    let duration = match ctx.segmenter.probe(&source).await {
        Ok(d) => d,
        Err(e) => {
            return RunOutcome::failed(EngineError::segmentation_failed(format!(
                "could not read the video: {e}"
            )))
        }
    };
    if duration <= 0.0 {
        return RunOutcome::failed(EngineError::segmentation_failed(
            "the video has no readable duration",
        ));
    }
    let max_duration = ctx.config.max_video_duration_secs;
    if max_duration > 0 && duration > max_duration as f64 {
        return RunOutcome::failed(EngineError::segmentation_failed(format!(
            "the video is {duration:.0}s long; the limit is {max_duration}s"
        )));
    }

    let scenes = match ctx.segmenter.detect_scenes(&source, settings.threshold).await {
        Ok(scenes) => scenes,
        Err(e) => {
            return RunOutcome::failed(EngineError::segmentation_failed(format!(
                "scene detection: {e}"
            )))
        }
    };

    let mut intervals = split::plan_intervals(&scenes, settings.max_clip_secs);
    if ctx.config.max_clips > 0 && intervals.len() > ctx.config.max_clips {
        debug!(
            job_id = %id,
            planned = intervals.len(),
            cap = ctx.config.max_clips,
            "Truncating interval plan"
        );
        intervals.truncate(ctx.config.max_clips);
    }
    info!(job_id = %id, intervals = intervals.len(), duration, "Interval plan ready");

    let job_dir = ctx.config.job_dir(id);
    let mut produced = 0usize;
    for (i, range) in intervals.iter().enumerate() {
        if *cancel.borrow() {
            return RunOutcome::Cancelled;
        }

        let filename = clip_filename(i + 1, fingerprint);
        let path = ctx.config.artifact_path(id, &filename);
        if let Err(e) = tokio::fs::create_dir_all(&job_dir).await {
            return RunOutcome::failed(EngineError::encoding_failed(format!(
                "could not create the output directory: {e}"
            )));
        }
        if let Err(e) = ctx
            .encoder
            .encode_clip(&source, *range, settings.width, settings.fps, &path)
            .await
        {
            return RunOutcome::failed(EngineError::encoding_failed(format!(
                "clip {}: {e}",
                i + 1
            )));
        }

        // A cancel that raced the encode wins: drop the file it rendered.
        if *cancel.borrow() {
            let _ = tokio::fs::remove_file(&path).await;
            return RunOutcome::Cancelled;
        }

        let size_bytes = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                return RunOutcome::failed(EngineError::encoding_failed(format!(
                    "clip {} missing after encode: {e}",
                    i + 1
                )))
            }
        };
        let clip = Clip {
            filename,
            size_bytes,
            range: *range,
        };
        if let Err(e) = ctx.store.append_clip(id, clip.clone()).await {
            return RunOutcome::failed(e.into());
        }
        debug!(job_id = %id, clip = %clip.filename, "Clip ready");
        ctx.hub.publish(id, JobEvent::clip_ready(clip)).await;
        produced += 1;
    }

    RunOutcome::Completed { total: produced }
}

/// Persist the terminal status, emit exactly one terminal event, and tear
/// down the job's channel and cancel flag.
async fn finalize(ctx: &ExecCtx, id: &JobId, outcome: RunOutcome) {
    let event = match &outcome {
        RunOutcome::Completed { total } => {
            if let Err(e) = ctx.store.mark_completed(id).await {
                error!(job_id = %id, error = %e, "Could not persist completed status");
            }
            info!(job_id = %id, total = *total, "Job completed");
            JobEvent::complete(*total)
        }
        RunOutcome::Cancelled => {
            if let Err(e) = ctx.store.mark_cancelled(id).await {
                error!(job_id = %id, error = %e, "Could not persist cancelled status");
            }
            info!(job_id = %id, "Job cancelled");
            JobEvent::Cancelled
        }
        RunOutcome::Failed { message } => {
            if let Err(e) = ctx.store.mark_failed(id, message).await {
                error!(job_id = %id, error = %e, "Could not persist failed status");
            }
            error!(job_id = %id, error = %message, "Job failed");
            JobEvent::error(message.clone())
        }
    };
    ctx.hub.publish(id, event).await;
    ctx.hub.release(id).await;
    ctx.running.lock().await.remove(id);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Semaphore;

    use gifsplit_media::Encoder;
    use gifsplit_models::{JobId, JobStatus, RawSettings};

    use crate::error::EngineError;
    use crate::testutil::{
        engine_with, wait_for_call, wait_terminal, FailingSegmenter, ScriptedEncoder,
        StaticSegmenter,
    };

    fn capped(max_duration: f64) -> RawSettings {
        RawSettings {
            max_duration: Some(max_duration),
            ..RawSettings::default()
        }
    }

    #[tokio::test]
    async fn test_long_scene_splits_into_capped_clips() {
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(12.0)),
            Arc::new(ScriptedEncoder::default()),
            |_| {},
        )
        .await;

        let sub = t.engine.submit(b"video-bytes", &capped(5.0)).await.unwrap();
        assert!(!sub.cached);
        assert_eq!(sub.job.status, JobStatus::Running);

        let job = wait_terminal(&t.engine, &sub.job.id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());

        // 12s under a 5s cap: three even 4s clips, not 5+5+2.
        assert_eq!(job.clips.len(), 3);
        for clip in &job.clips {
            assert!((clip.range.duration() - 4.0).abs() < 1e-9);
            assert!(clip.size_bytes > 0);
            assert!(t.config.artifact_path(&job.id, &clip.filename).exists());
        }
        assert!(job.clips[0].filename.starts_with("clip_0001_"));
        assert!(job.clips[2].filename.starts_with("clip_0003_"));
    }

    #[tokio::test]
    async fn test_duplicate_submission_hits_the_cache() {
        let encoder = Arc::new(ScriptedEncoder::default());
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(12.0)),
            Arc::clone(&encoder) as Arc<dyn Encoder>,
            |_| {},
        )
        .await;

        let first = t.engine.submit(b"same-bytes", &capped(5.0)).await.unwrap();
        wait_terminal(&t.engine, &first.job.id).await;
        assert_eq!(encoder.clip_calls(), 3);

        let second = t.engine.submit(b"same-bytes", &capped(5.0)).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.job.id, first.job.id);
        assert_eq!(encoder.clip_calls(), 3);
    }

    #[tokio::test]
    async fn test_inflight_duplicate_joins_the_running_job() {
        let gate = Arc::new(Semaphore::new(0));
        let encoder = Arc::new(ScriptedEncoder::gated(Arc::clone(&gate)));
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(12.0)),
            Arc::clone(&encoder) as Arc<dyn Encoder>,
            |_| {},
        )
        .await;

        let first = t.engine.submit(b"same-bytes", &capped(5.0)).await.unwrap();
        let second = t.engine.submit(b"same-bytes", &capped(5.0)).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.job.id, first.job.id);
        assert_eq!(second.job.status, JobStatus::Running);

        gate.add_permits(3);
        wait_terminal(&t.engine, &first.job.id).await;
        assert_eq!(encoder.clip_calls(), 3);
    }

    #[tokio::test]
    async fn test_different_settings_rerun_the_same_video() {
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(12.0)),
            Arc::new(ScriptedEncoder::default()),
            |_| {},
        )
        .await;

        let first = t.engine.submit(b"same-bytes", &capped(5.0)).await.unwrap();
        wait_terminal(&t.engine, &first.job.id).await;

        let wider = RawSettings {
            max_duration: Some(5.0),
            width: Some(640),
            ..RawSettings::default()
        };
        let second = t.engine.submit(b"same-bytes", &wider).await.unwrap();
        assert!(!second.cached);
        assert_ne!(second.job.id, first.job.id);
        wait_terminal(&t.engine, &second.job.id).await;
    }

    #[tokio::test]
    async fn test_submission_over_the_ceiling_is_rejected() {
        let gate = Arc::new(Semaphore::new(0));
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(4.0)),
            Arc::new(ScriptedEncoder::gated(Arc::clone(&gate))),
            |c| c.max_concurrent_jobs = 1,
        )
        .await;

        let first = t.engine.submit(b"one", &capped(5.0)).await.unwrap();
        let err = t.engine.submit(b"two", &capped(5.0)).await.unwrap_err();
        assert!(matches!(err, EngineError::CapacityExceeded));

        gate.add_permits(8);
        wait_terminal(&t.engine, &first.job.id).await;

        // The slot frees when the execution task winds down.
        let mut third = t.engine.submit(b"three", &capped(5.0)).await;
        for _ in 0..100 {
            if third.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            third = t.engine.submit(b"three", &capped(5.0)).await;
        }
        let third = third.unwrap();
        assert!(!third.cached);
        wait_terminal(&t.engine, &third.job.id).await;
    }

    #[tokio::test]
    async fn test_failed_launch_leaves_nothing_behind() {
        // A zero-capacity store evicts the record inside insert_new, so the
        // launch step's running transition fails against a missing record.
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(4.0)),
            Arc::new(ScriptedEncoder::default()),
            |c| c.max_jobs_stored = 0,
        )
        .await;

        let err = t.engine.submit(b"video", &capped(5.0)).await.unwrap_err();
        assert!(matches!(err, EngineError::Store(_)));

        // Neither a phantom record nor a retained source survives.
        assert!(t.engine.list_jobs(None).await.is_empty());
        let leftovers = std::fs::read_dir(&t.config.upload_dir).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_cancel_discards_the_clip_rendered_past_the_flag() {
        let gate = Arc::new(Semaphore::new(3));
        let encoder = Arc::new(ScriptedEncoder::gated(Arc::clone(&gate)));
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(20.0)),
            Arc::clone(&encoder) as Arc<dyn Encoder>,
            |_| {},
        )
        .await;

        // 20s under a 5s cap: four intervals; the fourth encode blocks.
        let sub = t.engine.submit(b"long-video", &capped(5.0)).await.unwrap();
        wait_for_call(&encoder, 4).await;

        t.engine.cancel(&sub.job.id).await.unwrap();
        gate.add_permits(1);

        let job = wait_terminal(&t.engine, &sub.job.id).await;
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.clips.len(), 3);

        // The fourth file was rendered but must not survive.
        let files = std::fs::read_dir(t.config.job_dir(&job.id))
            .unwrap()
            .count();
        assert_eq!(files, 3);
    }

    #[tokio::test]
    async fn test_cancel_on_a_finished_job_is_a_noop() {
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(4.0)),
            Arc::new(ScriptedEncoder::default()),
            |_| {},
        )
        .await;

        let sub = t.engine.submit(b"short", &capped(5.0)).await.unwrap();
        wait_terminal(&t.engine, &sub.job.id).await;

        t.engine.cancel(&sub.job.id).await.unwrap();
        let job = t.engine.load_job(&sub.job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancel_unknown_job_is_not_found() {
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(4.0)),
            Arc::new(ScriptedEncoder::default()),
            |_| {},
        )
        .await;

        let err = t.engine.cancel(&JobId::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_encode_failure_fails_the_job() {
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(12.0)),
            Arc::new(ScriptedEncoder::failing_on(2)),
            |_| {},
        )
        .await;

        let sub = t.engine.submit(b"video", &capped(5.0)).await.unwrap();
        let job = wait_terminal(&t.engine, &sub.job.id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.clips.len(), 1);
        let message = job.error_message.unwrap();
        assert!(message.contains("clip 2"), "got: {message}");
    }

    #[tokio::test]
    async fn test_scene_detection_failure_fails_the_job() {
        let t = engine_with(
            Arc::new(FailingSegmenter),
            Arc::new(ScriptedEncoder::default()),
            |_| {},
        )
        .await;

        let sub = t.engine.submit(b"video", &capped(5.0)).await.unwrap();
        let job = wait_terminal(&t.engine, &sub.job.id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("scene detection"));
    }

    #[tokio::test]
    async fn test_empty_upload_is_rejected() {
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(4.0)),
            Arc::new(ScriptedEncoder::default()),
            |_| {},
        )
        .await;

        let err = t.engine.submit(b"", &capped(5.0)).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        assert!(t.engine.list_jobs(None).await.is_empty());
    }

    #[tokio::test]
    async fn test_overlong_video_fails_after_acceptance() {
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(3600.0)),
            Arc::new(ScriptedEncoder::default()),
            |c| c.max_video_duration_secs = 60,
        )
        .await;

        let sub = t.engine.submit(b"feature-film", &capped(5.0)).await.unwrap();
        let job = wait_terminal(&t.engine, &sub.job.id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("limit"));
    }

    #[tokio::test]
    async fn test_unreadable_duration_fails_the_job() {
        let t = engine_with(
            Arc::new(StaticSegmenter {
                duration: 0.0,
                scenes: vec![],
            }),
            Arc::new(ScriptedEncoder::default()),
            |_| {},
        )
        .await;

        let sub = t.engine.submit(b"garbage", &capped(5.0)).await.unwrap();
        let job = wait_terminal(&t.engine, &sub.job.id).await;
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_max_clips_truncates_the_plan() {
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(40.0)),
            Arc::new(ScriptedEncoder::default()),
            |c| c.max_clips = 2,
        )
        .await;

        let sub = t.engine.submit(b"video", &capped(5.0)).await.unwrap();
        let job = wait_terminal(&t.engine, &sub.job.id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.clips.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_record_is_dropped_and_rerun() {
        let encoder = Arc::new(ScriptedEncoder::default());
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(12.0)),
            Arc::clone(&encoder) as Arc<dyn Encoder>,
            |_| {},
        )
        .await;

        let first = t.engine.submit(b"bytes", &capped(5.0)).await.unwrap();
        let done = wait_terminal(&t.engine, &first.job.id).await;
        std::fs::remove_file(t.config.artifact_path(&done.id, &done.clips[1].filename)).unwrap();

        let second = t.engine.submit(b"bytes", &capped(5.0)).await.unwrap();
        assert!(!second.cached);
        assert_ne!(second.job.id, first.job.id);
        wait_terminal(&t.engine, &second.job.id).await;

        // The stale record is gone; only the rerun remains.
        assert_eq!(t.engine.list_jobs(None).await.len(), 1);
        assert_eq!(encoder.clip_calls(), 6);
    }

    #[tokio::test]
    async fn test_reprocess_reuses_the_retained_source() {
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(12.0)),
            Arc::new(ScriptedEncoder::default()),
            |_| {},
        )
        .await;

        let first = t.engine.submit(b"bytes", &capped(5.0)).await.unwrap();
        wait_terminal(&t.engine, &first.job.id).await;

        let rerun = t.engine.reprocess(&first.job.id, &capped(6.0)).await.unwrap();
        assert!(!rerun.cached);
        assert_ne!(rerun.job.id, first.job.id);
        let job = wait_terminal(&t.engine, &rerun.job.id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.clips.len(), 2);

        // The original job and its source survive a reprocess.
        assert!(t.config.source_path(&first.job.id).exists());
        let again = t.engine.reprocess(&first.job.id, &capped(5.0)).await.unwrap();
        assert!(again.cached);
        assert_eq!(again.job.id, first.job.id);
    }

    #[tokio::test]
    async fn test_reprocess_unknown_job_on_a_saturated_engine_is_not_found() {
        let gate = Arc::new(Semaphore::new(0));
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(12.0)),
            Arc::new(ScriptedEncoder::gated(Arc::clone(&gate))),
            |c| c.max_concurrent_jobs = 1,
        )
        .await;

        let first = t.engine.submit(b"one", &capped(5.0)).await.unwrap();

        // A bad reference reports NotFound even with every slot busy.
        let err = t.engine.reprocess(&JobId::new(), &capped(5.0)).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));

        // A valid reference still hits the ceiling.
        let err = t.engine.reprocess(&first.job.id, &capped(6.0)).await.unwrap_err();
        assert!(matches!(err, EngineError::CapacityExceeded));

        gate.add_permits(8);
        wait_terminal(&t.engine, &first.job.id).await;
    }

    #[tokio::test]
    async fn test_reprocess_without_source_is_not_found() {
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(4.0)),
            Arc::new(ScriptedEncoder::default()),
            |_| {},
        )
        .await;

        let err = t.engine.reprocess(&JobId::new(), &capped(5.0)).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));

        let sub = t.engine.submit(b"bytes", &capped(5.0)).await.unwrap();
        wait_terminal(&t.engine, &sub.job.id).await;
        std::fs::remove_file(t.config.source_path(&sub.job.id)).unwrap();
        let err = t.engine.reprocess(&sub.job.id, &capped(6.0)).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_attach_streams_progress_in_order() {
        let gate = Arc::new(Semaphore::new(0));
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(12.0)),
            Arc::new(ScriptedEncoder::gated(Arc::clone(&gate))),
            |_| {},
        )
        .await;

        let sub = t.engine.submit(b"video", &capped(5.0)).await.unwrap();
        let mut stream = t.engine.attach(&sub.job.id).await.unwrap();
        gate.add_permits(3);

        let mut kinds = Vec::new();
        while let Some(event) = stream.next().await {
            kinds.push(event.kind());
            if event.is_terminal() {
                break;
            }
        }
        assert_eq!(
            kinds,
            vec!["clip_ready", "clip_ready", "clip_ready", "complete"]
        );
    }

    #[tokio::test]
    async fn test_attach_after_finish_is_gone() {
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(4.0)),
            Arc::new(ScriptedEncoder::default()),
            |_| {},
        )
        .await;

        assert!(t.engine.attach(&JobId::new()).await.is_none());

        let sub = t.engine.submit(b"video", &capped(5.0)).await.unwrap();
        wait_terminal(&t.engine, &sub.job.id).await;
        // Allow the finalizer to tear the channel down.
        for _ in 0..100 {
            if t.engine.attach(&sub.job.id).await.is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("event channel survived job completion");
    }

    #[tokio::test]
    async fn test_list_jobs_caps_the_page_size() {
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(4.0)),
            Arc::new(ScriptedEncoder::default()),
            |c| c.list_jobs_max = 2,
        )
        .await;

        for payload in [&b"one"[..], b"two", b"three"] {
            let sub = t.engine.submit(payload, &capped(5.0)).await.unwrap();
            wait_terminal(&t.engine, &sub.job.id).await;
        }

        assert_eq!(t.engine.list_jobs(None).await.len(), 2);
        assert_eq!(t.engine.list_jobs(Some(1)).await.len(), 1);
        // A caller cannot ask past the ceiling.
        assert_eq!(t.engine.list_jobs(Some(50)).await.len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight_jobs() {
        let gate = Arc::new(Semaphore::new(0));
        let t = engine_with(
            Arc::new(StaticSegmenter::single_scene(12.0)),
            Arc::new(ScriptedEncoder::gated(Arc::clone(&gate))),
            |_| {},
        )
        .await;

        let sub = t.engine.submit(b"video", &capped(5.0)).await.unwrap();
        tokio::join!(t.engine.shutdown(), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            gate.add_permits(16);
        });

        let job = t.engine.load_job(&sub.job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.clips.is_empty());
    }
}
