//! Shared fakes and builders for the engine test suites.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Semaphore;

use gifsplit_media::{Encoder, MediaError, MediaResult, Segmenter};
use gifsplit_models::{Job, JobId, TimeRange};
use gifsplit_store::CacheStore;

use crate::config::EngineConfig;
use crate::orchestrator::Engine;

/// Segmenter returning a fixed duration and scene list.
pub struct StaticSegmenter {
    pub duration: f64,
    pub scenes: Vec<TimeRange>,
}

impl StaticSegmenter {
    /// One scene covering the whole duration.
    pub fn single_scene(duration: f64) -> Self {
        Self {
            duration,
            scenes: vec![TimeRange::new(0.0, duration)],
        }
    }
}

#[async_trait]
impl Segmenter for StaticSegmenter {
    async fn probe(&self, _input: &Path) -> MediaResult<f64> {
        Ok(self.duration)
    }

    async fn detect_scenes(&self, _input: &Path, _threshold: u32) -> MediaResult<Vec<TimeRange>> {
        Ok(self.scenes.clone())
    }
}

/// Segmenter whose scene detection always fails.
pub struct FailingSegmenter;

#[async_trait]
impl Segmenter for FailingSegmenter {
    async fn probe(&self, _input: &Path) -> MediaResult<f64> {
        Ok(30.0)
    }

    async fn detect_scenes(&self, _input: &Path, _threshold: u32) -> MediaResult<Vec<TimeRange>> {
        Err(MediaError::ffmpeg_failed(
            "scene filter crashed",
            None,
            Some(1),
        ))
    }
}

/// Encoder that writes a small placeholder file per call.
///
/// A test can gate it on a semaphore to freeze a job mid-run (each clip
/// encode consumes one gate permit), or script a failure on a specific
/// 1-based call number.
#[derive(Default)]
pub struct ScriptedEncoder {
    pub gate: Option<Arc<Semaphore>>,
    pub fail_on_call: Option<usize>,
    pub fail_concat: bool,
    pub calls: AtomicUsize,
}

impl ScriptedEncoder {
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn clip_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Encoder for ScriptedEncoder {
    async fn encode_clip(
        &self,
        _input: &Path,
        _range: TimeRange,
        _width: u32,
        _fps: u32,
        output: &Path,
    ) -> MediaResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| MediaError::ffmpeg_failed("gate closed", None, None))?;
            permit.forget();
        }
        if self.fail_on_call == Some(call) {
            return Err(MediaError::ffmpeg_failed("encode exploded", None, Some(1)));
        }
        tokio::fs::write(output, b"GIF89a-clip").await?;
        Ok(())
    }

    async fn concat(&self, _inputs: &[PathBuf], _width: u32, output: &Path) -> MediaResult<()> {
        if self.fail_concat {
            return Err(MediaError::ffmpeg_failed("concat exploded", None, Some(1)));
        }
        tokio::fs::write(output, b"GIF89a-merged").await?;
        Ok(())
    }

    async fn recolor(&self, _input: &Path, output: &Path) -> MediaResult<()> {
        tokio::fs::write(output, b"GIF89a-gray").await?;
        Ok(())
    }
}

/// An engine wired to fakes over a temp directory.
pub struct TestEngine {
    pub engine: Engine,
    pub config: EngineConfig,
    _dir: TempDir,
}

pub async fn engine_with(
    segmenter: Arc<dyn Segmenter>,
    encoder: Arc<dyn Encoder>,
    tune: impl FnOnce(&mut EngineConfig),
) -> TestEngine {
    let dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig {
        upload_dir: dir.path().join("sources"),
        output_dir: dir.path().join("clips"),
        store_path: dir.path().join("store.json"),
        ..EngineConfig::default()
    };
    tune(&mut config);
    let store = CacheStore::open(&config.store_path, config.max_jobs_stored)
        .await
        .unwrap();
    let engine = Engine::new(config.clone(), store, segmenter, encoder);
    TestEngine {
        engine,
        config,
        _dir: dir,
    }
}

/// Poll until a job reaches a terminal state.
pub async fn wait_terminal(engine: &Engine, id: &JobId) -> Job {
    for _ in 0..500 {
        if let Ok(job) = engine.load_job(id).await {
            if job.status.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never reached a terminal state");
}

/// Poll until the encoder has started the given 1-based clip call.
pub async fn wait_for_call(encoder: &ScriptedEncoder, call: usize) {
    for _ in 0..500 {
        if encoder.clip_calls() >= call {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("encoder never reached call {call}");
}
