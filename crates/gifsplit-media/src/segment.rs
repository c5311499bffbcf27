//! Scene boundary detection.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use gifsplit_models::TimeRange;

use crate::command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::probe_duration;

/// Boundaries closer together than this collapse into one scene.
const MIN_SCENE_SECS: f64 = 0.1;

/// Detects ordered scene boundaries in a source video.
///
/// Implementations must be deterministic: identical input and threshold
/// always yield the same ranges. Returned ranges are ordered,
/// non-overlapping, and cover the whole video.
#[async_trait]
pub trait Segmenter: Send + Sync {
    /// Total source duration in seconds.
    async fn probe(&self, input: &Path) -> MediaResult<f64>;

    async fn detect_scenes(&self, input: &Path, threshold: u32) -> MediaResult<Vec<TimeRange>>;
}

/// FFmpeg-backed segmenter built on the `scene` change score.
///
/// Runs a decode pass with `select='gt(scene,…)',showinfo` and reads cut
/// timestamps from the filter's stderr report. The user-facing threshold
/// scale (10–60) maps onto the filter's 0.10–0.60 score range.
pub struct SceneSegmenter {
    timeout_secs: u64,
}

impl SceneSegmenter {
    pub fn new(timeout_secs: u64) -> MediaResult<Self> {
        check_ffmpeg()?;
        check_ffprobe()?;
        Ok(Self { timeout_secs })
    }
}

#[async_trait]
impl Segmenter for SceneSegmenter {
    async fn probe(&self, input: &Path) -> MediaResult<f64> {
        probe_duration(input).await
    }

    async fn detect_scenes(&self, input: &Path, threshold: u32) -> MediaResult<Vec<TimeRange>> {
        let duration = probe_duration(input).await?;

        let score = threshold as f64 / 100.0;
        // showinfo reports at info level, so the detection pass cannot run quiet
        let cmd = FfmpegCommand::new(input, "-")
            .log_level("info")
            .video_filter(format!("select='gt(scene,{score:.2})',showinfo"))
            .output_arg("-f")
            .output_arg("null");

        let stderr = FfmpegRunner::new()
            .with_timeout(self.timeout_secs)
            .run_capture(&cmd)
            .await?;

        let cuts = parse_scene_times(&stderr);
        debug!(cuts = cuts.len(), duration, "Scene detection pass finished");

        let scenes = build_scene_ranges(&cuts, duration);
        info!(scenes = scenes.len(), "Detected scenes");
        Ok(scenes)
    }
}

/// Extract `pts_time:` values from a showinfo stderr capture.
fn parse_scene_times(stderr: &str) -> Vec<f64> {
    let mut times: Vec<f64> = stderr
        .lines()
        .filter_map(|line| {
            let rest = &line[line.find("pts_time:")? + "pts_time:".len()..];
            let token = rest.split_whitespace().next()?;
            token.parse::<f64>().ok()
        })
        .collect();
    times.sort_by(|a, b| a.total_cmp(b));
    times
}

/// Turn cut timestamps into covering scene ranges.
///
/// Cuts outside `(0, duration)` and cuts landing within [`MIN_SCENE_SECS`]
/// of the previous boundary are dropped. No cuts means the whole video is
/// one scene.
fn build_scene_ranges(cuts: &[f64], duration: f64) -> Vec<TimeRange> {
    let mut scenes = Vec::new();
    let mut prev = 0.0;

    for &cut in cuts {
        if cut <= prev + MIN_SCENE_SECS || cut >= duration {
            continue;
        }
        scenes.push(TimeRange::new(prev, cut));
        prev = cut;
    }

    if duration > prev {
        scenes.push(TimeRange::new(prev, duration));
    }
    scenes
}
