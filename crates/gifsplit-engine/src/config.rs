//! Engine configuration.

use std::path::PathBuf;

use gifsplit_models::{ClipSettings, JobId};

/// Engine configuration.
///
/// Every knob has an environment variable and a default; unparseable values
/// fall back to the default rather than failing startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum concurrently running jobs (the slot ceiling)
    pub max_concurrent_jobs: usize,
    /// Maximum retained cache records; past this, oldest are evicted
    pub max_jobs_stored: usize,
    /// Hours after which terminal jobs are swept; 0 disables the sweep
    pub job_expiry_hours: u64,
    /// Longest accepted source duration in seconds; 0 = unlimited
    pub max_video_duration_secs: u64,
    /// Hard cap on clips per job; 0 = unlimited
    pub max_clips: usize,
    /// Most clips one merge may reference
    pub max_merge_gifs: usize,
    /// Per-clip encode timeout in seconds
    pub encode_timeout_secs: u64,
    /// Merge (concat) timeout in seconds
    pub merge_timeout_secs: u64,
    /// Default output settings for fields absent from a request
    pub defaults: ClipSettings,
    /// Directory for retained source files
    pub upload_dir: PathBuf,
    /// Directory holding one artifact subdirectory per job
    pub output_dir: PathBuf,
    /// Path of the durable store file
    pub store_path: PathBuf,
    /// Idle interval before an event subscription synthesizes a keepalive
    pub keepalive_secs: u64,
    /// Hard cap on `list_jobs` results
    pub list_jobs_max: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 5,
            max_jobs_stored: 100,
            job_expiry_hours: 0,
            max_video_duration_secs: 10_800,
            max_clips: 0,
            max_merge_gifs: 20,
            encode_timeout_secs: 60,
            merge_timeout_secs: 300,
            defaults: ClipSettings::default(),
            upload_dir: PathBuf::from("data/sources"),
            output_dir: PathBuf::from("data/clips"),
            store_path: PathBuf::from("data/store.json"),
            keepalive_secs: 30,
            list_jobs_max: 50,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let base = ClipSettings::default();
        let defaults = ClipSettings {
            max_clip_secs: std::env::var("DEFAULT_GIF_DURATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.max_clip_secs),
            fps: std::env::var("DEFAULT_GIF_FPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.fps),
            width: std::env::var("DEFAULT_GIF_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.width),
            threshold: std::env::var("DEFAULT_SCENE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.threshold),
        };

        Self {
            max_concurrent_jobs: std::env::var("MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            max_jobs_stored: std::env::var("MAX_JOBS_STORED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
            job_expiry_hours: std::env::var("JOB_EXPIRY_HOURS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            max_video_duration_secs: std::env::var("MAX_VIDEO_DURATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_800),
            max_clips: std::env::var("MAX_CLIPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            max_merge_gifs: std::env::var("MAX_MERGE_GIFS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
            encode_timeout_secs: std::env::var("FFMPEG_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            merge_timeout_secs: std::env::var("FFMPEG_MERGE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            defaults,
            upload_dir: std::env::var("UPLOAD_FOLDER")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/sources")),
            output_dir: std::env::var("OUTPUT_FOLDER")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/clips")),
            store_path: std::env::var("CACHE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/store.json")),
            keepalive_secs: std::env::var("KEEPALIVE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            list_jobs_max: std::env::var("LIST_JOBS_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50),
        }
    }

    /// Retained source file for a job.
    pub fn source_path(&self, id: &JobId) -> PathBuf {
        self.upload_dir.join(format!("{id}.src"))
    }

    /// Artifact directory for a job.
    pub fn job_dir(&self, id: &JobId) -> PathBuf {
        self.output_dir.join(id.as_str())
    }

    /// Path of one named artifact within a job's directory.
    ///
    /// Callers must have validated `name` against the artifact naming rules;
    /// the join is only safe for separator-free names.
    pub fn artifact_path(&self, id: &JobId, name: &str) -> PathBuf {
        self.job_dir(id).join(name)
    }
}
