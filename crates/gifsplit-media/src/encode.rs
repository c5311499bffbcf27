//! Artifact rendering.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use gifsplit_models::TimeRange;

use crate::command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Renders animated clip artifacts from source video.
///
/// Every operation is bounded by a hard timeout; on timeout the child
/// process is killed and the output path must be treated as garbage.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Render one clip for `range` into `output`.
    async fn encode_clip(
        &self,
        input: &Path,
        range: TimeRange,
        width: u32,
        fps: u32,
        output: &Path,
    ) -> MediaResult<()>;

    /// Concatenate already-rendered artifacts, in the given order, into
    /// `output`. Runs under the longer merge timeout.
    async fn concat(&self, inputs: &[PathBuf], width: u32, output: &Path) -> MediaResult<()>;

    /// Render a grayscale variant of an artifact.
    async fn recolor(&self, input: &Path, output: &Path) -> MediaResult<()>;
}

/// FFmpeg-backed GIF encoder.
pub struct GifEncoder {
    clip_timeout_secs: u64,
    merge_timeout_secs: u64,
}

impl GifEncoder {
    pub fn new(clip_timeout_secs: u64, merge_timeout_secs: u64) -> MediaResult<Self> {
        check_ffmpeg()?;
        Ok(Self {
            clip_timeout_secs,
            merge_timeout_secs,
        })
    }
}

#[async_trait]
impl Encoder for GifEncoder {
    async fn encode_clip(
        &self,
        input: &Path,
        range: TimeRange,
        width: u32,
        fps: u32,
        output: &Path,
    ) -> MediaResult<()> {
        debug!(
            start = range.start,
            end = range.end,
            "Encoding clip to {}",
            output.display()
        );

        // -ss before -i for fast input seeking; -t is the post-seek duration
        let cmd = FfmpegCommand::new(input, output)
            .seek(range.start)
            .duration(range.duration())
            .video_filter(format!("fps={fps},scale={width}:-1:flags=fast_bilinear"))
            .output_arg("-loop")
            .output_arg("0");

        FfmpegRunner::new()
            .with_timeout(self.clip_timeout_secs)
            .run(&cmd)
            .await
    }

    async fn concat(&self, inputs: &[PathBuf], width: u32, output: &Path) -> MediaResult<()> {
        debug!(count = inputs.len(), "Concatenating clips");

        let mut cmd = FfmpegCommand::new(&inputs[0], output);
        for input in &inputs[1..] {
            cmd = cmd.add_input(input);
        }

        let cmd = cmd
            .filter_complex(concat_filter(inputs.len(), width))
            .output_arg("-map")
            .output_arg("[out]")
            .output_arg("-loop")
            .output_arg("0");

        FfmpegRunner::new()
            .with_timeout(self.merge_timeout_secs)
            .run(&cmd)
            .await
    }

    async fn recolor(&self, input: &Path, output: &Path) -> MediaResult<()> {
        debug!("Recoloring {} -> {}", input.display(), output.display());

        let cmd = FfmpegCommand::new(input, output)
            .video_filter("format=gray")
            .output_arg("-loop")
            .output_arg("0");

        FfmpegRunner::new()
            .with_timeout(self.clip_timeout_secs)
            .run(&cmd)
            .await
    }
}

/// Scale every input to a common width, then concatenate in order.
fn concat_filter(n: usize, width: u32) -> String {
    let mut parts: Vec<String> = (0..n)
        .map(|i| format!("[{i}:v]scale={width}:-1:flags=fast_bilinear,setsar=1[v{i}]"))
        .collect();

    let labels: String = (0..n).map(|i| format!("[v{i}]")).collect();
    parts.push(format!("{labels}concat=n={n}:v=1:a=0[out]"));
    parts.join(";")
}
