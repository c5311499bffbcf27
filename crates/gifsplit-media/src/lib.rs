//! FFmpeg CLI wrappers for scene detection and clip rendering.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - A runner with hard kill-on-timeout
//! - FFprobe duration inspection
//! - The `Segmenter` and `Encoder` capability traits with their
//!   production implementations

pub mod command;
pub mod encode;
pub mod error;
pub mod probe;
pub mod segment;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use encode::{Encoder, GifEncoder};
pub use error::{MediaError, MediaResult};
pub use probe::probe_duration;
pub use segment::{SceneSegmenter, Segmenter};
