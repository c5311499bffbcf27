//! Output settings and their boundary validation.
//!
//! Requests arrive with loosely-typed, partially-absent fields. They are
//! converted exactly once, at the boundary, into a [`ClipSettings`] record
//! with every field clamped to its documented range; nothing downstream
//! re-validates. The canonical tag feeds the cache fingerprint, so two
//! requests with the same effective settings always share a cache key no
//! matter how they were spelled on the wire.

use serde::{Deserialize, Serialize};

/// Raw, untrusted settings as they arrive at the boundary.
///
/// All fields optional; absent fields fall back to the configured defaults.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RawSettings {
    pub max_duration: Option<f64>,
    pub fps: Option<u32>,
    pub width: Option<u32>,
    pub threshold: Option<u32>,
}

/// Validated settings a job renders with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipSettings {
    /// Duration cap per clip in seconds, quantized to tenths
    pub max_clip_secs: f64,
    /// Output frame rate
    pub fps: u32,
    /// Output width in pixels; height scales to keep aspect
    pub width: u32,
    /// Scene detection sensitivity (lower = more cuts)
    pub threshold: u32,
}

impl ClipSettings {
    pub const DURATION_MIN: f64 = 1.0;
    pub const DURATION_MAX: f64 = 30.0;
    pub const FPS_MIN: u32 = 5;
    pub const FPS_MAX: u32 = 30;
    pub const WIDTH_MIN: u32 = 240;
    pub const WIDTH_MAX: u32 = 1920;
    pub const THRESHOLD_MIN: u32 = 10;
    pub const THRESHOLD_MAX: u32 = 60;

    /// Resolve raw request fields against defaults, clamping each to range.
    ///
    /// The duration cap is additionally quantized to tenths of a second so
    /// `"5"`, `"5.0"`, and `5.00001` all canonicalize identically.
    pub fn from_raw(raw: &RawSettings, defaults: &ClipSettings) -> Self {
        let max_clip_secs = raw
            .max_duration
            .filter(|d| d.is_finite())
            .unwrap_or(defaults.max_clip_secs)
            .clamp(Self::DURATION_MIN, Self::DURATION_MAX);
        Self {
            max_clip_secs: quantize_tenths(max_clip_secs),
            fps: raw
                .fps
                .unwrap_or(defaults.fps)
                .clamp(Self::FPS_MIN, Self::FPS_MAX),
            width: raw
                .width
                .unwrap_or(defaults.width)
                .clamp(Self::WIDTH_MIN, Self::WIDTH_MAX),
            threshold: raw
                .threshold
                .unwrap_or(defaults.threshold)
                .clamp(Self::THRESHOLD_MIN, Self::THRESHOLD_MAX),
        }
    }

    /// Canonical serialization: fixed field order, fixed formatting.
    ///
    /// Feeds the cache fingerprint; also readable in logs.
    pub fn canonical_tag(&self) -> String {
        format!(
            "d{:.1}_f{}_w{}_t{}",
            self.max_clip_secs, self.fps, self.width, self.threshold
        )
    }
}

impl Default for ClipSettings {
    fn default() -> Self {
        Self {
            max_clip_secs: 5.0,
            fps: 10,
            width: 480,
            threshold: 30,
        }
    }
}

fn quantize_tenths(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
