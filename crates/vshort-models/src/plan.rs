//! Processing plans for 9:16 normalization.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::geometry::{CropRect, TrimWindow};

/// Target aspect ratio (width / height) for vertical short-form video.
pub const TARGET_ASPECT: f64 = 9.0 / 16.0;

/// Largest output height; 1080x1920 is the platform's native Shorts resolution.
pub const TARGET_HEIGHT_MAX: u32 = 1920;

/// Default platform duration limit in seconds.
pub const DEFAULT_MAX_DURATION_SECONDS: u32 = 60;

/// Default relative aspect-ratio tolerance (1%).
pub const DEFAULT_ASPECT_TOLERANCE: f64 = 0.01;

/// Default wall-clock limit for a single transcode.
pub const DEFAULT_TRANSCODE_TIMEOUT_SECONDS: u64 = 600;

/// Options that drive planning and execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingOptions {
    /// Platform duration limit in seconds
    #[serde(default = "default_max_duration")]
    pub max_duration_seconds: u32,
    /// Accepted relative deviation from 9:16
    #[serde(default = "default_aspect_tolerance")]
    pub aspect_tolerance: f64,
    /// Transcode timeout in seconds
    #[serde(default = "default_transcode_timeout")]
    pub transcode_timeout_seconds: u64,
}

fn default_max_duration() -> u32 {
    DEFAULT_MAX_DURATION_SECONDS
}
fn default_aspect_tolerance() -> f64 {
    DEFAULT_ASPECT_TOLERANCE
}
fn default_transcode_timeout() -> u64 {
    DEFAULT_TRANSCODE_TIMEOUT_SECONDS
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            max_duration_seconds: DEFAULT_MAX_DURATION_SECONDS,
            aspect_tolerance: DEFAULT_ASPECT_TOLERANCE,
            transcode_timeout_seconds: DEFAULT_TRANSCODE_TIMEOUT_SECONDS,
        }
    }
}

impl ProcessingOptions {
    /// Create options from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_duration_seconds: std::env::var("MAX_DURATION_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_DURATION_SECONDS),
            aspect_tolerance: std::env::var("ASPECT_TOLERANCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_ASPECT_TOLERANCE),
            transcode_timeout_seconds: std::env::var("TRANSCODE_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TRANSCODE_TIMEOUT_SECONDS),
        }
    }

    /// Duration limit as seconds.
    pub fn max_duration(&self) -> f64 {
        self.max_duration_seconds as f64
    }

    /// Whether `ratio` is 9:16 within the configured relative tolerance.
    pub fn is_vertical(&self, ratio: f64) -> bool {
        ratio > 0.0 && (ratio / TARGET_ASPECT - 1.0).abs() <= self.aspect_tolerance
    }
}

/// How a source asset is turned into a compliant 9:16 output.
///
/// Computed once per upload attempt and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingPlan {
    /// False when the source is already 9:16 and within the duration limit
    pub needs_transform: bool,
    /// Region of the source frame kept in the output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropRect>,
    /// Time range kept in the output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim: Option<TrimWindow>,
    /// Output width in pixels
    pub target_width: u32,
    /// Output height in pixels
    pub target_height: u32,
}

impl ProcessingPlan {
    /// Plan for a source that is uploaded as-is.
    pub fn passthrough(width: u32, height: u32) -> Self {
        Self {
            needs_transform: false,
            crop: None,
            trim: None,
            target_width: width,
            target_height: height,
        }
    }

    /// Output aspect ratio.
    pub fn target_aspect(&self) -> f64 {
        if self.target_height == 0 {
            return 0.0;
        }
        self.target_width as f64 / self.target_height as f64
    }
}
