//! Source video assets.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A source video file on disk together with its probed geometry.
///
/// Assets are read-only once created; a new asset is probed for every upload attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoAsset {
    /// Path to the source file
    pub path: PathBuf,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Duration in seconds
    pub duration: f64,
    /// Frame rate (fps)
    pub frame_rate: f64,
    /// Video codec name reported by the probe
    #[serde(default)]
    pub codec: String,
    /// File size in bytes
    #[serde(default)]
    pub size: u64,
    /// Whether the file carries an audio stream
    #[serde(default)]
    pub has_audio: bool,
}

impl VideoAsset {
    /// Width / height, or 0.0 for a zero-height frame.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    /// Zero width, height or duration.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0 || !(self.duration > 0.0)
    }

    /// File name component of the path.
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}
