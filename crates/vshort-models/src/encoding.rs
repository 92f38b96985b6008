//! Output encoding settings for the 9:16 transcode.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// H.264 video
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
pub const DEFAULT_PRESET: &str = "medium";
pub const DEFAULT_CRF: u8 = 23;
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Codec, quality and container flags for processed uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video encoder passed to `-c:v`
    pub codec: String,
    /// x264 speed/quality preset
    pub preset: String,
    /// Constant Rate Factor, 0-51, lower is better
    pub crf: u8,
    /// Audio encoder, used only when the source has audio
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Output flags appended after the codec options
    pub extra_args: Vec<String>,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            // moov atom at the front of the file
            extra_args: vec!["-movflags".to_string(), "+faststart".to_string()],
        }
    }
}

impl EncodingConfig {
    /// Defaults overridden by `FFMPEG_PRESET` and `FFMPEG_CRF`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            preset: std::env::var("FFMPEG_PRESET").unwrap_or(defaults.preset),
            crf: std::env::var("FFMPEG_CRF")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|crf: &u8| *crf <= 51)
                .unwrap_or(defaults.crf),
            ..defaults
        }
    }

    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }
}
