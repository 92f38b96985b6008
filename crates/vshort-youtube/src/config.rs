//! Upload client configuration.

use std::time::Duration;

/// Resumable upload endpoint of the Data API.
pub const DEFAULT_UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status";

/// Data API root used for non-upload calls.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Non-final chunks must be a multiple of this.
pub const CHUNK_GRANULARITY: usize = 256 * 1024;

/// 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * CHUNK_GRANULARITY;

/// "People & Blogs".
pub const DEFAULT_CATEGORY_ID: &str = "22";

/// Configuration for the YouTube client.
#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    /// Session-initiation URL
    pub upload_url: String,
    /// Data API root, e.g. for `channels.list`
    pub api_base: String,
    /// Bytes per chunk PUT
    pub chunk_size: usize,
    /// Per-request timeout
    pub timeout: Duration,
    /// Video category
    pub category_id: String,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: Duration::from_secs(120),
            category_id: DEFAULT_CATEGORY_ID.to_string(),
        }
    }
}

impl YouTubeConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            upload_url: std::env::var("YOUTUBE_UPLOAD_URL")
                .unwrap_or_else(|_| DEFAULT_UPLOAD_URL.to_string()),
            api_base: std::env::var("YOUTUBE_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            chunk_size: std::env::var("YOUTUBE_CHUNK_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(align_chunk_size)
                .unwrap_or(DEFAULT_CHUNK_SIZE),
            timeout: Duration::from_secs(
                std::env::var("YOUTUBE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            category_id: std::env::var("YOUTUBE_CATEGORY_ID")
                .unwrap_or_else(|_| DEFAULT_CATEGORY_ID.to_string()),
        }
    }
}

/// Round down to a multiple of [`CHUNK_GRANULARITY`], never below one unit.
pub fn align_chunk_size(bytes: usize) -> usize {
    (bytes / CHUNK_GRANULARITY).max(1) * CHUNK_GRANULARITY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = YouTubeConfig::default();
        assert!(config.upload_url.contains("uploadType=resumable"));
        assert_eq!(config.chunk_size, 1024 * 1024);
        assert_eq!(config.chunk_size % (256 * 1024), 0);
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_align_chunk_size() {
        assert_eq!(align_chunk_size(0), CHUNK_GRANULARITY);
        assert_eq!(align_chunk_size(1000), CHUNK_GRANULARITY);
        assert_eq!(align_chunk_size(CHUNK_GRANULARITY + 1), CHUNK_GRANULARITY);
        assert_eq!(align_chunk_size(5 * 1024 * 1024 + 17), 5 * 1024 * 1024);
        assert_eq!(align_chunk_size(DEFAULT_CHUNK_SIZE), DEFAULT_CHUNK_SIZE);
    }
}
