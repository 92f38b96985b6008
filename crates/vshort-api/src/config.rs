//! API configuration.

use std::path::PathBuf;

use vshort_models::metadata::DEFAULT_TAGS;
use vshort_models::{PrivacyStatus, UploadMetadata};

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size
    pub max_body_size: usize,
    /// Upload history JSON file
    pub history_file: PathBuf,
    /// App config JSON holding `youtube_credentials`
    pub credentials_file: PathBuf,
    /// Privacy used when a request names none
    pub default_privacy: PrivacyStatus,
    /// Tags used when a request names none
    pub default_tags: Vec<String>,
    /// Environment (development/production)
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            cors_origins: vec!["*".to_string()],
            max_body_size: 1024 * 1024, // 1MB
            history_file: PathBuf::from("history.json"),
            credentials_file: PathBuf::from("config.json"),
            default_privacy: PrivacyStatus::Public,
            default_tags: UploadMetadata::parse_tags(DEFAULT_TAGS),
            environment: "development".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            history_file: std::env::var("HISTORY_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.history_file),
            credentials_file: std::env::var("CREDENTIALS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.credentials_file),
            default_privacy: std::env::var("DEFAULT_PRIVACY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_privacy),
            default_tags: std::env::var("DEFAULT_TAGS")
                .map(|s| UploadMetadata::parse_tags(&s))
                .unwrap_or(defaults.default_tags),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}
