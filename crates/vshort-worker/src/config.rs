//! Orchestrator configuration.

use std::path::PathBuf;
use std::time::Duration;

use vshort_models::ProcessingOptions;

use crate::retry::RetryConfig;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum jobs processed at the same time
    pub max_concurrent_jobs: usize,
    /// Directory for processed outputs
    pub work_dir: PathBuf,
    /// Retry policy for network failures during upload
    pub upload_retry: RetryConfig,
    /// Pause after each job that reached the upload step, whatever its outcome
    pub upload_delay: Duration,
    /// How long finished jobs stay queryable after completion
    pub job_retention: Duration,
    /// Most finished jobs kept in memory; the oldest are dropped first
    pub max_retained_jobs: usize,
    /// Planning and transcode options
    pub processing: ProcessingOptions,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1,
            work_dir: std::env::temp_dir().join("vshort"),
            upload_retry: RetryConfig::new("youtube_upload")
                .with_max_retries(2)
                .with_base_delay(Duration::from_millis(500)),
            upload_delay: Duration::ZERO,
            job_retention: Duration::from_secs(3600),
            max_retained_jobs: 500,
            processing: ProcessingOptions::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            upload_retry: RetryConfig::new("youtube_upload")
                .with_max_retries(
                    std::env::var("UPLOAD_MAX_RETRIES")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(2),
                )
                .with_base_delay(Duration::from_millis(
                    std::env::var("UPLOAD_RETRY_BASE_MS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(500),
                )),
            upload_delay: Duration::from_secs(
                std::env::var("UPLOAD_DELAY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
            ),
            job_retention: std::env::var("JOB_RETENTION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_retention),
            max_retained_jobs: std::env::var("MAX_RETAINED_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retained_jobs),
            processing: ProcessingOptions::from_env(),
        }
    }
}
