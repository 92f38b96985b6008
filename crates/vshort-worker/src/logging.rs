//! Structured job logging utilities.

use tracing::{error, info, warn, Span};
use vshort_models::JobId;

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    filename: String,
}

impl JobLogger {
    /// Create a logger for one job and its source file name.
    pub fn new(job_id: &JobId, filename: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            filename: filename.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            filename = %self.filename,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            filename = %self.filename,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            filename = %self.filename,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            filename = %self.filename,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            filename = %self.filename,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Span wrapping the job's background task.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "upload_job",
            job_id = %self.job_id,
            filename = %self.filename
        )
    }
}
