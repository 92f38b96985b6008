//! Orchestrator error types.

use std::path::PathBuf;
use thiserror::Error;

use vshort_models::{InvalidTransition, JobId, JobStatus};

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors returned to callers of the orchestrator.
///
/// Failures inside a running job never surface here; they end up in the job's
/// `JobError` instead.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("{} already has an active upload job ({job_id})", path.display())]
    SourceBusy { path: PathBuf, job_id: JobId },

    #[error("Job {job_id} cannot be cancelled while {status}")]
    NotCancellable { job_id: JobId, status: JobStatus },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("History error: {0}")]
    History(#[from] vshort_history::HistoryError),
}

impl WorkerError {
    pub fn not_found(job_id: &JobId) -> Self {
        Self::NotFound(job_id.clone())
    }
}
