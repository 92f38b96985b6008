//! Append-only upload history records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{JobError, JobId, JobStatus, UploadJob};

/// Immutable snapshot of a job that reached `succeeded` or `failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HistoryRecord {
    /// Job this record was taken from
    pub job_id: JobId,
    /// Source file name, used for duplicate detection when scanning folders
    pub filename: String,
    /// Full source path
    pub source_path: PathBuf,
    /// Video title
    pub title: String,
    /// Terminal status
    pub status: JobStatus,
    /// Platform video ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    /// Watch URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// Failure detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    /// Job creation time
    pub created_at: DateTime<Utc>,
    /// Time the job reached its terminal state
    pub completed_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Snapshot a terminal job. Returns `None` while the job is still running.
    pub fn from_job(job: &UploadJob) -> Option<Self> {
        if !job.is_terminal() {
            return None;
        }
        Some(Self {
            job_id: job.id.clone(),
            filename: job.filename(),
            source_path: job.source_path.clone(),
            title: job.metadata.title.clone(),
            status: job.status,
            video_id: job.video_id.clone(),
            video_url: job.video_url.clone(),
            error: job.error.clone(),
            created_at: job.created_at,
            completed_at: job.completed_at.unwrap_or(job.updated_at),
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Succeeded
    }
}
