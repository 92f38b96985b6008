//! Upload job definitions and the job state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::{JobError, ProcessingPlan, UploadMetadata, VideoAsset};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the ID looks like one we issued (a UUID).
    pub fn is_valid(s: &str) -> bool {
        Uuid::parse_str(s).is_ok()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upload job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, not started
    #[default]
    Pending,
    /// Probing and transcoding the source
    Processing,
    /// Sending bytes to the platform
    Uploading,
    /// Platform acknowledged the upload
    Succeeded,
    /// Terminal failure
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Uploading => "uploading",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Cancellation is only possible before the platform upload call is issued.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Processing)
    }

    /// Whether `self -> next` is a legal forward transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Processing, Uploading)
                | (Processing, Failed)
                | (Uploading, Succeeded)
                | (Uploading, Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid job transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One upload attempt.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UploadJob {
    /// Unique job ID
    pub id: JobId,

    /// File the user selected
    pub source_path: PathBuf,

    /// Probed source asset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<VideoAsset>,

    /// Plan derived from the asset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<ProcessingPlan>,

    /// Title, description, tags, privacy
    pub metadata: UploadMetadata,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Error detail (failed jobs only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,

    /// Platform video ID (succeeded jobs only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,

    /// Watch URL (succeeded jobs only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    /// Temporary transcode output, if one was produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Completed at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadJob {
    /// Create a new pending job.
    pub fn new(source_path: impl Into<PathBuf>, metadata: UploadMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            source_path: source_path.into(),
            asset: None,
            plan: None,
            metadata,
            status: JobStatus::Pending,
            error: None,
            video_id: None,
            video_url: None,
            output_path: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// File name of the source.
    pub fn filename(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `next`, rejecting backwards or skipping transitions.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    /// Mark job as failed with an error.
    pub fn fail(&mut self, error: JobError) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error);
        Ok(())
    }

    /// Mark job as succeeded with the platform's video ID.
    pub fn succeed(
        &mut self,
        video_id: impl Into<String>,
        video_url: impl Into<String>,
    ) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Succeeded)?;
        self.video_id = Some(video_id.into());
        self.video_url = Some(video_url.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn job() -> UploadJob {
        UploadJob::new("/videos/a.mp4", UploadMetadata::new("A", ""))
    }

    #[test]
    fn test_job_id_generation() {
        let id1 = JobId::new();
        let id2 = JobId::new();
        assert_ne!(id1, id2);
        assert!(JobId::is_valid(id1.as_str()));
        assert!(!JobId::is_valid("not-a-job"));
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = job();
        assert_eq!(job.status, JobStatus::Pending);
        job.transition(JobStatus::Processing).unwrap();
        job.transition(JobStatus::Uploading).unwrap();
        job.succeed("abc123", "https://www.youtube.com/watch?v=abc123").unwrap();
        assert!(job.is_terminal());
        assert!(job.completed_at.is_some());
        assert_eq!(job.video_id.as_deref(), Some("abc123"));
        assert!(job.error.is_none());
    }

    #[test]
    fn test_no_backwards_transitions() {
        let mut job = job();
        job.transition(JobStatus::Processing).unwrap();
        let err = job.transition(JobStatus::Pending).unwrap_err();
        assert_eq!(err.from, JobStatus::Processing);
        assert_eq!(err.to, JobStatus::Pending);

        job.transition(JobStatus::Uploading).unwrap();
        assert!(job.transition(JobStatus::Processing).is_err());
    }

    #[test]
    fn test_terminal_is_final() {
        let mut job = job();
        job.fail(JobError::new(ErrorKind::ProcessingError, "cancelled by user"))
            .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.transition(JobStatus::Processing).is_err());
        assert!(job.succeed("x", "y").is_err());
        assert_eq!(job.error.as_ref().map(|e| e.kind), Some(ErrorKind::ProcessingError));
    }

    #[test]
    fn test_cannot_skip_to_success() {
        let mut job = job();
        assert!(job.succeed("x", "y").is_err());
        job.transition(JobStatus::Processing).unwrap();
        assert!(job.succeed("x", "y").is_err());
    }

    #[test]
    fn test_cancellable_states() {
        assert!(JobStatus::Pending.is_cancellable());
        assert!(JobStatus::Processing.is_cancellable());
        assert!(!JobStatus::Uploading.is_cancellable());
        assert!(!JobStatus::Failed.is_cancellable());
    }
}
