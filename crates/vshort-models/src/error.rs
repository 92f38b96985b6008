//! Error kinds recorded on failed jobs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ErrorKind {
    /// Source unreadable or corrupt
    ProbeError,
    /// Transcode failure, timeout or cancellation
    ProcessingError,
    /// Expired or invalid platform credentials
    AuthError,
    /// Platform quota or rate limit
    QuotaError,
    /// Transient transport failure
    NetworkError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ProbeError => "ProbeError",
            ErrorKind::ProcessingError => "ProcessingError",
            ErrorKind::AuthError => "AuthError",
            ErrorKind::QuotaError => "QuotaError",
            ErrorKind::NetworkError => "NetworkError",
        }
    }

    /// Only network failures are worth retrying, and only at the upload step.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::NetworkError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error detail stored verbatim on a failed job and its history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for JobError {}
