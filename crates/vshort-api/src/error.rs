//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use vshort_history::HistoryError;
use vshort_media::MediaError;
use vshort_models::ErrorKind;
use vshort_worker::WorkerError;
use vshort_youtube::PlatformError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Worker(e) => match e {
                WorkerError::NotFound(_) => StatusCode::NOT_FOUND,
                WorkerError::SourceBusy { .. } | WorkerError::NotCancellable { .. } => StatusCode::CONFLICT,
                WorkerError::InvalidTransition(_) | WorkerError::History(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Media(e) => match e {
                MediaError::FileNotFound(_) => StatusCode::NOT_FOUND,
                MediaError::FfmpegNotFound | MediaError::FfprobeNotFound => StatusCode::SERVICE_UNAVAILABLE,
                MediaError::FfprobeFailed { .. }
                | MediaError::JsonParse(_)
                | MediaError::InvalidVideo(_)
                | MediaError::DegenerateGeometry { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                MediaError::AlreadyCompliant(_) => StatusCode::BAD_REQUEST,
                MediaError::OutputExists(_) => StatusCode::CONFLICT,
                MediaError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Platform(e) => match e {
                PlatformError::Auth(_) => StatusCode::UNAUTHORIZED,
                _ => StatusCode::BAD_GATEWAY,
            },
            ApiError::Internal(_) | ApiError::History(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error kind carried in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Validation(_) => "validation_error",
            ApiError::Internal(_) => "internal_error",
            ApiError::Worker(e) => match e {
                WorkerError::NotFound(_) => "job_not_found",
                WorkerError::SourceBusy { .. } => "source_busy",
                WorkerError::NotCancellable { .. } => "not_cancellable",
                WorkerError::InvalidTransition(_) => "internal_error",
                WorkerError::History(_) => "history_error",
            },
            ApiError::Media(e) => match e {
                MediaError::FileNotFound(_) => "not_found",
                MediaError::FfmpegNotFound | MediaError::FfprobeNotFound => "ffmpeg_unavailable",
                MediaError::AlreadyCompliant(_) => "already_compliant",
                MediaError::OutputExists(_) => "output_exists",
                MediaError::FfprobeFailed { .. } | MediaError::JsonParse(_) | MediaError::InvalidVideo(_) => {
                    "probe_error"
                }
                MediaError::DegenerateGeometry { .. }
                | MediaError::FfmpegFailed { .. }
                | MediaError::Timeout(_)
                | MediaError::Cancelled
                | MediaError::Io(_) => "processing_error",
            },
            ApiError::Platform(e) => match e.kind() {
                ErrorKind::AuthError => "auth_error",
                ErrorKind::QuotaError => "quota_error",
                _ => "network_error",
            },
            ApiError::History(_) => "history_error",
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    detail: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if self.is_internal() && std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        }

        let body = ErrorResponse {
            detail,
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}
