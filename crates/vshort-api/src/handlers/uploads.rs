//! Upload submission.

use std::path::{Path, PathBuf};

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use vshort_models::{JobId, JobStatus, PrivacyStatus, UploadMetadata};
use vshort_worker::WorkerError;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Tags as a JSON list or a comma-separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagList {
    List(Vec<String>),
    Csv(String),
}

impl TagList {
    fn into_tags(self) -> Vec<String> {
        match self {
            TagList::List(tags) => tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            TagList::Csv(raw) => UploadMetadata::parse_tags(&raw),
        }
    }
}

/// Request body for `POST /api/uploads`.
#[derive(Debug, Deserialize)]
pub struct SubmitUploadRequest {
    /// Source video on the server's filesystem
    pub path: PathBuf,
    /// Defaults to the file stem
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<TagList>,
    #[serde(default)]
    pub privacy: Option<PrivacyStatus>,
}

impl SubmitUploadRequest {
    /// Fill in defaults and validate.
    pub fn into_metadata(self, config: &ApiConfig) -> ApiResult<(PathBuf, UploadMetadata)> {
        let filename = file_name(&self.path);
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| file_stem(&self.path));
        let description = self
            .description
            .unwrap_or_else(|| format!("Original filename: {}", filename));
        let tags = self
            .tags
            .map(TagList::into_tags)
            .unwrap_or_else(|| config.default_tags.clone());

        let metadata = UploadMetadata::new(title, description)
            .with_tags(tags)
            .with_privacy(self.privacy.unwrap_or(config.default_privacy));
        metadata.validate()?;

        Ok((self.path, metadata))
    }
}

/// Response body for an accepted upload.
#[derive(Debug, Serialize)]
pub struct SubmitUploadResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

async fn is_regular_file(path: &Path) -> bool {
    matches!(tokio::fs::metadata(path).await, Ok(meta) if meta.is_file())
}

/// Request body for `POST /api/uploads/batch`.
#[derive(Debug, Deserialize)]
pub struct BatchUploadRequest {
    pub videos: Vec<SubmitUploadRequest>,
}

#[derive(Debug, Serialize)]
pub struct QueuedUpload {
    pub job_id: JobId,
    pub status: JobStatus,
    pub path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct SkippedUpload {
    pub path: PathBuf,
    pub reason: String,
}

/// Response body for an accepted batch.
#[derive(Debug, Serialize)]
pub struct BatchUploadResponse {
    pub queued: usize,
    pub jobs: Vec<QueuedUpload>,
    pub skipped: Vec<SkippedUpload>,
}

/// Queue one file for processing and upload.
pub async fn submit_upload(
    State(state): State<AppState>,
    Json(request): Json<SubmitUploadRequest>,
) -> ApiResult<(StatusCode, Json<SubmitUploadResponse>)> {
    let (path, metadata) = request.into_metadata(&state.config)?;

    if !is_regular_file(&path).await {
        return Err(ApiError::not_found(format!("Video file not found: {}", path.display())));
    }

    let client = state.clients.create()?;
    let job = state.orchestrator.submit(path, metadata, client).await?;

    info!(job_id = %job.id, filename = %job.filename(), "Upload submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitUploadResponse {
            job_id: job.id,
            status: job.status,
        }),
    ))
}

/// Queue several files at once, one job each.
///
/// Every entry is validated before anything is queued. Missing files and
/// sources that already have an active job are skipped; the batch fails only
/// when nothing could be queued.
pub async fn submit_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchUploadRequest>,
) -> ApiResult<(StatusCode, Json<BatchUploadResponse>)> {
    if request.videos.is_empty() {
        return Err(ApiError::bad_request("No videos provided"));
    }

    let mut prepared = Vec::with_capacity(request.videos.len());
    for (index, video) in request.videos.into_iter().enumerate() {
        let entry = video.into_metadata(&state.config).map_err(|e| match e {
            ApiError::Validation(msg) => ApiError::Validation(format!("videos[{}]: {}", index, msg)),
            other => other,
        })?;
        prepared.push(entry);
    }

    let client = state.clients.create()?;
    let mut jobs = Vec::new();
    let mut skipped = Vec::new();

    for (path, metadata) in prepared {
        if !is_regular_file(&path).await {
            warn!(path = %path.display(), "Skipping missing file in batch");
            skipped.push(SkippedUpload {
                path,
                reason: "file not found".to_string(),
            });
            continue;
        }

        match state.orchestrator.submit(path.clone(), metadata, client.clone()).await {
            Ok(job) => jobs.push(QueuedUpload {
                job_id: job.id,
                status: job.status,
                path,
            }),
            Err(e @ WorkerError::SourceBusy { .. }) => skipped.push(SkippedUpload {
                path,
                reason: e.to_string(),
            }),
            Err(e) => return Err(e.into()),
        }
    }

    if jobs.is_empty() {
        return Err(ApiError::bad_request("No valid videos to upload"));
    }

    info!(queued = jobs.len(), skipped = skipped.len(), "Batch submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchUploadResponse {
            queued: jobs.len(),
            jobs,
            skipped,
        }),
    ))
}
