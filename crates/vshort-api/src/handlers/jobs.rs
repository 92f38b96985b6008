//! Job status polling and cancellation.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use tracing::info;

use vshort_models::JobId;
use vshort_worker::JobStatusView;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// All jobs known to this process.
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobStatusView>,
    pub total: usize,
}

fn parse_job_id(raw: &str) -> ApiResult<JobId> {
    if !JobId::is_valid(raw) {
        return Err(ApiError::bad_request(format!("Invalid job id: {}", raw)));
    }
    Ok(JobId::from_string(raw))
}

/// Get the current status of a job.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusView>> {
    let job_id = parse_job_id(&job_id)?;
    let view = state.orchestrator.get_status(&job_id).await?;
    Ok(Json(view))
}

/// Cancel a pending or processing job.
///
/// Returns the status at the time of the request; the job reaches `failed`
/// once its task has stopped FFmpeg.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusView>> {
    let job_id = parse_job_id(&job_id)?;
    state.orchestrator.cancel(&job_id).await?;
    info!(job_id = %job_id, "Job cancellation requested");

    let view = state.orchestrator.get_status(&job_id).await?;
    Ok(Json(view))
}

/// List every job of this process, oldest first.
pub async fn list_jobs(State(state): State<AppState>) -> Json<JobListResponse> {
    let jobs = state.orchestrator.list_jobs().await;
    Json(JobListResponse {
        total: jobs.len(),
        jobs,
    })
}
