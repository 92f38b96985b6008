//! Standalone 9:16 conversion without upload.

use std::path::PathBuf;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use vshort_models::{ProcessingPlan, VideoAsset};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub output_path: PathBuf,
    pub output_filename: String,
    pub asset: VideoAsset,
    pub plan: ProcessingPlan,
}

/// Write a `<stem>_crop916` copy next to the source.
///
/// Runs inline; dropping the request kills FFmpeg and removes the partial file.
pub async fn process_video(
    State(state): State<AppState>,
    Json(request): Json<ProcessRequest>,
) -> ApiResult<Json<ProcessResponse>> {
    if !tokio::fs::try_exists(&request.path).await.unwrap_or(false) {
        return Err(ApiError::not_found(format!(
            "Video file not found: {}",
            request.path.display()
        )));
    }

    let processor = state.orchestrator.processor();
    let asset = processor.probe(&request.path).await?;
    let plan = processor.plan(&asset)?;

    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let output_path = processor.process_beside_source(&asset, &plan, cancel_rx).await?;

    info!(
        source = %request.path.display(),
        output = %output_path.display(),
        "Processed video beside source"
    );

    Ok(Json(ProcessResponse {
        output_filename: output_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        output_path,
        asset,
        plan,
    }))
}
