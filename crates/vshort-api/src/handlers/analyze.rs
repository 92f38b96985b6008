//! Probe-and-plan analysis of a single file.

use std::path::PathBuf;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use vshort_models::{ProcessingPlan, VideoAsset};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub asset: VideoAsset,
    pub aspect_ratio: f64,
    pub is_vertical: bool,
    pub needs_processing: bool,
    pub plan: ProcessingPlan,
}

/// Show what an upload of this file would do, without doing it.
pub async fn analyze_video(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalyzeResponse>> {
    if !tokio::fs::try_exists(&request.path).await.unwrap_or(false) {
        return Err(ApiError::not_found(format!(
            "Video file not found: {}",
            request.path.display()
        )));
    }

    let processor = state.orchestrator.processor();
    let asset = processor.probe(&request.path).await?;
    let plan = processor.plan(&asset)?;

    debug!(
        path = %request.path.display(),
        needs_transform = plan.needs_transform,
        "Analyzed video"
    );

    Ok(Json(AnalyzeResponse {
        aspect_ratio: asset.aspect_ratio(),
        is_vertical: processor.options().is_vertical(asset.aspect_ratio()),
        needs_processing: plan.needs_transform,
        asset,
        plan,
    }))
}
