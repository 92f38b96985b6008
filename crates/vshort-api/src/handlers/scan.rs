//! Folder scan endpoint.

use std::path::PathBuf;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::services::{scan_folder, ScannedVideo};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub folder: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub folder: PathBuf,
    pub videos: Vec<ScannedVideo>,
}

/// Classify the video files in a folder against the upload history.
pub async fn scan_videos(State(state): State<AppState>, Json(request): Json<ScanRequest>) -> ApiResult<Json<ScanResponse>> {
    let history = state.orchestrator.list_history().await?;
    let videos = scan_folder(state.orchestrator.processor(), &history, &request.folder).await?;

    Ok(Json(ScanResponse {
        folder: request.folder,
        videos,
    }))
}
