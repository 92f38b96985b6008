//! Upload history.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use vshort_models::HistoryRecord;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub records: Vec<HistoryRecord>,
    pub total: usize,
}

/// Every finished upload, oldest first.
pub async fn list_history(State(state): State<AppState>) -> ApiResult<Json<HistoryResponse>> {
    let records = state.orchestrator.list_history().await?;
    Ok(Json(HistoryResponse {
        total: records.len(),
        records,
    }))
}
