//! YouTube connection check.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub channel_name: String,
    pub message: String,
}

/// Make one authenticated API call with the stored credentials.
pub async fn verify_connection(State(state): State<AppState>) -> ApiResult<Json<ConnectionResponse>> {
    let client = state.clients.create()?;
    let channel = client.channel().await?;

    let (channel_id, channel_name) = match channel {
        Some(c) => (Some(c.channel_id), c.title),
        None => (None, "Unknown".to_string()),
    };

    Ok(Json(ConnectionResponse {
        connected: true,
        message: format!("Connected to channel: {}", channel_name),
        channel_id,
        channel_name,
    }))
}
