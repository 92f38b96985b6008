//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    analyze_video, cancel_job, get_job_status, health, list_history, list_jobs, process_video, ready, scan_videos,
    submit_batch, submit_upload, verify_connection,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let upload_routes = Router::new()
        .route("/uploads", post(submit_upload))
        .route("/uploads/batch", post(submit_batch))
        .route("/jobs", get(list_jobs))
        .route("/jobs/:job_id", get(get_job_status))
        .route("/jobs/:job_id/cancel", post(cancel_job))
        .route("/history", get(list_history));

    let library_routes = Router::new()
        .route("/analyze", post(analyze_video))
        .route("/scan", post(scan_videos))
        .route("/process", post(process_video));

    let account_routes = Router::new().route("/youtube/test", post(verify_connection));

    let api_routes = Router::new()
        .merge(upload_routes)
        .merge(library_routes)
        .merge(account_routes);

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
