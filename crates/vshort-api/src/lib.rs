//! Axum HTTP API for the vshort uploader.
//!
//! This crate provides:
//! - Upload submission, job polling and cancellation
//! - Upload history and folder scanning
//! - Probe-and-plan analysis of a single file
//! - Health, readiness and Prometheus metrics endpoints

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, ClientFactory, YouTubeClientFactory};
