//! Shared data models for the vshort uploader.
//!
//! This crate provides Serde-serializable types for:
//! - Source video assets and their probed geometry
//! - Processing plans (crop rectangle, trim window, target resolution)
//! - Upload jobs and their state machine
//! - Immutable history records
//! - Encoding defaults for the 9:16 transcode

pub mod encoding;
pub mod error;
pub mod geometry;
pub mod history;
pub mod job;
pub mod metadata;
pub mod plan;
pub mod video;

// Re-export common types
pub use encoding::EncodingConfig;
pub use error::{ErrorKind, JobError};
pub use geometry::{CropRect, TrimWindow};
pub use history::HistoryRecord;
pub use job::{InvalidTransition, JobId, JobStatus, UploadJob};
pub use metadata::{PrivacyStatus, UploadMetadata};
pub use plan::{ProcessingOptions, ProcessingPlan, TARGET_ASPECT, TARGET_HEIGHT_MAX};
pub use video::VideoAsset;
