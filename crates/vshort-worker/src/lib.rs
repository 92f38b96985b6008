//! Upload orchestration for vshort.
//!
//! The [`UploadOrchestrator`] owns every job of the process. Each submitted job runs
//! as its own tokio task: probe, plan, transcode, upload, then exactly one history
//! append. Callers poll [`UploadOrchestrator::get_status`] for progress.

pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod retry;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use orchestrator::{JobStatusView, UploadOrchestrator, CANCELLED_MESSAGE};
pub use retry::{retry_async, RetryConfig, RetryResult};
