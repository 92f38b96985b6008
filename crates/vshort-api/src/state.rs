//! Application state.

use std::sync::Arc;

use tracing::info;
use vshort_history::JsonHistoryStore;
use vshort_media::{FfmpegTranscoder, FfprobeProbe, VideoProcessor};
use vshort_models::EncodingConfig;
use vshort_worker::{UploadOrchestrator, WorkerConfig};
use vshort_youtube::{
    CredentialsFileTokenSource, PlatformClient, PlatformResult, TokenSource, YouTubeClient, YouTubeConfig,
};

use crate::config::ApiConfig;

/// Builds the platform client handed to each submitted job.
pub trait ClientFactory: Send + Sync {
    fn create(&self) -> PlatformResult<Arc<dyn PlatformClient>>;
}

/// Creates a fresh [`YouTubeClient`] per submission.
///
/// The token source re-reads the credentials file on every upload, so
/// reconnecting the account takes effect without a restart.
pub struct YouTubeClientFactory {
    config: YouTubeConfig,
    tokens: Arc<dyn TokenSource>,
}

impl YouTubeClientFactory {
    pub fn new(config: YouTubeConfig, tokens: Arc<dyn TokenSource>) -> Self {
        Self { config, tokens }
    }
}

impl ClientFactory for YouTubeClientFactory {
    fn create(&self) -> PlatformResult<Arc<dyn PlatformClient>> {
        let client = YouTubeClient::new(self.config.clone(), Arc::clone(&self.tokens))?;
        Ok(Arc::new(client))
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: Arc<UploadOrchestrator>,
    pub clients: Arc<dyn ClientFactory>,
    pub credentials: Arc<dyn TokenSource>,
}

impl AppState {
    /// Create application state backed by FFmpeg, the YouTube API and the JSON history file.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let worker_config = WorkerConfig::from_env();
        tokio::fs::create_dir_all(&worker_config.work_dir).await?;

        let processor = VideoProcessor::new(
            Arc::new(FfprobeProbe),
            Arc::new(FfmpegTranscoder::new(
                EncodingConfig::from_env(),
                worker_config.processing.transcode_timeout_seconds,
            )),
            worker_config.processing.clone(),
            worker_config.work_dir.clone(),
        );

        info!(
            work_dir = %worker_config.work_dir.display(),
            history = %config.history_file.display(),
            max_jobs = worker_config.max_concurrent_jobs,
            "Upload orchestrator configured"
        );

        let history = Arc::new(JsonHistoryStore::new(config.history_file.clone()));
        let orchestrator = Arc::new(UploadOrchestrator::new(processor, history, worker_config));

        let credentials: Arc<dyn TokenSource> =
            Arc::new(CredentialsFileTokenSource::new(config.credentials_file.clone()));
        let clients = Arc::new(YouTubeClientFactory::new(
            YouTubeConfig::from_env(),
            Arc::clone(&credentials),
        ));

        Ok(Self::from_parts(config, orchestrator, clients, credentials))
    }

    /// Assemble state from already-built parts.
    pub fn from_parts(
        config: ApiConfig,
        orchestrator: Arc<UploadOrchestrator>,
        clients: Arc<dyn ClientFactory>,
        credentials: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            clients,
            credentials,
        }
    }
}
