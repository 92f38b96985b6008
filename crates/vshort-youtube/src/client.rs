//! Resumable upload client.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use vshort_models::UploadMetadata;

use crate::config::YouTubeConfig;
use crate::error::{PlatformError, PlatformResult};
use crate::progress::UploadProgress;
use crate::token::{AccessToken, TokenSource};

/// Resume status returned between chunks.
const RESUME_INCOMPLETE: u16 = 308;

/// What the platform returned for a finished upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub video_id: String,
    pub url: String,
}

/// Public watch URL for a video id.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Channel the credentials are bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel_id: String,
    pub title: String,
}

/// Destination platform for processed videos.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Upload `path` with `metadata`, publishing acknowledged bytes to `progress`.
    async fn upload(
        &self,
        path: &Path,
        metadata: &UploadMetadata,
        progress: &UploadProgress,
    ) -> PlatformResult<UploadReceipt>;

    /// Authenticated round trip returning the caller's channel, if it has one.
    async fn channel(&self) -> PlatformResult<Option<ChannelInfo>>;
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelResource>,
}

#[derive(Debug, Deserialize)]
struct ChannelResource {
    id: String,
    snippet: ChannelSnippet,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    title: String,
}

/// YouTube Data API v3 client bound to one credential source.
pub struct YouTubeClient {
    http: Client,
    config: YouTubeConfig,
    tokens: Arc<dyn TokenSource>,
}

impl YouTubeClient {
    /// Create a new client.
    pub fn new(config: YouTubeConfig, tokens: Arc<dyn TokenSource>) -> PlatformResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            // 308 is the resumable protocol's "keep going", not a redirect
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { http, config, tokens })
    }

    /// Create from environment variables.
    pub fn from_env(tokens: Arc<dyn TokenSource>) -> PlatformResult<Self> {
        Self::new(YouTubeConfig::from_env(), tokens)
    }

    fn video_resource(&self, metadata: &UploadMetadata) -> serde_json::Value {
        json!({
            "snippet": {
                "title": metadata.title,
                "description": metadata.description,
                "tags": metadata.tags,
                "categoryId": self.config.category_id,
            },
            "status": {
                "privacyStatus": metadata.privacy.as_str(),
                "selfDeclaredMadeForKids": false,
            }
        })
    }

    /// Open a resumable session and return its URI.
    async fn start_session(
        &self,
        token: &AccessToken,
        metadata: &UploadMetadata,
        total: u64,
    ) -> PlatformResult<String> {
        let response = self
            .http
            .post(&self.config.upload_url)
            .header(AUTHORIZATION, format!("Bearer {}", token.secret()))
            .header("X-Upload-Content-Length", total)
            .header("X-Upload-Content-Type", "video/*")
            .json(&self.video_resource(metadata))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::from_status(status.as_u16(), &body));
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| PlatformError::InvalidResponse("upload session has no Location header".to_string()))
    }

    /// PUT one chunk starting at `offset`.
    ///
    /// Returns the next offset the server expects, or the receipt when finished.
    async fn send_chunk(
        &self,
        session_uri: &str,
        token: &AccessToken,
        file: &mut tokio::fs::File,
        offset: u64,
        total: u64,
    ) -> PlatformResult<ChunkOutcome> {
        let len = (total - offset).min(self.config.chunk_size as u64);
        let mut buf = vec![0u8; len as usize];
        file.seek(SeekFrom::Start(offset)).await?;
        file.read_exact(&mut buf).await?;

        let content_range = if total == 0 {
            "bytes */0".to_string()
        } else {
            format!("bytes {}-{}/{}", offset, offset + len - 1, total)
        };
        debug!(range = %content_range, "Uploading chunk");

        let response = self
            .http
            .put(session_uri)
            .header(AUTHORIZATION, format!("Bearer {}", token.secret()))
            .header(CONTENT_LENGTH, len)
            .header(CONTENT_RANGE, content_range)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(buf)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == RESUME_INCOMPLETE {
            let next = response
                .headers()
                .get(RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_range_end)
                .map(|end| end + 1)
                .unwrap_or(0);
            return Ok(ChunkOutcome::Incomplete(next));
        }

        if status == StatusCode::OK || status == StatusCode::CREATED {
            let resource: VideoResource = response.json().await?;
            let video_id = resource
                .id
                .filter(|id| !id.is_empty())
                .ok_or_else(|| PlatformError::InvalidResponse("upload finished without a video id".to_string()))?;
            return Ok(ChunkOutcome::Done(UploadReceipt {
                url: watch_url(&video_id),
                video_id,
            }));
        }

        let body = response.text().await.unwrap_or_default();
        Err(PlatformError::from_status(status.as_u16(), &body))
    }

    async fn upload_inner(
        &self,
        path: &Path,
        metadata: &UploadMetadata,
        progress: &UploadProgress,
    ) -> PlatformResult<UploadReceipt> {
        let mut file = tokio::fs::File::open(path).await?;
        let total = file.metadata().await?.len();
        progress.set_total(total);

        let token = self.tokens.access_token().await?;
        let session_uri = self.start_session(&token, metadata, total).await?;
        debug!(session = %session_uri, total, "Opened resumable upload session");

        let mut offset = 0u64;
        // A server that never advances would otherwise loop forever
        let mut stalled = 0u32;
        loop {
            match self.send_chunk(&session_uri, &token, &mut file, offset, total).await? {
                ChunkOutcome::Done(receipt) => {
                    progress.complete();
                    return Ok(receipt);
                }
                ChunkOutcome::Incomplete(next) => {
                    if next <= offset {
                        stalled += 1;
                        if stalled >= 3 {
                            return Err(PlatformError::Network(format!(
                                "upload stalled at byte {} of {}",
                                offset, total
                            )));
                        }
                    } else {
                        stalled = 0;
                    }
                    progress.advance_to(next);
                    offset = next.min(total);
                    if offset >= total && total > 0 {
                        return Err(PlatformError::InvalidResponse(
                            "server acknowledged every byte but did not finish the upload".to_string(),
                        ));
                    }
                }
            }
        }
    }
}

enum ChunkOutcome {
    Incomplete(u64),
    Done(UploadReceipt),
}

/// Last byte index from a `Range: bytes=0-N` header.
fn parse_range_end(value: &str) -> Option<u64> {
    let (_, end) = value.trim().strip_prefix("bytes=")?.split_once('-')?;
    end.trim().parse().ok()
}

#[async_trait]
impl PlatformClient for YouTubeClient {
    async fn upload(
        &self,
        path: &Path,
        metadata: &UploadMetadata,
        progress: &UploadProgress,
    ) -> PlatformResult<UploadReceipt> {
        let start = Instant::now();
        let result = self.upload_inner(path, metadata, progress).await;

        let status = match &result {
            Ok(receipt) => {
                info!(
                    video_id = %receipt.video_id,
                    bytes = progress.total_bytes(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Upload complete"
                );
                "success"
            }
            Err(e) => {
                warn!(error = %e, bytes_sent = progress.bytes_sent(), "Upload failed");
                e.kind().as_str()
            }
        };
        metrics::histogram!("vshort_upload_duration_seconds", "status" => status)
            .record(start.elapsed().as_secs_f64());

        result
    }

    async fn channel(&self) -> PlatformResult<Option<ChannelInfo>> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/channels?part=snippet&mine=true", self.config.api_base.trim_end_matches('/'));

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", token.secret()))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::from_status(status.as_u16(), &body));
        }

        let list: ChannelListResponse = response.json().await?;
        let channel = list.items.into_iter().next().map(|c| ChannelInfo {
            channel_id: c.id,
            title: c.snippet.title,
        });
        debug!(channel = ?channel.as_ref().map(|c| &c.title), "Verified YouTube connection");
        Ok(channel)
    }
}
