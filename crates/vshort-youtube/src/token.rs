//! Per-request credential handles.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

use crate::error::{PlatformError, PlatformResult};

/// OAuth2 bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Supplies a bearer token for each upload.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> PlatformResult<AccessToken>;
}

/// Always returns the same token.
#[derive(Debug, Clone)]
pub struct StaticTokenSource(AccessToken);

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self(AccessToken::new(token))
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> PlatformResult<AccessToken> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    youtube_credentials: Option<StoredCredentials>,
}

#[derive(Debug, Deserialize)]
struct StoredCredentials {
    #[serde(default)]
    token: Option<String>,
}

/// Reads `youtube_credentials.token` from the app's credentials JSON.
///
/// The file is re-read on every call, so a token refreshed by the OAuth flow is
/// picked up by the next upload without a restart.
#[derive(Debug, Clone)]
pub struct CredentialsFileTokenSource {
    path: PathBuf,
}

impl CredentialsFileTokenSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Whether the file currently holds a usable token.
    pub async fn has_credentials(&self) -> bool {
        self.access_token().await.is_ok()
    }
}

#[async_trait]
impl TokenSource for CredentialsFileTokenSource {
    async fn access_token(&self) -> PlatformResult<AccessToken> {
        let raw = tokio::fs::read(&self.path).await.map_err(|e| {
            PlatformError::Auth(format!(
                "cannot read credentials file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let parsed: CredentialsFile = serde_json::from_slice(&raw)
            .map_err(|e| PlatformError::Auth(format!("malformed credentials file: {}", e)))?;

        parsed
            .youtube_credentials
            .and_then(|c| c.token)
            .filter(|t| !t.trim().is_empty())
            .map(AccessToken::new)
            .ok_or_else(|| PlatformError::Auth("no YouTube credentials configured".to_string()))
    }
}
