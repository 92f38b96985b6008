//! User-supplied upload metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use validator::Validate;

/// Default tags applied when the caller supplies none.
pub const DEFAULT_TAGS: &str = "shorts,upload,automated";

/// Video privacy on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyStatus {
    #[default]
    Public,
    Unlisted,
    Private,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Public => "public",
            PrivacyStatus::Unlisted => "unlisted",
            PrivacyStatus::Private => "private",
        }
    }
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyStatus {
    type Err = PrivacyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "public" => Ok(PrivacyStatus::Public),
            "unlisted" => Ok(PrivacyStatus::Unlisted),
            "private" => Ok(PrivacyStatus::Private),
            _ => Err(PrivacyParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown privacy status: {0}")]
pub struct PrivacyParseError(String);

/// Title, description and listing options sent with an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct UploadMetadata {
    /// Video title (platform limit: 100 characters)
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    /// Video description (platform limit: 5000 characters)
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Privacy status
    #[serde(default)]
    pub privacy: PrivacyStatus,
}

impl UploadMetadata {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            tags: Vec::new(),
            privacy: PrivacyStatus::default(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_privacy(mut self, privacy: PrivacyStatus) -> Self {
        self.privacy = privacy;
        self
    }

    /// Split a comma-separated tag list, dropping blanks.
    pub fn parse_tags(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    }
}
