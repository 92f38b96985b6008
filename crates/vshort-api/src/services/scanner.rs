//! Folder scanning: classify video files before they are submitted.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use vshort_media::VideoProcessor;
use vshort_models::HistoryRecord;

use crate::error::{ApiError, ApiResult};
use crate::metrics;

/// File extensions treated as videos (compared case-insensitively).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "wmv", "flv", "webm", "mkv"];

/// Files smaller than this are rejected without probing.
pub const MIN_FILE_SIZE: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// Never uploaded and ready to go
    New,
    /// Already uploaded successfully
    Duplicate,
    /// A previous upload failed
    Retry,
    /// Empty, too small or unreadable
    Invalid,
    /// Not 9:16; the upload will crop it
    WrongAr,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::New => "new",
            ScanStatus::Duplicate => "duplicate",
            ScanStatus::Retry => "retry",
            ScanStatus::Invalid => "invalid",
            ScanStatus::WrongAr => "wrong_ar",
        }
    }
}

/// One classified file.
#[derive(Debug, Clone, Serialize)]
pub struct ScannedVideo {
    pub filename: String,
    pub path: PathBuf,
    /// Whether submitting the file makes sense
    pub valid: bool,
    pub status: ScanStatus,
    pub message: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f64>,
    pub needs_cropping: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl ScannedVideo {
    fn new(filename: String, path: PathBuf, size: u64, status: ScanStatus, message: impl Into<String>) -> Self {
        Self {
            filename,
            path,
            valid: !matches!(status, ScanStatus::Duplicate | ScanStatus::Invalid),
            status,
            message: message.into(),
            size,
            aspect_ratio: None,
            needs_cropping: false,
            video_url: None,
            uploaded_at: None,
        }
    }
}

/// What the history says about a file name.
#[derive(Debug, PartialEq)]
pub enum HistoryMatch<'a> {
    Uploaded(&'a HistoryRecord),
    Failed(&'a HistoryRecord),
}

/// A successful upload wins over any failure; otherwise the latest failure is reported.
pub fn match_history<'a>(filename: &str, history: &'a [HistoryRecord]) -> Option<HistoryMatch<'a>> {
    let mut failed = None;
    for record in history.iter().filter(|r| r.filename == filename) {
        if record.is_success() {
            return Some(HistoryMatch::Uploaded(record));
        }
        failed = Some(record);
    }
    failed.map(HistoryMatch::Failed)
}

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn format_date(at: &DateTime<Utc>) -> String {
    at.format("%b %d, %Y").to_string()
}

/// Classify every video file directly inside `folder`, sorted by file name.
pub async fn scan_folder(
    processor: &VideoProcessor,
    history: &[HistoryRecord],
    folder: &Path,
) -> ApiResult<Vec<ScannedVideo>> {
    let mut entries = tokio::fs::read_dir(folder).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ApiError::not_found(format!("Folder not found: {}", folder.display())),
        std::io::ErrorKind::PermissionDenied => {
            ApiError::Forbidden(format!("Permission denied accessing folder: {}", folder.display()))
        }
        _ => ApiError::bad_request(format!("Cannot read folder {}: {}", folder.display(), e)),
    })?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ApiError::internal(format!("Error scanning folder: {}", e)))?
    {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && is_video_file(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut videos = Vec::with_capacity(paths.len());
    for path in paths {
        let video = classify(processor, history, path).await;
        metrics::record_file_scanned(video.status.as_str());
        videos.push(video);
    }

    info!(folder = %folder.display(), count = videos.len(), "Folder scan complete");
    Ok(videos)
}

async fn classify(processor: &VideoProcessor, history: &[HistoryRecord], path: PathBuf) -> ScannedVideo {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);

    match match_history(&filename, history) {
        Some(HistoryMatch::Uploaded(record)) => {
            let mut video = ScannedVideo::new(
                filename,
                path,
                size,
                ScanStatus::Duplicate,
                format!("Already uploaded on {}", format_date(&record.completed_at)),
            );
            video.video_url = record.video_url.clone();
            video.uploaded_at = Some(record.completed_at);
            return video;
        }
        Some(HistoryMatch::Failed(record)) => {
            let mut video = ScannedVideo::new(
                filename,
                path,
                size,
                ScanStatus::Retry,
                format!(
                    "Previous upload failed ({}) - Ready to retry",
                    format_date(&record.completed_at)
                ),
            );
            video.uploaded_at = Some(record.completed_at);
            return video;
        }
        None => {}
    }

    if size == 0 {
        return ScannedVideo::new(filename, path, size, ScanStatus::Invalid, "Empty file");
    }
    if size < MIN_FILE_SIZE {
        return ScannedVideo::new(filename, path, size, ScanStatus::Invalid, "File too small");
    }

    let asset = match processor.probe(&path).await {
        Ok(asset) => asset,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Probe failed during scan");
            return ScannedVideo::new(filename, path, size, ScanStatus::Invalid, "Cannot read video - Invalid format");
        }
    };

    let ratio = asset.aspect_ratio();
    let mut video = if processor.options().is_vertical(ratio) {
        ScannedVideo::new(filename, path, size, ScanStatus::New, "Ready to upload")
    } else {
        let mut video = ScannedVideo::new(
            filename,
            path,
            size,
            ScanStatus::WrongAr,
            format!("Not 9:16 AR (current: {:.2}) - Auto-fix available", ratio),
        );
        video.needs_cropping = true;
        video
    };
    video.aspect_ratio = Some(ratio);
    video
}
