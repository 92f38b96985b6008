//! Filesystem helpers for processed outputs.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Suffix marking a processed 9:16 output.
pub const OUTPUT_SUFFIX: &str = "crop916";

/// Path of the processed output for `source` inside `work_dir`.
///
/// `<work_dir>/<stem>_crop916_<tag>.mp4`; the tag keeps concurrent jobs apart.
pub fn output_path(work_dir: &Path, source: &Path, tag: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string());
    work_dir.join(format!("{}_{}_{}.mp4", stem, OUTPUT_SUFFIX, tag))
}

/// Containers that can hold the H.264/AAC output as-is.
const KEEP_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "mkv"];

/// Processed copy stored next to its source: `<dir>/<stem>_crop916.<ext>`.
///
/// Keeps the source extension when its container fits the encoded streams,
/// otherwise writes `.mp4`.
pub fn sibling_output_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string());
    let ext = source
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .filter(|e| KEEP_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or_else(|| "mp4".to_string());
    source.with_file_name(format!("{}_{}.{}", stem, OUTPUT_SUFFIX, ext))
}

/// Check that `path` is an existing, readable regular file.
pub async fn ensure_readable(path: &Path) -> MediaResult<()> {
    let meta = fs::metadata(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MediaError::FileNotFound(path.to_path_buf())
        } else {
            MediaError::Io(e)
        }
    })?;
    if !meta.is_file() {
        return Err(MediaError::invalid_video(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    // Opening catches permission errors that metadata does not
    fs::File::open(path).await?;
    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub async fn remove_file_if_exists(path: &Path) -> MediaResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Removed file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MediaError::Io(e)),
    }
}
