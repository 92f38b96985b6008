//! History store implementations.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use vshort_models::HistoryRecord;

use crate::error::{HistoryError, HistoryResult};

/// Durable list of terminal jobs.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one record.
    async fn append(&self, record: HistoryRecord) -> HistoryResult<()>;

    /// All records, oldest first.
    async fn list_all(&self) -> HistoryResult<Vec<HistoryRecord>>;
}

/// History kept in a single JSON array file.
///
/// Appends are serialized by a writer lock; reads take no lock.
pub struct JsonHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_records(&self) -> HistoryResult<Vec<HistoryRecord>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&raw).map_err(|source| HistoryError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn write_records(&self, records: &[HistoryRecord]) -> HistoryResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_vec_pretty(records)?;
        let tmp = temp_path(&self.path);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "history.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl HistoryStore for JsonHistoryStore {
    async fn append(&self, record: HistoryRecord) -> HistoryResult<()> {
        let _guard = self.write_lock.lock().await;

        // A corrupt file is reported, never overwritten
        let mut records = self.read_records().await?;
        let job_id = record.job_id.clone();
        records.push(record);
        self.write_records(&records).await?;

        info!(job_id = %job_id, total = records.len(), "Appended history record");
        Ok(())
    }

    async fn list_all(&self) -> HistoryResult<Vec<HistoryRecord>> {
        let records = self.read_records().await?;
        debug!(count = records.len(), "Loaded history");
        Ok(records)
    }
}

/// In-process history, lost on restart.
#[derive(Default)]
pub struct MemoryHistoryStore {
    records: RwLock<Vec<HistoryRecord>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, record: HistoryRecord) -> HistoryResult<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn list_all(&self) -> HistoryResult<Vec<HistoryRecord>> {
        Ok(self.records.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;
    use vshort_models::{ErrorKind, JobError, JobStatus, UploadJob, UploadMetadata};

    fn record(name: &str, ok: bool) -> HistoryRecord {
        let mut job = UploadJob::new(format!("/videos/{}", name), UploadMetadata::new(name, ""));
        job.transition(JobStatus::Processing).unwrap();
        if ok {
            job.transition(JobStatus::Uploading).unwrap();
            job.succeed("vid", "https://www.youtube.com/watch?v=vid").unwrap();
        } else {
            job.fail(JobError::new(ErrorKind::ProcessingError, "ffmpeg exited 1"))
                .unwrap();
        }
        HistoryRecord::from_job(&job).unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("history.json"));
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let dir = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("nested").join("history.json"));

        store.append(record("a.mp4", true)).await.unwrap();
        store.append(record("b.mp4", false)).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].filename, "a.mp4");
        assert!(all[0].is_success());
        assert_eq!(all[1].filename, "b.mp4");
        assert_eq!(all[1].error.as_ref().unwrap().kind, ErrorKind::ProcessingError);

        // Reopening sees the same data
        let reopened = JsonHistoryStore::new(store.path());
        assert_eq!(reopened.list_all().await.unwrap(), all);
        assert!(!temp_path(store.path()).exists());
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonHistoryStore::new(dir.path().join("history.json")));

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append(record(&format!("{}.mp4", i), i % 2 == 0)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.list_all().await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonHistoryStore::new(&path);
        assert!(matches!(store.list_all().await, Err(HistoryError::Corrupt { .. })));
        assert!(store.append(record("a.mp4", true)).await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryHistoryStore::new();
        store.append(record("a.mp4", true)).await.unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }
}
