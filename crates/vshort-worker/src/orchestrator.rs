//! Upload orchestrator: job registry, state machine and background execution.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock, Semaphore};
use tracing::{debug, Instrument};

use vshort_history::HistoryStore;
use vshort_media::fs_utils::remove_file_if_exists;
use vshort_media::{MediaError, VideoProcessor};
use vshort_models::{
    ErrorKind, HistoryRecord, JobError, JobId, JobStatus, UploadJob, UploadMetadata,
};
use vshort_youtube::{PlatformClient, PlatformError, UploadProgress, UploadReceipt};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::retry::retry_async;

/// Error message of a job cancelled by the user.
pub const CANCELLED_MESSAGE: &str = "cancelled by user";

/// Poll-friendly view of one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Upload fraction in [0, 1]
    pub progress: f64,
    pub filename: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Registry slot for one job.
struct JobEntry {
    job: RwLock<UploadJob>,
    progress: UploadProgress,
    cancel_tx: watch::Sender<bool>,
}

impl JobEntry {
    fn new(job: UploadJob) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            job: RwLock::new(job),
            progress: UploadProgress::new(),
            cancel_tx,
        }
    }

    async fn view(&self) -> JobStatusView {
        let job = self.job.read().await;
        let progress = match job.status {
            JobStatus::Succeeded => 1.0,
            JobStatus::Uploading | JobStatus::Failed => self.progress.fraction(),
            JobStatus::Pending | JobStatus::Processing => 0.0,
        };
        JobStatusView {
            job_id: job.id.clone(),
            status: job.status,
            progress,
            filename: job.filename(),
            title: job.metadata.title.clone(),
            error: job.error.clone(),
            video_id: job.video_id.clone(),
            video_url: job.video_url.clone(),
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }
}

fn cancelled_error() -> JobError {
    JobError::new(ErrorKind::ProcessingError, CANCELLED_MESSAGE)
}

async fn wait_cancelled(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Owns every upload job of the process.
pub struct UploadOrchestrator {
    processor: VideoProcessor,
    history: Arc<dyn HistoryStore>,
    config: WorkerConfig,
    jobs: RwLock<HashMap<JobId, Arc<JobEntry>>>,
    /// Canonical source path -> job currently using it
    active_sources: Mutex<HashMap<PathBuf, JobId>>,
    semaphore: Arc<Semaphore>,
}

impl UploadOrchestrator {
    pub fn new(processor: VideoProcessor, history: Arc<dyn HistoryStore>, config: WorkerConfig) -> Self {
        let permits = config.max_concurrent_jobs.max(1);
        Self {
            processor,
            history,
            config,
            jobs: RwLock::new(HashMap::new()),
            active_sources: Mutex::new(HashMap::new()),
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn processor(&self) -> &VideoProcessor {
        &self.processor
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// Register a `pending` job and start it in the background.
    ///
    /// Fails only when another job is still working on the same source file.
    pub async fn submit(
        self: &Arc<Self>,
        source: impl Into<PathBuf>,
        metadata: UploadMetadata,
        client: Arc<dyn PlatformClient>,
    ) -> WorkerResult<UploadJob> {
        let source = source.into();
        // Unresolvable paths are kept as given; the probe reports them
        let key = tokio::fs::canonicalize(&source).await.unwrap_or_else(|_| source.clone());

        let job = UploadJob::new(key.clone(), metadata);
        {
            let mut active = self.active_sources.lock().await;
            if let Some(existing) = active.get(&key) {
                return Err(WorkerError::SourceBusy {
                    path: key,
                    job_id: existing.clone(),
                });
            }
            active.insert(key, job.id.clone());
        }

        let entry = Arc::new(JobEntry::new(job.clone()));
        self.jobs.write().await.insert(job.id.clone(), entry.clone());
        metrics::counter!("vshort_jobs_submitted_total").increment(1);

        let logger = JobLogger::new(&job.id, &job.filename());
        logger.log_start(&format!("\"{}\" queued", job.metadata.title));

        let this = Arc::clone(self);
        let span = logger.create_span();
        let task_entry = Arc::clone(&entry);
        let handle =
            tokio::spawn(async move { this.run_job(task_entry, client, logger).await }.instrument(span.clone()));

        let this = Arc::clone(self);
        tokio::spawn(
            async move {
                if let Err(e) = handle.await {
                    this.recover_aborted(&entry, e).await;
                }
            }
            .instrument(span),
        );

        Ok(job)
    }

    /// Current status of a job.
    pub async fn get_status(&self, job_id: &JobId) -> WorkerResult<JobStatusView> {
        Ok(self.entry(job_id).await?.view().await)
    }

    /// Full job snapshot.
    pub async fn get_job(&self, job_id: &JobId) -> WorkerResult<UploadJob> {
        Ok(self.entry(job_id).await?.job.read().await.clone())
    }

    /// All jobs of this process, oldest first.
    pub async fn list_jobs(&self) -> Vec<JobStatusView> {
        let entries: Vec<Arc<JobEntry>> = self.jobs.read().await.values().cloned().collect();
        let mut views = Vec::with_capacity(entries.len());
        for entry in entries {
            views.push(entry.view().await);
        }
        views.sort_by_key(|v| v.created_at);
        views
    }

    /// Every history record, oldest first.
    pub async fn list_history(&self) -> WorkerResult<Vec<HistoryRecord>> {
        Ok(self.history.list_all().await?)
    }

    /// Ask a `pending` or `processing` job to stop.
    ///
    /// The job's task performs the transition to `failed`.
    pub async fn cancel(&self, job_id: &JobId) -> WorkerResult<()> {
        let entry = self.entry(job_id).await?;
        // Held across the send so the task cannot enter `uploading` in between
        let job = entry.job.read().await;
        if !job.status.is_cancellable() {
            return Err(WorkerError::NotCancellable {
                job_id: job_id.clone(),
                status: job.status,
            });
        }
        entry.cancel_tx.send_replace(true);
        debug!(job_id = %job_id, status = %job.status, "Cancellation requested");
        Ok(())
    }

    async fn entry(&self, job_id: &JobId) -> WorkerResult<Arc<JobEntry>> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| WorkerError::not_found(job_id))
    }

    async fn run_job(&self, entry: Arc<JobEntry>, client: Arc<dyn PlatformClient>, logger: JobLogger) {
        let permit = tokio::select! {
            permit = self.semaphore.clone().acquire_owned() => permit.ok(),
            _ = wait_cancelled(entry.cancel_tx.subscribe()) => None,
        };

        let mut run = RunState::default();
        let result = match permit {
            Some(_) => self.execute(&entry, client.as_ref(), &logger, &mut run).await,
            None => Err(cancelled_error()),
        };

        self.finish(&entry, result, run.temp_output, &logger).await;

        // Spaces out consecutive uploads, failed ones included
        if run.reached_upload && !self.config.upload_delay.is_zero() {
            debug!(delay = ?self.config.upload_delay, "Pausing before next upload");
            tokio::time::sleep(self.config.upload_delay).await;
        }
        drop(permit);
    }

    /// Called when a job task panicked or was aborted before reaching a terminal state.
    async fn recover_aborted(&self, entry: &JobEntry, error: tokio::task::JoinError) {
        let (job_id, filename, source, terminal, temp_output) = {
            let job = entry.job.read().await;
            (
                job.id.clone(),
                job.filename(),
                job.source_path.clone(),
                job.status.is_terminal(),
                job.output_path.clone(),
            )
        };
        let logger = JobLogger::new(&job_id, &filename);
        if terminal {
            logger.log_warning(&format!("job task ended abnormally after finishing: {}", error));
            let mut active = self.active_sources.lock().await;
            if active.get(&source) == Some(&job_id) {
                active.remove(&source);
            }
            return;
        }

        let failure = JobError::new(ErrorKind::ProcessingError, format!("job task failed: {}", error));
        self.finish(entry, Err(failure), temp_output, &logger).await;
    }

    /// Probe, plan, transcode and upload. Any error becomes the job's `JobError`.
    async fn execute(
        &self,
        entry: &JobEntry,
        client: &dyn PlatformClient,
        logger: &JobLogger,
        run: &mut RunState,
    ) -> Result<UploadReceipt, JobError> {
        let (job_id, source, metadata) = {
            let job = entry.job.read().await;
            (job.id.clone(), job.source_path.clone(), job.metadata.clone())
        };

        if entry.is_cancelled() {
            return Err(cancelled_error());
        }

        let asset = self
            .processor
            .probe(&source)
            .await
            .map_err(|e| JobError::new(ErrorKind::ProbeError, e.detail()))?;
        let plan = self
            .processor
            .plan(&asset)
            .map_err(|e| JobError::new(ErrorKind::ProcessingError, e.detail()))?;

        logger.log_progress(&format!(
            "probed {}x{} {:.1}s, transform needed: {}",
            asset.width, asset.height, asset.duration, plan.needs_transform
        ));

        {
            let mut job = entry.job.write().await;
            if entry.is_cancelled() {
                return Err(cancelled_error());
            }
            job.asset = Some(asset.clone());
            job.plan = Some(plan.clone());
            job.transition(JobStatus::Processing)
                .map_err(|e| JobError::new(ErrorKind::ProcessingError, e.to_string()))?;
        }

        let output = self
            .processor
            .execute(&asset, &plan, job_id.as_str(), entry.cancel_tx.subscribe())
            .await
            .map_err(|e| match e {
                MediaError::Cancelled => cancelled_error(),
                e => JobError::new(ErrorKind::ProcessingError, e.detail()),
            })?;

        if output.is_temporary {
            run.temp_output = Some(output.path.clone());
        }

        {
            let mut job = entry.job.write().await;
            if entry.is_cancelled() {
                return Err(cancelled_error());
            }
            if output.is_temporary {
                job.output_path = Some(output.path.clone());
            }
            job.transition(JobStatus::Uploading)
                .map_err(|e| JobError::new(ErrorKind::ProcessingError, e.to_string()))?;
        }

        logger.log_progress(&format!("uploading {}", output.path.display()));
        run.reached_upload = true;

        let result = retry_async(&self.config.upload_retry, PlatformError::is_retryable, || {
            client.upload(&output.path, &metadata, &entry.progress)
        })
        .await;

        if result.attempts() > 1 {
            logger.log_warning(&format!("upload took {} attempts", result.attempts()));
        }

        result
            .into_result()
            .map_err(|e| JobError::new(e.kind(), e.to_string()))
    }

    /// Terminal transition plus its side effects, under the job's write lock.
    async fn finish(
        &self,
        entry: &JobEntry,
        result: Result<UploadReceipt, JobError>,
        temp_output: Option<PathBuf>,
        logger: &JobLogger,
    ) {
        let mut job = entry.job.write().await;

        let transition = match result {
            Ok(receipt) => {
                entry.progress.complete();
                logger.log_completion(&format!("uploaded as {}", receipt.video_id));
                metrics::counter!("vshort_jobs_completed_total").increment(1);
                job.succeed(receipt.video_id, receipt.url)
            }
            Err(error) => {
                logger.log_error(&error.to_string());
                metrics::counter!("vshort_jobs_failed_total", "kind" => error.kind.as_str()).increment(1);
                job.fail(error)
            }
        };
        if let Err(e) = transition {
            logger.log_error(&format!("terminal transition rejected: {}", e));
        }

        if let Some(record) = HistoryRecord::from_job(&job) {
            if let Err(e) = self.history.append(record).await {
                logger.log_error(&format!("failed to append history record: {}", e));
            }
        }

        if let Some(path) = temp_output {
            if let Err(e) = remove_file_if_exists(&path).await {
                logger.log_warning(&format!("failed to remove {}: {}", path.display(), e));
            }
        }

        self.active_sources.lock().await.remove(&job.source_path);
        drop(job);

        self.evict_finished().await;
    }

    /// Drop finished jobs past the retention window or beyond the retained-job cap.
    ///
    /// Their outcome stays available through the history store.
    async fn evict_finished(&self) {
        let entries: Vec<(JobId, Arc<JobEntry>)> = self
            .jobs
            .read()
            .await
            .iter()
            .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
            .collect();

        let now = Utc::now();
        let mut finished = Vec::new();
        for (id, entry) in entries {
            let job = entry.job.read().await;
            if let (true, Some(completed_at)) = (job.status.is_terminal(), job.completed_at) {
                finished.push((id, completed_at));
            }
        }
        // Newest first, so everything past the cap is the oldest
        finished.sort_by(|a, b| b.1.cmp(&a.1));

        let evict: Vec<JobId> = finished
            .into_iter()
            .enumerate()
            .filter(|(index, (_, completed_at))| {
                let age = (now - *completed_at).to_std().unwrap_or_default();
                *index >= self.config.max_retained_jobs || age >= self.config.job_retention
            })
            .map(|(_, (id, _))| id)
            .collect();

        if evict.is_empty() {
            return;
        }

        let mut jobs = self.jobs.write().await;
        for id in &evict {
            jobs.remove(id);
        }
        debug!(evicted = evict.len(), remaining = jobs.len(), "Evicted finished jobs");
    }
}

/// Per-run bookkeeping shared between `execute` and `run_job`.
#[derive(Default)]
struct RunState {
    /// Processed file to delete once the job is terminal
    temp_output: Option<PathBuf>,
    /// Whether an upload was attempted
    reached_upload: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};
    use tokio::sync::Notify;
    use vshort_history::MemoryHistoryStore;
    use vshort_media::{MediaProbe, MediaResult, TranscodeRequest, Transcoder};
    use vshort_models::{ProcessingOptions, VideoAsset};
    use vshort_youtube::{ChannelInfo, PlatformResult};

    struct FakeProbe {
        width: u32,
        height: u32,
        duration: f64,
        fail: bool,
        gate: Option<Arc<Notify>>,
    }

    impl FakeProbe {
        fn new(width: u32, height: u32, duration: f64) -> Self {
            Self {
                width,
                height,
                duration,
                fail: false,
                gate: None,
            }
        }
    }

    #[async_trait]
    impl MediaProbe for FakeProbe {
        async fn probe(&self, path: &Path) -> MediaResult<VideoAsset> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(MediaError::invalid_video("No video stream found"));
            }
            Ok(VideoAsset {
                path: path.to_path_buf(),
                width: self.width,
                height: self.height,
                duration: self.duration,
                frame_rate: 30.0,
                codec: "h264".into(),
                size: 4096,
                has_audio: true,
            })
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum TranscodeMode {
        Succeed,
        Fail,
        TimeOut,
        HangUntilCancelled,
    }

    struct FakeTranscoder {
        mode: TranscodeMode,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn transcode(&self, request: &TranscodeRequest, cancel: watch::Receiver<bool>) -> MediaResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(&request.output, b"vertical").await?;
            match self.mode {
                TranscodeMode::Succeed => Ok(()),
                TranscodeMode::Fail => Err(MediaError::ffmpeg_failed(
                    "FFmpeg exited with non-zero status",
                    Some("Conversion failed!".into()),
                    Some(1),
                )),
                TranscodeMode::TimeOut => Err(MediaError::Timeout(600)),
                TranscodeMode::HangUntilCancelled => {
                    wait_cancelled(cancel).await;
                    Err(MediaError::Cancelled)
                }
            }
        }
    }

    /// Plays back scripted results, one per call; succeeds once the script runs out.
    struct FakePlatform {
        script: std::sync::Mutex<Vec<PlatformError>>,
        calls: AtomicUsize,
        uploaded: std::sync::Mutex<Vec<PathBuf>>,
        call_times: std::sync::Mutex<Vec<Instant>>,
        gate: Option<Arc<Notify>>,
        panics: bool,
    }

    impl FakePlatform {
        fn new(script: Vec<PlatformError>) -> Self {
            Self {
                script: std::sync::Mutex::new(script),
                calls: AtomicUsize::new(0),
                uploaded: std::sync::Mutex::new(Vec::new()),
                call_times: std::sync::Mutex::new(Vec::new()),
                gate: None,
                panics: false,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PlatformClient for FakePlatform {
        async fn upload(
            &self,
            path: &Path,
            _metadata: &UploadMetadata,
            progress: &UploadProgress,
        ) -> PlatformResult<UploadReceipt> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.call_times.lock().unwrap().push(Instant::now());
            self.uploaded.lock().unwrap().push(path.to_path_buf());
            assert!(path.exists(), "upload source must exist");
            if self.panics {
                panic!("platform client bug");
            }

            progress.set_total(100);
            progress.advance_to(50);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }

            let next = {
                let mut script = self.script.lock().unwrap();
                if script.is_empty() {
                    None
                } else {
                    Some(script.remove(0))
                }
            };
            match next {
                Some(err) => Err(err),
                None => Ok(UploadReceipt {
                    video_id: "vid123".into(),
                    url: "https://www.youtube.com/watch?v=vid123".into(),
                }),
            }
        }

        async fn channel(&self) -> PlatformResult<Option<ChannelInfo>> {
            Ok(None)
        }
    }

    struct Harness {
        dir: TempDir,
        orchestrator: Arc<UploadOrchestrator>,
        transcoder: Arc<FakeTranscoder>,
        history: Arc<MemoryHistoryStore>,
    }

    impl Harness {
        fn new(probe: FakeProbe, mode: TranscodeMode) -> Self {
            Self::with_config(probe, mode, |_| {})
        }

        fn with_config(probe: FakeProbe, mode: TranscodeMode, configure: impl FnOnce(&mut WorkerConfig)) -> Self {
            let dir = TempDir::new().unwrap();
            let transcoder = Arc::new(FakeTranscoder {
                mode,
                calls: AtomicUsize::new(0),
            });
            let history = Arc::new(MemoryHistoryStore::new());
            let processor = VideoProcessor::new(
                Arc::new(probe),
                transcoder.clone(),
                ProcessingOptions::default(),
                dir.path().join("work"),
            );
            let mut config = WorkerConfig::default();
            config.work_dir = dir.path().join("work");
            config.upload_retry = config.upload_retry.with_base_delay(Duration::from_millis(1));
            configure(&mut config);
            let orchestrator = Arc::new(UploadOrchestrator::new(processor, history.clone(), config));
            Self {
                dir,
                orchestrator,
                transcoder,
                history,
            }
        }

        fn source(&self, name: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, vec![1u8; 2048]).unwrap();
            path
        }

        fn work_files(&self) -> usize {
            std::fs::read_dir(self.dir.path().join("work"))
                .map(|d| d.count())
                .unwrap_or(0)
        }

        async fn wait_for(&self, id: &JobId, pred: impl Fn(JobStatus) -> bool) -> JobStatusView {
            for _ in 0..500 {
                let view = self.orchestrator.get_status(id).await.unwrap();
                if pred(view.status) {
                    return view;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("job {} never reached the expected status", id);
        }

        async fn wait_terminal(&self, id: &JobId) -> JobStatusView {
            self.wait_for(id, |s| s.is_terminal()).await
        }

        async fn wait_evicted(&self, id: &JobId) {
            for _ in 0..500 {
                if self.orchestrator.get_status(id).await.is_err() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("job {} was never evicted", id);
        }

        async fn wait_history(&self, count: usize) -> Vec<HistoryRecord> {
            for _ in 0..500 {
                let records = self.history.list_all().await.unwrap();
                if records.len() >= count {
                    return records;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("history never reached {} records", count);
        }
    }

    fn meta() -> UploadMetadata {
        UploadMetadata::new("My Short", "desc")
    }

    #[tokio::test]
    async fn test_compliant_source_uploads_directly() {
        let h = Harness::new(FakeProbe::new(1080, 1920, 30.0), TranscodeMode::Succeed);
        let source = h.source("vertical.mp4");
        let platform = Arc::new(FakePlatform::new(vec![]));

        let job = h.orchestrator.submit(&source, meta(), platform.clone()).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let view = h.wait_terminal(&job.id).await;
        assert_eq!(view.status, JobStatus::Succeeded);
        assert_eq!(view.video_id.as_deref(), Some("vid123"));
        assert_eq!(view.progress, 1.0);
        assert_eq!(platform.calls(), 1);
        assert_eq!(h.transcoder.calls.load(Ordering::SeqCst), 0);
        assert!(source.exists());

        let history = h.history.list_all().await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].is_success());
        assert_eq!(history[0].job_id, job.id);
    }

    #[tokio::test]
    async fn test_landscape_source_is_transcoded_and_cleaned_up() {
        let h = Harness::new(FakeProbe::new(1920, 1080, 90.0), TranscodeMode::Succeed);
        let source = h.source("wide.mp4");
        let platform = Arc::new(FakePlatform::new(vec![]));

        let job = h.orchestrator.submit(&source, meta(), platform.clone()).await.unwrap();
        let view = h.wait_terminal(&job.id).await;

        assert_eq!(view.status, JobStatus::Succeeded);
        assert_eq!(h.transcoder.calls.load(Ordering::SeqCst), 1);
        let uploaded = platform.uploaded.lock().unwrap().clone();
        assert!(uploaded[0].to_string_lossy().contains("_crop916_"));
        assert_eq!(h.work_files(), 0);
        assert!(source.exists());

        let snapshot = h.orchestrator.get_job(&job.id).await.unwrap();
        let plan = snapshot.plan.unwrap();
        assert_eq!((plan.target_width, plan.target_height), (594, 1056));
    }

    #[tokio::test]
    async fn test_processing_failure_never_uploads() {
        let h = Harness::new(FakeProbe::new(1920, 1080, 90.0), TranscodeMode::Fail);
        let source = h.source("broken.mp4");
        let platform = Arc::new(FakePlatform::new(vec![]));

        let job = h.orchestrator.submit(&source, meta(), platform.clone()).await.unwrap();
        let view = h.wait_terminal(&job.id).await;

        assert_eq!(view.status, JobStatus::Failed);
        let error = view.error.unwrap();
        assert_eq!(error.kind, ErrorKind::ProcessingError);
        assert!(error.message.contains("Conversion failed!"));
        assert_eq!(platform.calls(), 0);
        assert_eq!(h.work_files(), 0);

        let history = h.history.list_all().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_probe_failure_fails_from_pending() {
        let mut probe = FakeProbe::new(0, 0, 0.0);
        probe.fail = true;
        let h = Harness::new(probe, TranscodeMode::Succeed);
        let platform = Arc::new(FakePlatform::new(vec![]));

        let job = h
            .orchestrator
            .submit(h.dir.path().join("missing.mp4"), meta(), platform.clone())
            .await
            .unwrap();
        let view = h.wait_terminal(&job.id).await;

        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.error.unwrap().kind, ErrorKind::ProbeError);
        assert_eq!(platform.calls(), 0);
        assert_eq!(h.history.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_quota_error_is_not_retried() {
        let h = Harness::new(FakeProbe::new(1080, 1920, 30.0), TranscodeMode::Succeed);
        let source = h.source("q.mp4");
        let platform = Arc::new(FakePlatform::new(vec![PlatformError::Quota("quotaExceeded".into())]));

        let job = h.orchestrator.submit(&source, meta(), platform.clone()).await.unwrap();
        let view = h.wait_terminal(&job.id).await;

        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.error.unwrap().kind, ErrorKind::QuotaError);
        assert_eq!(platform.calls(), 1);
        assert!(view.progress < 1.0);
        assert_eq!(h.history.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_network_error_is_retried() {
        let h = Harness::new(FakeProbe::new(1080, 1920, 30.0), TranscodeMode::Succeed);
        let source = h.source("n.mp4");
        let platform = Arc::new(FakePlatform::new(vec![
            PlatformError::Network("connection reset".into()),
            PlatformError::Network("server error 503".into()),
        ]));

        let job = h.orchestrator.submit(&source, meta(), platform.clone()).await.unwrap();
        let view = h.wait_terminal(&job.id).await;

        assert_eq!(view.status, JobStatus::Succeeded);
        assert_eq!(platform.calls(), 3);
    }

    #[tokio::test]
    async fn test_network_retries_exhausted() {
        let h = Harness::new(FakeProbe::new(1080, 1920, 30.0), TranscodeMode::Succeed);
        let source = h.source("n.mp4");
        let platform = Arc::new(FakePlatform::new(vec![
            PlatformError::Network("a".into()),
            PlatformError::Network("b".into()),
            PlatformError::Network("c".into()),
        ]));

        let job = h.orchestrator.submit(&source, meta(), platform.clone()).await.unwrap();
        let view = h.wait_terminal(&job.id).await;

        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.error.unwrap().kind, ErrorKind::NetworkError);
        assert_eq!(platform.calls(), 3);
    }

    #[tokio::test]
    async fn test_second_job_for_same_source_is_rejected() {
        let gate = Arc::new(Notify::new());
        let mut probe = FakeProbe::new(1080, 1920, 30.0);
        probe.gate = Some(gate.clone());
        let h = Harness::new(probe, TranscodeMode::Succeed);
        let source = h.source("busy.mp4");
        let platform = Arc::new(FakePlatform::new(vec![]));

        let first = h.orchestrator.submit(&source, meta(), platform.clone()).await.unwrap();
        let err = h
            .orchestrator
            .submit(&source, meta(), platform.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::SourceBusy { ref job_id, .. } if *job_id == first.id));

        gate.notify_one();
        h.wait_terminal(&first.id).await;

        // Released once the first job finished
        let second = h.orchestrator.submit(&source, meta(), platform.clone()).await.unwrap();
        gate.notify_one();
        h.wait_terminal(&second.id).await;
        assert_eq!(h.orchestrator.list_jobs().await.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_during_processing() {
        let h = Harness::new(FakeProbe::new(1920, 1080, 90.0), TranscodeMode::HangUntilCancelled);
        let source = h.source("slow.mp4");
        let platform = Arc::new(FakePlatform::new(vec![]));

        let job = h.orchestrator.submit(&source, meta(), platform.clone()).await.unwrap();
        h.wait_for(&job.id, |s| s == JobStatus::Processing).await;

        h.orchestrator.cancel(&job.id).await.unwrap();
        let view = h.wait_terminal(&job.id).await;

        assert_eq!(view.status, JobStatus::Failed);
        let error = view.error.unwrap();
        assert_eq!(error.kind, ErrorKind::ProcessingError);
        assert_eq!(error.message, CANCELLED_MESSAGE);
        assert_eq!(platform.calls(), 0);
        assert_eq!(h.work_files(), 0);
        assert_eq!(h.history.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_while_uploading_is_rejected() {
        let h = Harness::new(FakeProbe::new(1080, 1920, 30.0), TranscodeMode::Succeed);
        let source = h.source("up.mp4");
        let gate = Arc::new(Notify::new());
        let mut platform = FakePlatform::new(vec![]);
        platform.gate = Some(gate.clone());
        let platform = Arc::new(platform);

        let job = h.orchestrator.submit(&source, meta(), platform.clone()).await.unwrap();
        let view = h.wait_for(&job.id, |s| s == JobStatus::Uploading).await;
        assert!(view.progress >= 0.0 && view.progress <= 1.0);

        let err = h.orchestrator.cancel(&job.id).await.unwrap_err();
        assert!(matches!(err, WorkerError::NotCancellable { status: JobStatus::Uploading, .. }));

        gate.notify_one();
        assert_eq!(h.wait_terminal(&job.id).await.status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_cancel_finished_and_unknown_jobs() {
        let h = Harness::new(FakeProbe::new(1080, 1920, 30.0), TranscodeMode::Succeed);
        let source = h.source("done.mp4");
        let platform = Arc::new(FakePlatform::new(vec![]));

        let job = h.orchestrator.submit(&source, meta(), platform).await.unwrap();
        h.wait_terminal(&job.id).await;

        assert!(matches!(
            h.orchestrator.cancel(&job.id).await,
            Err(WorkerError::NotCancellable { .. })
        ));
        assert!(matches!(
            h.orchestrator.cancel(&JobId::new()).await,
            Err(WorkerError::NotFound(_))
        ));
        assert!(matches!(
            h.orchestrator.get_status(&JobId::new()).await,
            Err(WorkerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_transcode_timeout_fails_without_upload() {
        let h = Harness::new(FakeProbe::new(1920, 1080, 90.0), TranscodeMode::TimeOut);
        let source = h.source("long.mp4");
        let platform = Arc::new(FakePlatform::new(vec![]));

        let job = assert_ok!(h.orchestrator.submit(&source, meta(), platform.clone()).await);
        let view = h.wait_terminal(&job.id).await;

        assert_eq!(view.status, JobStatus::Failed);
        let error = view.error.unwrap();
        assert_eq!(error.kind, ErrorKind::ProcessingError);
        assert!(error.message.contains("timed out after 600 seconds"));
        assert_eq!(platform.calls(), 0);
        assert_eq!(h.work_files(), 0);
        assert!(source.exists());

        let history = h.history.list_all().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_finished_jobs_expire_after_retention() {
        let h = Harness::with_config(FakeProbe::new(1080, 1920, 30.0), TranscodeMode::Succeed, |config| {
            config.job_retention = Duration::ZERO;
        });
        let source = h.source("gone.mp4");
        let platform = Arc::new(FakePlatform::new(vec![]));

        let job = assert_ok!(h.orchestrator.submit(&source, meta(), platform.clone()).await);
        h.wait_evicted(&job.id).await;

        assert!(matches!(
            h.orchestrator.get_status(&job.id).await,
            Err(WorkerError::NotFound(_))
        ));
        assert!(h.orchestrator.list_jobs().await.is_empty());

        // The outcome survives in history
        let history = h.history.list_all().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].job_id, job.id);
        assert!(history[0].is_success());
    }

    #[tokio::test]
    async fn test_oldest_finished_jobs_beyond_cap_are_evicted() {
        let h = Harness::with_config(FakeProbe::new(1080, 1920, 30.0), TranscodeMode::Succeed, |config| {
            config.max_retained_jobs = 1;
        });
        let platform = Arc::new(FakePlatform::new(vec![]));

        let first = assert_ok!(h.orchestrator.submit(h.source("a.mp4"), meta(), platform.clone()).await);
        h.wait_terminal(&first.id).await;
        let second = assert_ok!(h.orchestrator.submit(h.source("b.mp4"), meta(), platform.clone()).await);
        h.wait_terminal(&second.id).await;
        h.wait_evicted(&first.id).await;

        let remaining = h.orchestrator.list_jobs().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].job_id, second.id);
        assert_eq!(h.history.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_panicking_client_still_finishes_job() {
        let h = Harness::new(FakeProbe::new(1080, 1920, 30.0), TranscodeMode::Succeed);
        let source = h.source("crash.mp4");
        let mut platform = FakePlatform::new(vec![]);
        platform.panics = true;
        let platform = Arc::new(platform);

        let job = assert_ok!(h.orchestrator.submit(&source, meta(), platform.clone()).await);
        let view = h.wait_terminal(&job.id).await;

        assert_eq!(view.status, JobStatus::Failed);
        let error = view.error.unwrap();
        assert_eq!(error.kind, ErrorKind::ProcessingError);
        assert!(error.message.starts_with("job task failed"));
        assert_eq!(h.wait_history(1).await.len(), 1);

        // The source claim was released
        let retry = assert_ok!(
            h.orchestrator
                .submit(&source, meta(), Arc::new(FakePlatform::new(vec![])))
                .await
        );
        assert_eq!(h.wait_terminal(&retry.id).await.status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_delay_follows_failed_upload() {
        let h = Harness::with_config(FakeProbe::new(1080, 1920, 30.0), TranscodeMode::Succeed, |config| {
            config.upload_delay = Duration::from_millis(300);
        });
        let platform = Arc::new(FakePlatform::new(vec![PlatformError::Quota("quotaExceeded".into())]));

        let first = assert_ok!(h.orchestrator.submit(h.source("a.mp4"), meta(), platform.clone()).await);
        let second = assert_ok!(h.orchestrator.submit(h.source("b.mp4"), meta(), platform.clone()).await);

        // Either job may win the permit; the one uploading first hits the quota error
        let mut statuses = vec![
            h.wait_terminal(&first.id).await.status,
            h.wait_terminal(&second.id).await.status,
        ];
        statuses.sort_by_key(|s| s.to_string());
        assert_eq!(statuses, vec![JobStatus::Failed, JobStatus::Succeeded]);

        let times = platform.call_times.lock().unwrap().clone();
        assert_eq!(times.len(), 2);
        assert!(times[1].duration_since(times[0]) >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_busy_source_error_names_running_job() {
        let gate = Arc::new(Notify::new());
        let mut probe = FakeProbe::new(1080, 1920, 30.0);
        probe.gate = Some(gate.clone());
        let h = Harness::new(probe, TranscodeMode::Succeed);
        let source = h.source("dup.mp4");
        let platform = Arc::new(FakePlatform::new(vec![]));

        let first = assert_ok!(h.orchestrator.submit(&source, meta(), platform.clone()).await);
        let err = assert_err!(h.orchestrator.submit(&source, meta(), platform.clone()).await);
        assert!(err.to_string().contains(first.id.as_str()));

        gate.notify_one();
        h.wait_terminal(&first.id).await;
    }
}
