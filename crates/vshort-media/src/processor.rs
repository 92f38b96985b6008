//! Turns a processing plan into an upload-ready file.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use vshort_models::{EncodingConfig, ProcessingOptions, ProcessingPlan, VideoAsset};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{build_video_filter, OUTPUT_PIXEL_FORMAT};
use crate::fs_utils::{ensure_readable, output_path, sibling_output_path};
use crate::planner;
use crate::probe::MediaProbe;

/// Everything a transcoder needs to produce one output file.
#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    pub source: PathBuf,
    pub output: PathBuf,
    pub plan: ProcessingPlan,
    pub source_width: u32,
    pub source_height: u32,
    pub has_audio: bool,
}

/// Runs the crop/scale/trim transcode.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, request: &TranscodeRequest, cancel: watch::Receiver<bool>) -> MediaResult<()>;
}

/// `Transcoder` that shells out to FFmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    encoding: EncodingConfig,
    timeout_secs: u64,
}

impl FfmpegTranscoder {
    pub fn new(encoding: EncodingConfig, timeout_secs: u64) -> Self {
        Self {
            encoding,
            timeout_secs,
        }
    }

    /// Build the FFmpeg invocation for a request.
    pub fn build_command(&self, request: &TranscodeRequest) -> MediaResult<FfmpegCommand> {
        let filter = build_video_filter(&request.plan, request.source_width, request.source_height)
            .ok_or_else(|| MediaError::invalid_video("plan does not require a transcode"))?;

        let mut cmd = FfmpegCommand::new(&request.source, &request.output);
        if let Some(trim) = request.plan.trim {
            cmd = cmd.seek(trim.start).duration(trim.duration());
        }

        Ok(cmd
            .video_filter(filter)
            .pixel_format(OUTPUT_PIXEL_FORMAT)
            .encoding(&self.encoding, request.has_audio))
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, request: &TranscodeRequest, cancel: watch::Receiver<bool>) -> MediaResult<()> {
        let cmd = self.build_command(request)?;
        let expected_ms = request
            .plan
            .trim
            .map(|t| (t.duration() * 1000.0) as i64)
            .unwrap_or(0);
        let source = request.source.display().to_string();

        let start = Instant::now();
        let result = FfmpegRunner::new()
            .with_cancel(cancel)
            .with_timeout(self.timeout_secs)
            .run_with_progress(&cmd, move |progress| {
                debug!(
                    source = %source,
                    fraction = progress.fraction(expected_ms),
                    speed = progress.speed,
                    eta_secs = progress.eta_seconds(expected_ms).unwrap_or_default(),
                    "Transcode progress"
                );
            })
            .await;

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::histogram!("vshort_transcode_duration_seconds", "status" => status)
            .record(start.elapsed().as_secs_f64());

        result
    }
}

/// Result of `VideoProcessor::execute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedOutput {
    /// File to upload
    pub path: PathBuf,
    /// True when `path` was created by processing and must be deleted afterwards
    pub is_temporary: bool,
}

/// Probe, plan and execute for one source file.
#[derive(Clone)]
pub struct VideoProcessor {
    probe: Arc<dyn MediaProbe>,
    transcoder: Arc<dyn Transcoder>,
    options: ProcessingOptions,
    work_dir: PathBuf,
}

impl VideoProcessor {
    pub fn new(
        probe: Arc<dyn MediaProbe>,
        transcoder: Arc<dyn Transcoder>,
        options: ProcessingOptions,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            probe,
            transcoder,
            options,
            work_dir: work_dir.into(),
        }
    }

    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Probe a source file.
    pub async fn probe(&self, path: &Path) -> MediaResult<VideoAsset> {
        self.probe.probe(path).await
    }

    /// Plan with this processor's options.
    pub fn plan(&self, asset: &VideoAsset) -> MediaResult<ProcessingPlan> {
        planner::plan(asset, &self.options)
    }

    /// Produce the file to upload.
    ///
    /// A passthrough plan returns the source path untouched. Otherwise the output is
    /// written to the work dir under a name derived from `tag`.
    pub async fn execute(
        &self,
        asset: &VideoAsset,
        plan: &ProcessingPlan,
        tag: &str,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<ProcessedOutput> {
        if !plan.needs_transform {
            debug!(path = %asset.path.display(), "Source already compliant, skipping transcode");
            return Ok(ProcessedOutput {
                path: asset.path.clone(),
                is_temporary: false,
            });
        }

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let output = output_path(&self.work_dir, &asset.path, tag);
        let path = self.render_to(asset, plan, &output, cancel).await?;

        Ok(ProcessedOutput {
            path,
            is_temporary: true,
        })
    }

    /// Transcode into a permanent `<stem>_crop916` file next to the source.
    ///
    /// Refuses compliant sources and never overwrites an existing output.
    pub async fn process_beside_source(
        &self,
        asset: &VideoAsset,
        plan: &ProcessingPlan,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<PathBuf> {
        if !plan.needs_transform {
            return Err(MediaError::AlreadyCompliant(asset.path.clone()));
        }

        let output = sibling_output_path(&asset.path);
        if tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(MediaError::OutputExists(output));
        }

        self.render_to(asset, plan, &output, cancel).await
    }

    /// Run the transcode for a transforming plan into `output`.
    ///
    /// The partial output is removed on any failure.
    async fn render_to(
        &self,
        asset: &VideoAsset,
        plan: &ProcessingPlan,
        output: &Path,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<PathBuf> {
        ensure_readable(&asset.path).await?;

        let output = output.to_path_buf();
        let request = TranscodeRequest {
            source: asset.path.clone(),
            output: output.clone(),
            plan: plan.clone(),
            source_width: asset.width,
            source_height: asset.height,
            has_audio: asset.has_audio,
        };

        // Deletes the partial output unless defused on success
        let guard = scopeguard::guard(output.clone(), |path| {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to remove partial output");
                }
            }
        });

        info!(
            source = %asset.path.display(),
            output = %output.display(),
            crop = ?plan.crop,
            trim = ?plan.trim,
            target = %format!("{}x{}", plan.target_width, plan.target_height),
            "Transcoding to 9:16"
        );

        self.transcoder.transcode(&request, cancel).await?;

        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg reported success but produced no output",
                None,
                None,
            ));
        }

        Ok(scopeguard::ScopeGuard::into_inner(guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use vshort_models::{CropRect, TrimWindow};

    /// Writes a few bytes, then either succeeds or fails.
    struct FakeTranscoder {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn transcode(&self, request: &TranscodeRequest, _cancel: watch::Receiver<bool>) -> MediaResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(&request.output, b"partial").await?;
            if self.fail {
                Err(MediaError::ffmpeg_failed("exit 1", Some("boom".into()), Some(1)))
            } else {
                Ok(())
            }
        }
    }

    struct NoProbe;

    #[async_trait]
    impl MediaProbe for NoProbe {
        async fn probe(&self, path: &Path) -> MediaResult<VideoAsset> {
            Err(MediaError::FileNotFound(path.to_path_buf()))
        }
    }

    fn landscape(path: PathBuf) -> VideoAsset {
        VideoAsset {
            path,
            width: 1920,
            height: 1080,
            duration: 90.0,
            frame_rate: 30.0,
            codec: "h264".into(),
            size: 2048,
            has_audio: true,
        }
    }

    fn processor(dir: &TempDir, transcoder: Arc<FakeTranscoder>) -> VideoProcessor {
        VideoProcessor::new(
            Arc::new(NoProbe),
            transcoder,
            ProcessingOptions::default(),
            dir.path().join("work"),
        )
    }

    #[tokio::test]
    async fn test_passthrough_returns_source() {
        let dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeTranscoder { fail: false, calls: AtomicUsize::new(0) });
        let proc = processor(&dir, fake.clone());
        let (_tx, rx) = watch::channel(false);

        let asset = VideoAsset {
            width: 1080,
            height: 1920,
            duration: 30.0,
            ..landscape(dir.path().join("v.mp4"))
        };
        let plan = proc.plan(&asset).unwrap();
        let out = proc.execute(&asset, &plan, "job1", rx).await.unwrap();

        assert_eq!(out.path, asset.path);
        assert!(!out.is_temporary);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("work").exists());
    }

    #[tokio::test]
    async fn test_transform_writes_output() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("wide.mp4");
        tokio::fs::write(&source, b"source").await.unwrap();

        let fake = Arc::new(FakeTranscoder { fail: false, calls: AtomicUsize::new(0) });
        let proc = processor(&dir, fake.clone());
        let (_tx, rx) = watch::channel(false);

        let asset = landscape(source.clone());
        let plan = proc.plan(&asset).unwrap();
        let out = proc.execute(&asset, &plan, "job2", rx).await.unwrap();

        assert!(out.is_temporary);
        assert_eq!(out.path, dir.path().join("work").join("wide_crop916_job2.mp4"));
        assert!(out.path.exists());
        assert!(source.exists());
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_removes_partial_output() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("wide.mp4");
        tokio::fs::write(&source, b"source").await.unwrap();

        let fake = Arc::new(FakeTranscoder { fail: true, calls: AtomicUsize::new(0) });
        let proc = processor(&dir, fake);
        let (_tx, rx) = watch::channel(false);

        let asset = landscape(source.clone());
        let plan = proc.plan(&asset).unwrap();
        let err = proc.execute(&asset, &plan, "job3", rx).await.unwrap_err();

        assert!(matches!(err, MediaError::FfmpegFailed { .. }));
        assert!(!dir.path().join("work").join("wide_crop916_job3.mp4").exists());
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeTranscoder { fail: false, calls: AtomicUsize::new(0) });
        let proc = processor(&dir, fake.clone());
        let (_tx, rx) = watch::channel(false);

        let asset = landscape(dir.path().join("gone.mp4"));
        let plan = proc.plan(&asset).unwrap();
        let err = proc.execute(&asset, &plan, "job4", rx).await.unwrap_err();

        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_process_beside_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("wide.mkv");
        tokio::fs::write(&source, b"source").await.unwrap();

        let fake = Arc::new(FakeTranscoder { fail: false, calls: AtomicUsize::new(0) });
        let proc = processor(&dir, fake.clone());
        let asset = landscape(source.clone());
        let plan = proc.plan(&asset).unwrap();

        let (_tx, rx) = watch::channel(false);
        let out = proc.process_beside_source(&asset, &plan, rx).await.unwrap();
        assert_eq!(out, dir.path().join("wide_crop916.mkv"));
        assert!(out.exists());
        assert!(!dir.path().join("work").exists());

        // A second run must not overwrite the first result
        let (_tx, rx) = watch::channel(false);
        let err = proc.process_beside_source(&asset, &plan, rx).await.unwrap_err();
        assert!(matches!(err, MediaError::OutputExists(ref p) if *p == out));
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_process_beside_source_rejects_compliant_video() {
        let dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeTranscoder { fail: false, calls: AtomicUsize::new(0) });
        let proc = processor(&dir, fake.clone());
        let asset = VideoAsset {
            width: 1080,
            height: 1920,
            duration: 20.0,
            ..landscape(dir.path().join("v.mp4"))
        };
        let plan = proc.plan(&asset).unwrap();

        let (_tx, rx) = watch::channel(false);
        let err = proc.process_beside_source(&asset, &plan, rx).await.unwrap_err();
        assert!(matches!(err, MediaError::AlreadyCompliant(_)));
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_build_command() {
        let transcoder = FfmpegTranscoder::new(EncodingConfig::default(), 600);
        let request = TranscodeRequest {
            source: PathBuf::from("/in/wide.mp4"),
            output: PathBuf::from("/work/wide_crop916_x.mp4"),
            plan: ProcessingPlan {
                needs_transform: true,
                crop: Some(CropRect::new(656, 0, 607, 1080)),
                trim: Some(TrimWindow::leading(60.0)),
                target_width: 594,
                target_height: 1056,
            },
            source_width: 1920,
            source_height: 1080,
            has_audio: false,
        };

        let args = transcoder.build_command(&request).unwrap().build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-ss 0.000 -t 60.000 -i /in/wide.mp4"));
        assert!(joined.contains("-vf crop=607:1080:656:0,scale=594:1056,setsar=1"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-an"));
        assert!(joined.contains("-movflags +faststart"));
        assert!(joined.ends_with("/work/wide_crop916_x.mp4"));
    }

    #[test]
    fn test_build_command_rejects_passthrough() {
        let transcoder = FfmpegTranscoder::new(EncodingConfig::default(), 600);
        let request = TranscodeRequest {
            source: PathBuf::from("/in/v.mp4"),
            output: PathBuf::from("/work/v.mp4"),
            plan: ProcessingPlan::passthrough(1080, 1920),
            source_width: 1080,
            source_height: 1920,
            has_audio: true,
        };
        assert!(transcoder.build_command(&request).is_err());
    }
}
