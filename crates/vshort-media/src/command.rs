//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use vshort_models::EncodingConfig;

use crate::error::{MediaError, MediaResult};
use crate::progress::{is_progress_line, parse_progress_line, FfmpegProgress};

/// Number of non-progress stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Argument list for one `ffmpeg` invocation.
///
/// Always overwrites the output and reports progress as `key=value` lines on
/// stderr, which [`FfmpegRunner`] parses.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    /// Placed before `-i`
    input_args: Vec<String>,
    /// Placed between `-i` and the output path
    output_args: Vec<String>,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
        }
    }

    fn input_flag(mut self, flag: &str, value: impl Into<String>) -> Self {
        self.input_args.push(flag.to_string());
        self.input_args.push(value.into());
        self
    }

    fn output_flag(mut self, flag: &str, value: impl Into<String>) -> Self {
        self.output_args.push(flag.to_string());
        self.output_args.push(value.into());
        self
    }

    /// Append raw output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Seek before the input is opened.
    pub fn seek(self, seconds: f64) -> Self {
        self.input_flag("-ss", format!("{:.3}", seconds))
    }

    /// Read at most `seconds` of input.
    pub fn duration(self, seconds: f64) -> Self {
        self.input_flag("-t", format!("{:.3}", seconds))
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_flag("-vf", filter)
    }

    pub fn pixel_format(self, pix_fmt: impl Into<String>) -> Self {
        self.output_flag("-pix_fmt", pix_fmt)
    }

    /// Video codec, preset and CRF, then audio (or `-an`), then the extra output flags.
    pub fn encoding(self, config: &EncodingConfig, with_audio: bool) -> Self {
        let cmd = self
            .output_flag("-c:v", config.codec.as_str())
            .output_flag("-preset", config.preset.as_str())
            .output_flag("-crf", config.crf.to_string());

        let cmd = if with_audio {
            cmd.output_flag("-c:a", config.audio_codec.as_str())
                .output_flag("-b:a", config.audio_bitrate.as_str())
        } else {
            cmd.output_args(["-an"])
        };

        cmd.output_args(config.extra_args.iter().cloned())
    }

    /// Full argument vector, without the program name.
    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-v", "error", "-progress", "pipe:2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.extend(self.input_args.iter().cloned());
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());
        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// How the child process wait ended.
enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    Cancelled,
    TimedOut(u64),
}

/// Spawns FFmpeg and races it against a cancel signal and a deadline.
///
/// The child is killed on cancel, on timeout, and when the future is dropped.
#[derive(Default)]
pub struct FfmpegRunner {
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the child once `true` is published.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run to completion, calling `progress_callback` for every parsed progress block.
    ///
    /// Failures carry the last non-progress stderr lines.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        // Cancelled before the process was even started
        if self.is_cancelled() {
            return Err(MediaError::Cancelled);
        }

        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("FFmpeg stderr not captured", None, None))?;
        let mut reader = BufReader::new(stderr).lines();

        // Parse progress and keep the tail of diagnostic output
        let stderr_handle = tokio::spawn(async move {
            let mut current_progress = FfmpegProgress::default();
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

            while let Ok(Some(line)) = reader.next_line().await {
                if is_progress_line(&line) {
                    if let Some(progress) = parse_progress_line(&line, &mut current_progress) {
                        progress_callback(progress);
                    }
                } else if !line.trim().is_empty() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }

            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let outcome = self.wait_for_completion(&mut child).await;

        if !matches!(outcome, Outcome::Exited(_)) {
            let _ = child.kill().await;
        }

        let stderr_tail = stderr_handle.await.unwrap_or_default();

        match outcome {
            Outcome::Exited(status) => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(MediaError::ffmpeg_failed(
                        "FFmpeg exited with non-zero status",
                        Some(stderr_tail),
                        status.code(),
                    ))
                }
            }
            Outcome::Cancelled => {
                info!("FFmpeg cancelled, process killed");
                Err(MediaError::Cancelled)
            }
            Outcome::TimedOut(secs) => {
                warn!("FFmpeg timed out after {} seconds, process killed", secs);
                Err(MediaError::Timeout(secs))
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_rx
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }

    /// Race the child against the cancel signal and the deadline.
    async fn wait_for_completion(&self, child: &mut Child) -> Outcome {
        let mut cancel_rx = self.cancel_rx.clone();
        let timeout_secs = self.timeout_secs;

        let cancelled = async {
            match cancel_rx.as_mut() {
                Some(rx) => loop {
                    if *rx.borrow_and_update() {
                        break;
                    }
                    if rx.changed().await.is_err() {
                        // Sender dropped; nobody can cancel any more
                        std::future::pending::<()>().await;
                    }
                },
                None => std::future::pending::<()>().await,
            }
        };

        let deadline = async {
            match timeout_secs {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            status = child.wait() => Outcome::Exited(status),
            _ = cancelled => Outcome::Cancelled,
            _ = deadline => Outcome::TimedOut(timeout_secs.unwrap_or_default()),
        }
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}
