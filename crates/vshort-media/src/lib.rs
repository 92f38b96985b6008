#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper and 9:16 video processing.
//!
//! This crate provides:
//! - FFprobe-based media probing
//! - The pure crop/trim planner for 9:16 normalization
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Timeout and cancellation support via tokio
//! - The `VideoProcessor` that turns a plan into an output file

pub mod command;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod planner;
pub mod probe;
pub mod processor;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use planner::plan;
pub use probe::{probe_video, FfprobeProbe, MediaProbe};
pub use processor::{FfmpegTranscoder, ProcessedOutput, TranscodeRequest, Transcoder, VideoProcessor};
pub use progress::FfmpegProgress;
