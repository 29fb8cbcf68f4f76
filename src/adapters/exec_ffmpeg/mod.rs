//! FFmpeg encoder adapter
//!
//! Turns a PNG frame sequence into one video artifact by spawning the
//! `ffmpeg` binary. Encodes are awaited one at a time by the sweep.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;

/// Bytes of stderr kept in an `EncoderFailed` error
const STDERR_TAIL_BYTES: usize = 2048;

/// FFmpeg-based encode adapter
pub struct FfmpegEncoderAdapter {
    ffmpeg_bin: PathBuf,
}

impl FfmpegEncoderAdapter {
    /// Create new encoder adapter for the given binary
    pub fn new(ffmpeg_bin: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }

    /// Arguments for one encode; fixed flags keep repeated encodes byte-identical
    pub fn build_args(job: &EncodeJob) -> Vec<String> {
        let spec = &job.spec;
        let mut args = vec![
            "-f".to_string(),
            "image2".to_string(),
            "-r".to_string(),
            job.fps.to_string(),
            "-i".to_string(),
            job.frame_pattern.to_string_lossy().to_string(),
            "-vcodec".to_string(),
            spec.codec.clone(),
            "-pix_fmt".to_string(),
            spec.pixel_format.clone(),
        ];
        if let Some(g) = spec.keyframe_interval {
            args.push("-g".to_string());
            args.push(g.to_string());
        }
        if let Some(crf) = spec.compression_level {
            args.push("-crf".to_string());
            args.push(crf.to_string());
        }
        args.extend(
            [
                "-map_metadata",
                "-1",
                "-fflags",
                "+bitexact",
                "-flags:v",
                "+bitexact",
                "-loglevel",
                "error",
                "-y",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(job.output.to_string_lossy().to_string());
        args
    }

    fn command_line(&self, args: &[String]) -> String {
        std::iter::once(self.ffmpeg_bin.to_string_lossy().to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Last `max_bytes` of a process's stderr, cut on a char boundary
pub fn stderr_tail(stderr: &[u8], max_bytes: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    if text.len() <= max_bytes {
        return text.trim_end().to_string();
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].trim_end().to_string()
}

#[async_trait]
impl EncodePort for FfmpegEncoderAdapter {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn encode(&self, job: &EncodeJob) -> Result<(), DomainError> {
        if let Some(parent) = job.output.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DomainError::FsFail(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let args = Self::build_args(job);
        let command = self.command_line(&args);
        debug!("Running encoder: {}", command);

        let output = tokio::process::Command::new(&self.ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| DomainError::EncoderFailed {
                command: command.clone(),
                code: None,
                stderr: format!("failed to spawn encoder: {}", e),
            })?;

        if !output.status.success() {
            return Err(DomainError::EncoderFailed {
                command,
                code: output.status.code(),
                stderr: stderr_tail(&output.stderr, STDERR_TAIL_BYTES),
            });
        }

        if !job.output.is_file() {
            return Err(DomainError::EncoderFailed {
                command,
                code: output.status.code(),
                stderr: format!("encoder exited cleanly but {} is missing", job.output.display()),
            });
        }

        Ok(())
    }
}
