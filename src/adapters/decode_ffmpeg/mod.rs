//! FFmpeg decode backends
//!
//! Both backends run one `ffmpeg` process per sample and read raw RGB24
//! frames from its stdout. Presentation times and frame sizes come from the
//! `showinfo` filter on stderr. `ffmpeg-seek` seeks the input before decoding,
//! `ffmpeg-scan` decodes from the start of the stream.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::adapters::exec_ffmpeg::stderr_tail;
use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;

/// How the input is positioned before decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// Input seeking to the first requested timestamp
    Seek,
    /// Decode from the first frame of the stream
    Scan,
}

impl SeekMode {
    pub fn backend_name(&self) -> &'static str {
        match self {
            SeekMode::Seek => "ffmpeg-seek",
            SeekMode::Scan => "ffmpeg-scan",
        }
    }
}

/// `showinfo` report for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    pub pts_time: f64,
    pub width: u32,
    pub height: u32,
}

/// Decode backend over the `ffmpeg` binary
pub struct FfmpegDecodeAdapter {
    mode: SeekMode,
    ffmpeg_bin: PathBuf,
}

impl FfmpegDecodeAdapter {
    pub fn new(mode: SeekMode, ffmpeg_bin: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }

    pub fn seek(ffmpeg_bin: impl Into<PathBuf>) -> Self {
        Self::new(SeekMode::Seek, ffmpeg_bin)
    }

    pub fn scan(ffmpeg_bin: impl Into<PathBuf>) -> Self {
        Self::new(SeekMode::Scan, ffmpeg_bin)
    }

    /// Arguments decoding every frame in `[first - tol, last + tol]`
    pub fn build_args(&self, video: &Path, first: f64, last: f64, tolerance_s: f64) -> Vec<String> {
        let start = (first - tolerance_s).max(0.0);
        let end = last + tolerance_s;

        let mut args = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            "info".to_string(),
        ];
        if self.mode == SeekMode::Seek && start > 0.0 {
            args.push("-ss".to_string());
            args.push(format!("{:.6}", start));
        }
        args.extend([
            "-copyts".to_string(),
            "-i".to_string(),
            video.to_string_lossy().to_string(),
            "-an".to_string(),
            "-vf".to_string(),
            format!("trim=start={:.6}:end={:.6},showinfo", start, end),
            "-fps_mode".to_string(),
            "passthrough".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-".to_string(),
        ]);
        args
    }
}

/// Pull per-frame `pts_time` and size out of `showinfo` log lines
pub fn parse_showinfo(stderr: &str) -> Vec<FrameInfo> {
    stderr
        .lines()
        .filter(|line| line.contains("showinfo"))
        .filter_map(|line| {
            let pts_time = token_after(line, "pts_time:")?.parse::<f64>().ok()?;
            let size = token_after(line, " s:")?;
            let (w, h) = size.split_once('x')?;
            Some(FrameInfo {
                pts_time,
                width: w.parse().ok()?,
                height: h.parse().ok()?,
            })
        })
        .collect()
}

fn token_after<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    line[start..].split_whitespace().next()
}

/// Cut a raw RGB24 stream into frames described by `infos`
pub fn split_frames(raw: &[u8], infos: &[FrameInfo]) -> Result<Vec<DecodedFrame>, DomainError> {
    let expected: usize = infos
        .iter()
        .map(|i| i.width as usize * i.height as usize * Frame::CHANNELS)
        .sum();
    if expected != raw.len() {
        return Err(DomainError::DecodeFailed(format!(
            "decoder wrote {} bytes, {} frames need {}",
            raw.len(),
            infos.len(),
            expected
        )));
    }

    let mut offset = 0;
    infos
        .iter()
        .map(|info| {
            let len = info.width as usize * info.height as usize * Frame::CHANNELS;
            let frame = Frame::new(info.width, info.height, raw[offset..offset + len].to_vec())?;
            offset += len;
            Ok(DecodedFrame {
                pts: info.pts_time,
                frame,
            })
        })
        .collect()
}

impl DecodePort for FfmpegDecodeAdapter {
    fn backend(&self) -> &str {
        self.mode.backend_name()
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            exact_seek: self.mode == SeekMode::Seek,
            sparse_decode: false,
        }
    }

    fn decode(
        &self,
        video: &Path,
        timestamps: &[f64],
        tolerance_s: f64,
    ) -> Result<Vec<DecodedFrame>, DomainError> {
        let (first, last) = match (timestamps.first(), timestamps.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Ok(Vec::new()),
        };

        let args = self.build_args(video, first, last, tolerance_s);
        debug!(backend = self.backend(), "Decoding: {:?}", args);

        let output = Command::new(&self.ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| DomainError::DecodeFailed(format!("failed to spawn decoder: {}", e)))?;

        if !output.status.success() {
            return Err(DomainError::DecodeFailed(format!(
                "decoder exited with {:?}: {}",
                output.status.code(),
                stderr_tail(&output.stderr, 1024)
            )));
        }

        let infos = parse_showinfo(&String::from_utf8_lossy(&output.stderr));
        split_frames(&output.stdout, &infos)
    }
}
