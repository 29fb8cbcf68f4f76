//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;
use clap_num::number_range;

use crate::config_initialization::{parse_int_or_none, SweepOverrides};
use crate::domain::rules::MAX_COMPRESSION_LEVEL;

fn parse_count(s: &str) -> Result<usize, String> {
    number_range(s, 1, 100_000)
}

fn parse_workers(s: &str) -> Result<usize, String> {
    number_range(s, 1, 1024)
}

fn parse_fps(s: &str) -> Result<u32, String> {
    number_range(s, 1, 1000)
}

/// An encoder parameter given on the command line: an integer or `none`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntOrNone(pub Option<u32>);

fn unwrap_params(values: &Option<Vec<IntOrNone>>) -> Option<Vec<Option<u32>>> {
    values
        .as_ref()
        .map(|values| values.iter().map(|value| value.0).collect())
}

/// g value: a positive integer or `none`
fn parse_keyframe_interval(s: &str) -> Result<IntOrNone, String> {
    match parse_int_or_none(s)? {
        Some(0) => Err("keyframe interval must be at least 1".to_string()),
        value => Ok(IntOrNone(value)),
    }
}

/// crf value: an integer in 0..=56 or `none`
fn parse_compression_level(s: &str) -> Result<IntOrNone, String> {
    match parse_int_or_none(s)? {
        Some(crf) if crf > MAX_COMPRESSION_LEVEL => Err(format!(
            "compression level must be in 0..={}, got {}",
            MAX_COMPRESSION_LEVEL, crf
        )),
        value => Ok(IntOrNone(value)),
    }
}

/// Arguments for the run command
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Directory for videos, tables and reports
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Directory dataset identifiers are resolved against
    #[arg(long)]
    pub data_root: Option<PathBuf>,

    /// Dataset identifiers (paths under the data root)
    #[arg(long, num_args = 1..)]
    pub datasets: Option<Vec<String>>,

    /// Encoder names passed to ffmpeg's -vcodec
    #[arg(long, num_args = 1..)]
    pub codecs: Option<Vec<String>>,

    /// Pixel formats passed to ffmpeg's -pix_fmt
    #[arg(long = "pix-fmts", num_args = 1..)]
    pub pixel_formats: Option<Vec<String>>,

    /// Keyframe intervals to try (integers or `none`)
    #[arg(long = "g", num_args = 1.., value_parser = parse_keyframe_interval)]
    pub keyframe_intervals: Option<Vec<IntOrNone>>,

    /// Compression levels to try (0-56 or `none`)
    #[arg(long = "crf", num_args = 1.., value_parser = parse_compression_level)]
    pub compression_levels: Option<Vec<IntOrNone>>,

    /// Keyframe interval held fixed while crf varies
    #[arg(long = "baseline-g", value_parser = parse_keyframe_interval)]
    pub baseline_keyframe_interval: Option<IntOrNone>,

    /// Compression level held fixed while g varies
    #[arg(long = "baseline-crf", value_parser = parse_compression_level)]
    pub baseline_compression_level: Option<IntOrNone>,

    /// Timestamp scenarios: 1_frame, 2_frames, 2_frames_4_space, 6_frames
    #[arg(long, num_args = 1..)]
    pub timestamps_modes: Option<Vec<String>>,

    /// Decode backends to benchmark
    #[arg(long, num_args = 1..)]
    pub backends: Option<Vec<String>>,

    /// Random samples per (artifact, scenario, backend)
    #[arg(long, value_parser = parse_count)]
    pub num_samples: Option<usize>,

    /// Scoring worker threads
    #[arg(long, value_parser = parse_workers)]
    pub num_workers: Option<usize>,

    /// Save decoded and original frames of the first sample for inspection
    #[arg(long)]
    pub save_frames: bool,

    /// Do not save frames, even if a config file or the environment asks to
    #[arg(long, conflicts_with = "save_frames")]
    pub no_save_frames: bool,

    /// Re-encode artifacts that already exist
    #[arg(long)]
    pub overwrite: bool,

    /// Reuse existing artifacts, even if a config file or the environment asks to overwrite
    #[arg(long, conflicts_with = "overwrite")]
    pub no_overwrite: bool,

    /// Seed for anchor sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Largest accepted distance between requested and decoded timestamps
    #[arg(long)]
    pub tolerance_s: Option<f64>,

    /// ffmpeg binary used for encoding and the ffmpeg decode backends
    #[arg(long = "ffmpeg")]
    pub ffmpeg_bin: Option<PathBuf>,

    /// Frame rate of datasets without a dataset.toml
    #[arg(long, value_parser = parse_fps)]
    pub default_fps: Option<u32>,
}

impl RunArgs {
    /// The command-line layer of the configuration hierarchy
    pub fn to_overrides(&self) -> SweepOverrides {
        SweepOverrides {
            output_dir: self.output_dir.clone(),
            data_root: self.data_root.clone(),
            datasets: self.datasets.clone(),
            codecs: self.codecs.clone(),
            pixel_formats: self.pixel_formats.clone(),
            keyframe_intervals: unwrap_params(&self.keyframe_intervals),
            compression_levels: unwrap_params(&self.compression_levels),
            baseline_keyframe_interval: self.baseline_keyframe_interval.map(|v| v.0),
            baseline_compression_level: self.baseline_compression_level.map(|v| v.0),
            timestamps_modes: self.timestamps_modes.clone(),
            backends: self.backends.clone(),
            num_samples: self.num_samples,
            num_workers: self.num_workers,
            save_frames: switch(self.save_frames, self.no_save_frames),
            overwrite: switch(self.overwrite, self.no_overwrite),
            seed: self.seed,
            tolerance_s: self.tolerance_s,
            ffmpeg_bin: self.ffmpeg_bin.clone(),
            default_fps: self.default_fps,
        }
    }
}

/// `--flag` / `--no-flag` pair; `None` when neither is given
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Dataset identifier (path under the data root)
    #[arg(short, long)]
    pub dataset: String,

    /// Directory dataset identifiers are resolved against
    #[arg(long)]
    pub data_root: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the merge command
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Result tables to concatenate, in order
    #[arg(short, long, num_args = 1.., required = true)]
    pub inputs: Vec<PathBuf>,

    /// Destination table
    #[arg(short, long)]
    pub output: PathBuf,
}

/// Arguments for the backends command
#[derive(Args, Debug)]
pub struct BackendsArgs {
    /// ffmpeg binary used by the ffmpeg backends
    #[arg(long = "ffmpeg")]
    pub ffmpeg_bin: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
