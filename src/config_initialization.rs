//! Configuration initialization and hierarchy management
//!
//! Precedence, lowest to highest: built-in defaults, config file,
//! environment variables, command-line flags. The result is validated once
//! and then shared read-only.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::adapters::toml_config::{resolve_entries, ParamEntry, SweepFileConfig};
use crate::domain::errors::DomainError;
use crate::domain::model::{parse_param, TimestampScenario};
use crate::domain::rules::{EncodingGrid, MAX_COMPRESSION_LEVEL};
use crate::error::{BenchError, BenchResult};

pub const ENV_OUTPUT_DIR: &str = "VBENCH_OUTPUT_DIR";
pub const ENV_DATA_ROOT: &str = "VBENCH_DATA_ROOT";
pub const ENV_NUM_WORKERS: &str = "VBENCH_NUM_WORKERS";
pub const ENV_NUM_SAMPLES: &str = "VBENCH_NUM_SAMPLES";
pub const ENV_FFMPEG: &str = "VBENCH_FFMPEG";
pub const ENV_SEED: &str = "VBENCH_SEED";

/// Immutable configuration of one sweep
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub output_dir: PathBuf,
    pub data_root: PathBuf,
    pub datasets: Vec<String>,
    pub grid: EncodingGrid,
    pub scenarios: Vec<TimestampScenario>,
    pub backends: Vec<String>,
    pub num_samples: usize,
    pub num_workers: usize,
    pub save_frames: bool,
    pub overwrite: bool,
    pub seed: u64,
    pub tolerance_s: f64,
    pub ffmpeg_bin: PathBuf,
    /// Frame rate of datasets without a manifest
    pub default_fps: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs/video_benchmark"),
            data_root: PathBuf::from("data"),
            datasets: vec![
                "lerobot/pusht_image".to_string(),
                "aliberts/aloha_mobile_shrimp_image".to_string(),
                "aliberts/paris_street".to_string(),
                "aliberts/kitchen".to_string(),
            ],
            grid: EncodingGrid {
                codecs: vec!["libx264".to_string()],
                pixel_formats: vec!["yuv444p".to_string(), "yuv420p".to_string()],
                keyframe_intervals: [1, 2, 3, 4, 5, 6, 10, 15, 20, 40, 100]
                    .iter()
                    .map(|&g| Some(g))
                    .chain(std::iter::once(None))
                    .collect(),
                compression_levels: [0, 5, 10, 15, 20, 25, 30, 40, 50]
                    .iter()
                    .map(|&crf| Some(crf))
                    .chain(std::iter::once(None))
                    .collect(),
                baseline_keyframe_interval: Some(2),
                baseline_compression_level: None,
            },
            scenarios: TimestampScenario::ALL.to_vec(),
            backends: vec!["ffmpeg-seek".to_string(), "ffmpeg-scan".to_string()],
            num_samples: 50,
            num_workers: 10,
            save_frames: false,
            overwrite: false,
            seed: 1337,
            tolerance_s: 1e-4,
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            default_fps: 30,
        }
    }
}

/// One override layer (environment or command line); `None` leaves a key alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepOverrides {
    pub output_dir: Option<PathBuf>,
    pub data_root: Option<PathBuf>,
    pub datasets: Option<Vec<String>>,
    pub codecs: Option<Vec<String>>,
    pub pixel_formats: Option<Vec<String>>,
    pub keyframe_intervals: Option<Vec<Option<u32>>>,
    pub compression_levels: Option<Vec<Option<u32>>>,
    pub baseline_keyframe_interval: Option<Option<u32>>,
    pub baseline_compression_level: Option<Option<u32>>,
    pub timestamps_modes: Option<Vec<String>>,
    pub backends: Option<Vec<String>>,
    pub num_samples: Option<usize>,
    pub num_workers: Option<usize>,
    pub save_frames: Option<bool>,
    pub overwrite: Option<bool>,
    pub seed: Option<u64>,
    pub tolerance_s: Option<f64>,
    pub ffmpeg_bin: Option<PathBuf>,
    pub default_fps: Option<u32>,
}

impl SweepOverrides {
    /// Read the `VBENCH_*` variables through `lookup`
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> BenchResult<Self> {
        fn number<T: FromStr>(name: &str, value: Option<String>) -> BenchResult<Option<T>> {
            value
                .map(|v| {
                    v.trim().parse::<T>().map_err(|_| {
                        BenchError::config(format!("{} must be a non-negative integer, got {:?}", name, v))
                    })
                })
                .transpose()
        }

        Ok(Self {
            output_dir: lookup(ENV_OUTPUT_DIR).map(PathBuf::from),
            data_root: lookup(ENV_DATA_ROOT).map(PathBuf::from),
            num_workers: number(ENV_NUM_WORKERS, lookup(ENV_NUM_WORKERS))?,
            num_samples: number(ENV_NUM_SAMPLES, lookup(ENV_NUM_SAMPLES))?,
            ffmpeg_bin: lookup(ENV_FFMPEG).map(PathBuf::from),
            seed: number(ENV_SEED, lookup(ENV_SEED))?,
            ..Self::default()
        })
    }

    fn count(&self) -> usize {
        [
            self.output_dir.is_some(),
            self.data_root.is_some(),
            self.datasets.is_some(),
            self.codecs.is_some(),
            self.pixel_formats.is_some(),
            self.keyframe_intervals.is_some(),
            self.compression_levels.is_some(),
            self.baseline_keyframe_interval.is_some(),
            self.baseline_compression_level.is_some(),
            self.timestamps_modes.is_some(),
            self.backends.is_some(),
            self.num_samples.is_some(),
            self.num_workers.is_some(),
            self.save_frames.is_some(),
            self.overwrite.is_some(),
            self.seed.is_some(),
            self.tolerance_s.is_some(),
            self.ffmpeg_bin.is_some(),
            self.default_fps.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

fn parse_scenarios(names: &[String]) -> Result<Vec<TimestampScenario>, DomainError> {
    names.iter().map(|name| name.parse()).collect()
}

impl SweepConfig {
    /// Merge a config file layer
    pub fn apply_file(&mut self, file: SweepFileConfig) -> BenchResult<()> {
        let baseline = |entry: Option<ParamEntry>| {
            entry.map(|e| e.resolve()).transpose()
        };

        let overrides = SweepOverrides {
            output_dir: file.output_dir,
            data_root: file.data_root,
            datasets: file.datasets,
            codecs: file.codecs,
            pixel_formats: file.pixel_formats,
            keyframe_intervals: file
                .keyframe_intervals
                .as_deref()
                .map(resolve_entries)
                .transpose()?,
            compression_levels: file
                .compression_levels
                .as_deref()
                .map(resolve_entries)
                .transpose()?,
            baseline_keyframe_interval: baseline(file.baseline_keyframe_interval)?,
            baseline_compression_level: baseline(file.baseline_compression_level)?,
            timestamps_modes: file.timestamps_modes,
            backends: file.backends,
            num_samples: file.num_samples,
            num_workers: file.num_workers,
            save_frames: file.save_frames,
            overwrite: file.overwrite,
            seed: file.seed,
            tolerance_s: file.tolerance_s,
            ffmpeg_bin: file.ffmpeg_bin,
            default_fps: file.default_fps,
        };
        self.apply(overrides)
    }

    /// Merge an override layer
    pub fn apply(&mut self, overrides: SweepOverrides) -> BenchResult<()> {
        if let Some(v) = overrides.output_dir {
            self.output_dir = v;
        }
        if let Some(v) = overrides.data_root {
            self.data_root = v;
        }
        if let Some(v) = overrides.datasets {
            self.datasets = v;
        }
        if let Some(v) = overrides.codecs {
            self.grid.codecs = v;
        }
        if let Some(v) = overrides.pixel_formats {
            self.grid.pixel_formats = v;
        }
        if let Some(v) = overrides.keyframe_intervals {
            self.grid.keyframe_intervals = v;
        }
        if let Some(v) = overrides.compression_levels {
            self.grid.compression_levels = v;
        }
        if let Some(v) = overrides.baseline_keyframe_interval {
            self.grid.baseline_keyframe_interval = v;
        }
        if let Some(v) = overrides.baseline_compression_level {
            self.grid.baseline_compression_level = v;
        }
        if let Some(names) = overrides.timestamps_modes {
            self.scenarios = parse_scenarios(&names)?;
        }
        if let Some(v) = overrides.backends {
            self.backends = v;
        }
        if let Some(v) = overrides.num_samples {
            self.num_samples = v;
        }
        if let Some(v) = overrides.num_workers {
            self.num_workers = v;
        }
        if let Some(v) = overrides.save_frames {
            self.save_frames = v;
        }
        if let Some(v) = overrides.overwrite {
            self.overwrite = v;
        }
        if let Some(v) = overrides.seed {
            self.seed = v;
        }
        if let Some(v) = overrides.tolerance_s {
            self.tolerance_s = v;
        }
        if let Some(v) = overrides.ffmpeg_bin {
            self.ffmpeg_bin = v;
        }
        if let Some(v) = overrides.default_fps {
            self.default_fps = v;
        }
        Ok(())
    }

    /// Reject empty or contradictory settings before any work starts
    pub fn validate(&self) -> Result<(), DomainError> {
        let bad = |msg: &str| Err(DomainError::BadConfig(msg.to_string()));

        if self.datasets.is_empty() {
            return bad("no datasets to benchmark");
        }
        if self.grid.codecs.is_empty() {
            return bad("no codecs to benchmark");
        }
        if self.grid.pixel_formats.is_empty() {
            return bad("no pixel formats to benchmark");
        }
        if self.grid.keyframe_intervals.is_empty() && self.grid.compression_levels.is_empty() {
            return bad("both the keyframe interval and compression level lists are empty");
        }
        if self.scenarios.is_empty() {
            return bad("no timestamp scenarios to benchmark");
        }
        if self.backends.is_empty() {
            return bad("no decode backends to benchmark");
        }
        if self.num_samples == 0 {
            return bad("num_samples must be at least 1");
        }
        if self.num_workers == 0 {
            return bad("num_workers must be at least 1");
        }
        if self.default_fps == 0 {
            return bad("default_fps must be positive");
        }
        if !self.tolerance_s.is_finite() || self.tolerance_s <= 0.0 {
            return bad("tolerance_s must be a positive number of seconds");
        }

        let keyframe_intervals = self
            .grid
            .keyframe_intervals
            .iter()
            .chain(std::iter::once(&self.grid.baseline_keyframe_interval));
        if keyframe_intervals.flatten().any(|&g| g == 0) {
            return bad("keyframe interval (g) must be at least 1");
        }

        let compression_levels = self
            .grid
            .compression_levels
            .iter()
            .chain(std::iter::once(&self.grid.baseline_compression_level));
        if let Some(crf) = compression_levels
            .flatten()
            .find(|&&crf| crf > MAX_COMPRESSION_LEVEL)
        {
            return Err(DomainError::BadConfig(format!(
                "compression level (crf) {} is outside 0..={}",
                crf, MAX_COMPRESSION_LEVEL
            )));
        }

        Ok(())
    }
}

/// Build the configuration: defaults < file < environment < command line
pub fn initialize_configuration_hierarchy(
    file: Option<SweepFileConfig>,
    env: SweepOverrides,
    cli: SweepOverrides,
) -> BenchResult<Arc<SweepConfig>> {
    let mut config = SweepConfig::default();

    if let Some(file) = file {
        config.apply_file(file)?;
        debug!("Applied config file layer");
    }

    let env_count = env.count();
    config.apply(env)?;
    if env_count > 0 {
        info!("Applied {} environment variable overrides", env_count);
    }

    let cli_count = cli.count();
    config.apply(cli)?;
    if cli_count > 0 {
        debug!("Applied {} command-line overrides", cli_count);
    }

    config.validate()?;
    Ok(Arc::new(config))
}

/// Parse `none` or an integer for command-line parameter lists
pub fn parse_int_or_none(value: &str) -> Result<Option<u32>, String> {
    parse_param(value).map_err(|e| e.to_string())
}
