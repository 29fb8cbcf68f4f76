// Config file adapter - Sweep configuration from TOML or YAML files

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::domain::errors::DomainError;
use crate::domain::model::parse_param;
use crate::error::{BenchError, BenchResult};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "vbench.toml";

/// A g/crf entry: an integer or the string `"none"`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamEntry {
    Int(u32),
    Text(String),
}

impl ParamEntry {
    pub fn resolve(&self) -> Result<Option<u32>, DomainError> {
        match self {
            ParamEntry::Int(value) => Ok(Some(*value)),
            ParamEntry::Text(text) => parse_param(text),
        }
    }
}

/// Resolve a list of entries, failing on the first bad one
pub fn resolve_entries(entries: &[ParamEntry]) -> Result<Vec<Option<u32>>, DomainError> {
    entries.iter().map(ParamEntry::resolve).collect()
}

/// Contents of the `[sweep]` table; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepFileConfig {
    pub output_dir: Option<PathBuf>,
    pub data_root: Option<PathBuf>,
    pub datasets: Option<Vec<String>>,
    pub codecs: Option<Vec<String>>,
    pub pixel_formats: Option<Vec<String>>,
    pub keyframe_intervals: Option<Vec<ParamEntry>>,
    pub compression_levels: Option<Vec<ParamEntry>>,
    pub baseline_keyframe_interval: Option<ParamEntry>,
    pub baseline_compression_level: Option<ParamEntry>,
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

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    sweep: SweepFileConfig,
}

impl SweepFileConfig {
    /// Load a config file, choosing YAML for `.yaml`/`.yml` and TOML otherwise
    pub fn load(path: &Path) -> BenchResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BenchError::config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        debug!("Loading configuration from {}", path.display());

        let is_yaml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        if is_yaml {
            Self::from_yaml_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn from_toml_str(content: &str) -> BenchResult<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.sweep)
    }

    pub fn from_yaml_str(content: &str) -> BenchResult<Self> {
        let file: ConfigFile = serde_yaml::from_str(content)?;
        Ok(file.sweep)
    }

    /// `--config` when given, else `vbench.toml` in the working directory if present
    pub fn discover(explicit: Option<&Path>) -> BenchResult<Option<Self>> {
        match explicit {
            Some(path) => Self::load(path).map(Some),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::load(default).map(Some)
                } else {
                    Ok(None)
                }
            }
        }
    }
}
