// Domain models - Core types and data structures

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Spelling of an unset encoder parameter in paths and tables
pub const UNSET_PARAM: &str = "None";

/// Format an optional encoder parameter (`None` when unset)
pub fn format_param(value: Option<u32>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| UNSET_PARAM.to_string())
}

/// Parse an integer or the case-insensitive literal `none`
pub fn parse_param(value: &str) -> Result<Option<u32>, DomainError> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| DomainError::BadConfig(format!("Invalid int or None: {}", value)))
}

/// Turn an identifier that may contain `/` into a single path component
pub fn safe_component(id: &str) -> String {
    id.replace('/', "_")
}

/// Format a metric for a table cell; infinities are written as `inf`
pub fn format_metric(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value == f64::INFINITY {
        "inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        value.to_string()
    }
}

/// One episode of images, loaded once and never mutated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    /// Identifier as given on the command line (may contain `/`)
    pub id: String,
    /// Directory holding `frame_%06d.png`
    pub frames_dir: PathBuf,
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
    /// Nominal frame rate
    pub fps: u32,
}

impl Dataset {
    /// Create a dataset description with validation
    pub fn new(
        id: impl Into<String>,
        frames_dir: PathBuf,
        frame_count: usize,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Self, DomainError> {
        let id = id.into();
        if frame_count == 0 {
            return Err(DomainError::DatasetInvalid(format!("{}: no frames", id)));
        }
        if width == 0 || height == 0 {
            return Err(DomainError::DatasetInvalid(format!(
                "{}: frame dimensions cannot be zero",
                id
            )));
        }
        if fps == 0 {
            return Err(DomainError::DatasetInvalid(format!(
                "{}: frame rate must be positive",
                id
            )));
        }
        Ok(Self {
            id,
            frames_dir,
            frame_count,
            width,
            height,
            fps,
        })
    }

    /// File name of the frame at `index`
    pub fn frame_file_name(index: usize) -> String {
        format!("frame_{:06}.png", index)
    }

    /// Identifier usable as a single path component
    pub fn safe_id(&self) -> String {
        safe_component(&self.id)
    }

    /// Resolution as written in result tables, e.g. `96 x 96`
    pub fn resolution(&self) -> String {
        format!("{} x {}", self.width, self.height)
    }

    pub fn num_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Presentation time of frame `index` in seconds
    pub fn timestamp_of(&self, index: usize) -> f64 {
        index as f64 / self.fps as f64
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frame_count as f64 / self.fps as f64
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.frames_dir.join(Self::frame_file_name(index))
    }

    /// printf-style input pattern for image sequence encoders
    pub fn frame_pattern(&self) -> PathBuf {
        self.frames_dir.join("frame_%06d.png")
    }
}

/// Which parameter an encoding spec varies away from the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariedParameter {
    KeyframeInterval,
    CompressionLevel,
}

/// A (codec, pixel format) pair; results are tabled per combination
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Combination {
    pub codec: String,
    pub pixel_format: String,
}

impl Combination {
    pub fn new(codec: impl Into<String>, pixel_format: impl Into<String>) -> Self {
        Self {
            codec: codec.into(),
            pixel_format: pixel_format.into(),
        }
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.codec, self.pixel_format)
    }
}

/// Everything needed to produce exactly one artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EncodingSpec {
    pub dataset_id: String,
    pub codec: String,
    pub pixel_format: String,
    /// Keyframe interval (`g`), `None` leaves the encoder default
    pub keyframe_interval: Option<u32>,
    /// Compression level (`crf`), `None` leaves the encoder default
    pub compression_level: Option<u32>,
    pub varied: VariedParameter,
}

impl EncodingSpec {
    pub fn combination(&self) -> Combination {
        Combination::new(self.codec.clone(), self.pixel_format.clone())
    }

    /// Directory name shared by every artifact encoded with these parameters
    pub fn parameter_dir_name(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.codec,
            self.pixel_format,
            format_param(self.keyframe_interval),
            format_param(self.compression_level)
        )
    }

    /// Two specs naming the same artifact, whichever parameter they vary
    pub fn same_artifact(&self, other: &EncodingSpec) -> bool {
        self.dataset_id == other.dataset_id
            && self.codec == other.codec
            && self.pixel_format == other.pixel_format
            && self.keyframe_interval == other.keyframe_interval
            && self.compression_level == other.compression_level
    }
}

impl fmt::Display for EncodingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}/{} g={} crf={}]",
            self.dataset_id,
            self.codec,
            self.pixel_format,
            format_param(self.keyframe_interval),
            format_param(self.compression_level)
        )
    }
}

/// An encoded video file and the byte counts behind its compression ratio
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub spec: EncodingSpec,
    pub path: PathBuf,
    pub video_size_bytes: u64,
    pub images_size_bytes: u64,
    /// Left over from an earlier run instead of freshly encoded
    pub reused: bool,
}

impl Artifact {
    /// Video bytes divided by original image bytes
    pub fn compression_ratio(&self) -> f64 {
        self.video_size_bytes as f64 / self.images_size_bytes as f64
    }
}

/// Named frame access pattern simulating a policy's reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimestampScenario {
    #[serde(rename = "1_frame")]
    OneFrame,
    #[serde(rename = "2_frames")]
    TwoFrames,
    #[serde(rename = "2_frames_4_space")]
    TwoFramesFourSpace,
    #[serde(rename = "6_frames")]
    SixFrames,
}

impl TimestampScenario {
    pub const ALL: [TimestampScenario; 4] = [
        TimestampScenario::OneFrame,
        TimestampScenario::TwoFrames,
        TimestampScenario::TwoFramesFourSpace,
        TimestampScenario::SixFrames,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TimestampScenario::OneFrame => "1_frame",
            TimestampScenario::TwoFrames => "2_frames",
            TimestampScenario::TwoFramesFourSpace => "2_frames_4_space",
            TimestampScenario::SixFrames => "6_frames",
        }
    }

    /// Frame offsets relative to the anchor, ascending
    pub fn offsets(&self) -> &'static [usize] {
        match self {
            TimestampScenario::OneFrame => &[0],
            TimestampScenario::TwoFrames => &[0, 1],
            TimestampScenario::TwoFramesFourSpace => &[0, 5],
            TimestampScenario::SixFrames => &[0, 1, 2, 3, 4, 5],
        }
    }

    /// Distance in frames between the first and last requested frame
    pub fn span(&self) -> usize {
        self.offsets().last().copied().unwrap_or(0)
    }

    /// Number of frames requested per sample
    pub fn frame_count(&self) -> usize {
        self.offsets().len()
    }

    /// Whether the requested frames leave gaps a span decoder still has to fill
    pub fn is_spaced(&self) -> bool {
        self.span() + 1 > self.frame_count()
    }
}

impl FromStr for TimestampScenario {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|scenario| scenario.name() == trimmed)
            .ok_or_else(|| {
                DomainError::BadConfig(format!(
                    "Unknown timestamps mode: {}. Valid modes: 1_frame, 2_frames, 2_frames_4_space, 6_frames",
                    s
                ))
            })
    }
}

impl fmt::Display for TimestampScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One anchor and the concrete frames/timestamps derived from it
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Position of this sample within its batch
    pub index: usize,
    pub anchor: usize,
    pub frame_indices: Vec<usize>,
    pub timestamps: Vec<f64>,
}

impl Sample {
    /// Apply the scenario's spacing law to an anchor frame
    pub fn derive(index: usize, anchor: usize, scenario: TimestampScenario, fps: u32) -> Self {
        let frame_indices: Vec<usize> = scenario
            .offsets()
            .iter()
            .map(|offset| anchor + offset)
            .collect();
        let timestamps = frame_indices
            .iter()
            .map(|&frame| frame as f64 / fps as f64)
            .collect();
        Self {
            index,
            anchor,
            frame_indices,
            timestamps,
        }
    }

    pub fn anchor_timestamp(&self) -> f64 {
        self.timestamps.first().copied().unwrap_or(0.0)
    }
}

/// Interleaved 8-bit RGB image
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    /// Wrap raw RGB24 bytes, checking the buffer length
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, DomainError> {
        let expected = width as usize * height as usize * Self::CHANNELS;
        if data.len() != expected {
            return Err(DomainError::FrameMismatch(format!(
                "{}x{} RGB frame needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Frame where every pixel has the same color
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * Self::CHANNELS)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn sample_count(&self) -> usize {
        self.pixel_count() * Self::CHANNELS
    }

    pub fn same_shape(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height && self.data.len() == other.data.len()
    }
}

/// A frame handed back by a decoder together with its presentation time
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub pts: f64,
    pub frame: Frame,
}

/// What a decode backend can promise about random access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackendCapabilities {
    /// Lands on the requested frame without decoding from the stream start
    pub exact_seek: bool,
    /// Decodes only the requested frames instead of the span between them
    pub sparse_decode: bool,
}

/// Identifies one (artifact, scenario, backend) decode run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunKey {
    pub dataset_id: String,
    pub codec: String,
    pub pixel_format: String,
    pub keyframe_interval: Option<u32>,
    pub compression_level: Option<u32>,
    pub scenario: TimestampScenario,
    pub backend: String,
}

impl RunKey {
    pub fn new(spec: &EncodingSpec, scenario: TimestampScenario, backend: &str) -> Self {
        Self {
            dataset_id: spec.dataset_id.clone(),
            codec: spec.codec.clone(),
            pixel_format: spec.pixel_format.clone(),
            keyframe_interval: spec.keyframe_interval,
            compression_level: spec.compression_level,
            scenario,
            backend: backend.to_string(),
        }
    }

    pub fn combination(&self) -> Combination {
        Combination::new(self.codec.clone(), self.pixel_format.clone())
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{} g={} crf={} {} {}",
            self.dataset_id,
            self.codec,
            self.pixel_format,
            format_param(self.keyframe_interval),
            format_param(self.compression_level),
            self.scenario,
            self.backend
        )
    }
}

/// One scored sample: a row of the result tables
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub dataset_id: String,
    pub resolution: String,
    pub num_pixels: u64,
    pub codec: String,
    pub pixel_format: String,
    pub keyframe_interval: Option<u32>,
    pub compression_level: Option<u32>,
    pub video_size_bytes: u64,
    pub images_size_bytes: u64,
    pub compression_ratio: f64,
    pub scenario: TimestampScenario,
    pub backend: String,
    pub sample_index: usize,
    pub anchor_timestamp: f64,
    /// Decode time per requested frame
    pub load_time_video_ms: f64,
    /// Original image load time per requested frame
    pub load_time_images_ms: f64,
    pub load_time_ratio: f64,
    pub mse: f64,
    pub psnr: f64,
    pub ssim: f64,
}

impl MetricRecord {
    pub const COLUMNS: [&'static str; 20] = [
        "dataset_id",
        "resolution",
        "num_pixels",
        "codec",
        "pixel_format",
        "keyframe_interval",
        "compression_level",
        "video_size_bytes",
        "images_size_bytes",
        "compression_ratio",
        "scenario",
        "backend",
        "sample_index",
        "anchor_timestamp",
        "load_time_video_ms",
        "load_time_images_ms",
        "load_time_ratio",
        "mse",
        "psnr",
        "ssim",
    ];

    /// Cells in `COLUMNS` order
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.dataset_id.clone(),
            self.resolution.clone(),
            self.num_pixels.to_string(),
            self.codec.clone(),
            self.pixel_format.clone(),
            format_param(self.keyframe_interval),
            format_param(self.compression_level),
            self.video_size_bytes.to_string(),
            self.images_size_bytes.to_string(),
            format_metric(self.compression_ratio),
            self.scenario.to_string(),
            self.backend.clone(),
            self.sample_index.to_string(),
            format_metric(self.anchor_timestamp),
            format_metric(self.load_time_video_ms),
            format_metric(self.load_time_images_ms),
            format_metric(self.load_time_ratio),
            format_metric(self.mse),
            format_metric(self.psnr),
            format_metric(self.ssim),
        ]
    }

    pub fn combination(&self) -> Combination {
        Combination::new(self.codec.clone(), self.pixel_format.clone())
    }

    pub fn run_key(&self) -> RunKey {
        RunKey {
            dataset_id: self.dataset_id.clone(),
            codec: self.codec.clone(),
            pixel_format: self.pixel_format.clone(),
            keyframe_interval: self.keyframe_interval,
            compression_level: self.compression_level,
            scenario: self.scenario,
            backend: self.backend.clone(),
        }
    }
}

/// A sample that produced no record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleFailure {
    #[serde(skip)]
    pub key: RunKey,
    pub run: String,
    pub sample_index: usize,
    pub error: String,
}

impl SampleFailure {
    pub fn new(key: RunKey, sample_index: usize, error: impl Into<String>) -> Self {
        Self {
            run: key.to_string(),
            key,
            sample_index,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests;
