// Domain rules - Sweep policies: enumeration, codec support, sampling, matching

use std::path::{Path, PathBuf};

use rand::Rng;

use crate::domain::errors::*;
use crate::domain::model::*;

/// Largest compression level accepted anywhere in a sweep
pub const MAX_COMPRESSION_LEVEL: u32 = 56;

/// Restrictions a codec places on the rest of the sweep
#[derive(Debug, Clone, PartialEq)]
pub struct CodecSupport {
    /// Allowed pixel formats, `None` when any is fine
    pub pixel_formats: Option<&'static [&'static str]>,
    /// Allowed decode backends, `None` when any is fine
    pub backends: Option<&'static [&'static str]>,
    pub max_compression_level: u32,
}

impl CodecSupport {
    /// Look up the restrictions for an encoder name
    pub fn for_codec(codec: &str) -> Self {
        match codec {
            // AV1 encoders are only exercised on the subsampled format and a seeking decoder
            "libsvtav1" | "libaom-av1" => Self {
                pixel_formats: Some(&["yuv420p"]),
                backends: Some(&["ffmpeg-seek"]),
                max_compression_level: 63,
            },
            "libx264" | "libx265" => Self {
                pixel_formats: None,
                backends: None,
                max_compression_level: 51,
            },
            _ => Self::unrestricted(),
        }
    }

    pub fn unrestricted() -> Self {
        Self {
            pixel_formats: None,
            backends: None,
            max_compression_level: MAX_COMPRESSION_LEVEL,
        }
    }

    pub fn supports_pixel_format(&self, pixel_format: &str) -> bool {
        self.pixel_formats
            .map(|allowed| allowed.contains(&pixel_format))
            .unwrap_or(true)
    }

    pub fn supports_backend(&self, backend: &str) -> bool {
        self.backends
            .map(|allowed| allowed.contains(&backend))
            .unwrap_or(true)
    }

    pub fn supports_compression_level(&self, level: Option<u32>) -> bool {
        level
            .map(|crf| crf <= self.max_compression_level.min(MAX_COMPRESSION_LEVEL))
            .unwrap_or(true)
    }

    /// Reject a (codec, backend) pair the codec cannot be decoded with
    pub fn check_backend(codec: &str, backend: &str) -> Result<(), DomainError> {
        if Self::for_codec(codec).supports_backend(backend) {
            Ok(())
        } else {
            Err(DomainError::UnsupportedCombination(format!(
                "codec {} is not benchmarked with backend {}",
                codec, backend
            )))
        }
    }
}

/// The encoding parameter grid of a sweep
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingGrid {
    pub codecs: Vec<String>,
    pub pixel_formats: Vec<String>,
    pub keyframe_intervals: Vec<Option<u32>>,
    pub compression_levels: Vec<Option<u32>>,
    pub baseline_keyframe_interval: Option<u32>,
    pub baseline_compression_level: Option<u32>,
}

/// A spec (or whole pair) dropped during enumeration
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredSpec {
    pub description: String,
    pub reason: DomainError,
}

/// Ordered specs to encode, plus what was filtered out on the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enumeration {
    pub specs: Vec<EncodingSpec>,
    pub filtered: Vec<FilteredSpec>,
}

impl Enumeration {
    fn extend(&mut self, other: Enumeration) {
        self.specs.extend(other.specs);
        self.filtered.extend(other.filtered);
    }
}

/// Produces the one-parameter-at-a-time encoding specs of a sweep
pub struct ParameterEnumerator;

impl ParameterEnumerator {
    /// Enumerate every dataset independently, in dataset order
    pub fn enumerate(datasets: &[String], grid: &EncodingGrid) -> Enumeration {
        let mut enumeration = Enumeration::default();
        for dataset_id in datasets {
            enumeration.extend(Self::enumerate_dataset(dataset_id, grid));
        }
        enumeration
    }

    /// Specs for one dataset: per (codec, pixel format), each g value at the
    /// baseline crf followed by each crf value at the baseline g
    pub fn enumerate_dataset(dataset_id: &str, grid: &EncodingGrid) -> Enumeration {
        let mut enumeration = Enumeration::default();

        for codec in &grid.codecs {
            let support = CodecSupport::for_codec(codec);

            for pixel_format in &grid.pixel_formats {
                if !support.supports_pixel_format(pixel_format) {
                    enumeration.filtered.push(FilteredSpec {
                        description: format!("{} [{}/{}]", dataset_id, codec, pixel_format),
                        reason: DomainError::UnsupportedCombination(format!(
                            "codec {} does not support pixel format {}",
                            codec, pixel_format
                        )),
                    });
                    continue;
                }

                let spec = |g: Option<u32>, crf: Option<u32>, varied| EncodingSpec {
                    dataset_id: dataset_id.to_string(),
                    codec: codec.clone(),
                    pixel_format: pixel_format.clone(),
                    keyframe_interval: g,
                    compression_level: crf,
                    varied,
                };

                let candidates = grid
                    .keyframe_intervals
                    .iter()
                    .map(|&g| {
                        spec(
                            g,
                            grid.baseline_compression_level,
                            VariedParameter::KeyframeInterval,
                        )
                    })
                    .chain(grid.compression_levels.iter().map(|&crf| {
                        spec(
                            grid.baseline_keyframe_interval,
                            crf,
                            VariedParameter::CompressionLevel,
                        )
                    }));

                let mut pair_specs: Vec<EncodingSpec> = Vec::new();
                for candidate in candidates {
                    if pair_specs.iter().any(|s| s.same_artifact(&candidate)) {
                        continue;
                    }
                    if !support.supports_compression_level(candidate.compression_level) {
                        enumeration.filtered.push(FilteredSpec {
                            description: candidate.to_string(),
                            reason: DomainError::UnsupportedCombination(format!(
                                "codec {} accepts compression levels up to {}",
                                codec,
                                support.max_compression_level.min(MAX_COMPRESSION_LEVEL)
                            )),
                        });
                        continue;
                    }
                    pair_specs.push(candidate);
                }
                enumeration.specs.extend(pair_specs);
            }
        }

        enumeration
    }
}

/// Draws anchors and derives the timestamp lists of a scenario
pub struct TimestampSampler;

impl TimestampSampler {
    /// Largest anchor that still leaves room for the scenario's span
    pub fn max_anchor(frame_count: usize, scenario: TimestampScenario) -> Result<usize, DomainError> {
        let span = scenario.span();
        if frame_count <= span {
            return Err(DomainError::UnsupportedCombination(format!(
                "scenario {} needs more than {} frames, dataset has {}",
                scenario, span, frame_count
            )));
        }
        Ok(frame_count - 1 - span)
    }

    /// Draw `count` independent samples, anchors uniform over the valid range
    pub fn draw<R: Rng + ?Sized>(
        rng: &mut R,
        dataset: &Dataset,
        scenario: TimestampScenario,
        count: usize,
    ) -> Result<Vec<Sample>, DomainError> {
        let max_anchor = Self::max_anchor(dataset.frame_count, scenario)?;
        Ok((0..count)
            .map(|index| {
                let anchor = rng.random_range(0..=max_anchor);
                Sample::derive(index, anchor, scenario, dataset.fps)
            })
            .collect())
    }
}

/// Deterministic on-disk locations derived from parameter values
pub struct ArtifactLayout;

impl ArtifactLayout {
    /// `<output>/videos/<codec>_<pix_fmt>_<g>_<crf>/<dataset>.mp4`
    pub fn video_path(output_dir: &Path, spec: &EncodingSpec) -> PathBuf {
        output_dir
            .join("videos")
            .join(spec.parameter_dir_name())
            .join(format!("{}.mp4", safe_component(&spec.dataset_id)))
    }

    /// Where decoded/original frame pairs of one decode run are saved
    pub fn saved_frames_dir(
        video_path: &Path,
        scenario: TimestampScenario,
        backend: &str,
    ) -> PathBuf {
        video_path
            .with_extension("")
            .join(format!("{}_{}", scenario, backend))
    }
}

/// Pairs requested timestamps with the decoded frames closest to them
pub struct FrameMatcher;

impl FrameMatcher {
    /// Pick one frame per requested timestamp, failing when the nearest
    /// presentation time is further away than `tolerance_s`
    pub fn select(
        requested: &[f64],
        decoded: Vec<DecodedFrame>,
        tolerance_s: f64,
    ) -> Result<Vec<Frame>, DomainError> {
        let mut selected = Vec::with_capacity(requested.len());

        for &timestamp in requested {
            let closest = decoded.iter().min_by(|a, b| {
                (a.pts - timestamp)
                    .abs()
                    .total_cmp(&(b.pts - timestamp).abs())
            });

            match closest {
                Some(candidate) if (candidate.pts - timestamp).abs() <= tolerance_s => {
                    selected.push(candidate.frame.clone());
                }
                Some(candidate) => {
                    return Err(DomainError::TimestampMismatch {
                        requested: timestamp,
                        closest: Some(candidate.pts),
                        tolerance: tolerance_s,
                    });
                }
                None => {
                    return Err(DomainError::TimestampMismatch {
                        requested: timestamp,
                        closest: None,
                        tolerance: tolerance_s,
                    });
                }
            }
        }

        Ok(selected)
    }
}
