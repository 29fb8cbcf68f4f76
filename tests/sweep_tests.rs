use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use vbench_cli::adapters::{DecoderRegistry, ImageDatasetAdapter};
use vbench_cli::app::SweepInteractor;
use vbench_cli::config_initialization::SweepConfig;
use vbench_cli::domain::errors::DomainError;
use vbench_cli::domain::model::*;
use vbench_cli::domain::rules::{ArtifactLayout, EncodingGrid};
use vbench_cli::engine::{SampleJob, SampleScorer};
use vbench_cli::output::{TableWriter, FAILED_SAMPLES_COLUMN};
use vbench_cli::ports::*;

const CODEC: &str = "reference-codec";
const PIXEL_FORMAT: &str = "reference-format";

/// Lossless "codec": a text header followed by the raw RGB24 frames
struct ReferenceEncoder;

#[async_trait]
impl EncodePort for ReferenceEncoder {
    fn name(&self) -> &str {
        CODEC
    }

    async fn encode(&self, job: &EncodeJob) -> Result<(), DomainError> {
        let frames_dir = job.frame_pattern.parent().unwrap();
        let mut body = Vec::new();
        let mut size = (0, 0);
        for index in 0..job.frame_count {
            let image = image::open(frames_dir.join(Dataset::frame_file_name(index)))
                .unwrap()
                .to_rgb8();
            size = image.dimensions();
            body.extend(image.into_raw());
        }

        let mut bytes = format!("REF {} {} {} {}\n", size.0, size.1, job.fps, job.frame_count).into_bytes();
        bytes.extend(body);
        fs::create_dir_all(job.output.parent().unwrap()).unwrap();
        fs::write(&job.output, bytes).map_err(|e| DomainError::FsFail(e.to_string()))
    }
}

/// Encoder whose process always "exits" non-zero
struct BrokenEncoder;

#[async_trait]
impl EncodePort for BrokenEncoder {
    fn name(&self) -> &str {
        "broken"
    }

    async fn encode(&self, job: &EncodeJob) -> Result<(), DomainError> {
        Err(DomainError::EncoderFailed {
            command: format!("broken {}", job.output.display()),
            code: Some(1),
            stderr: "unknown encoder".to_string(),
        })
    }
}

/// Decodes reference-codec files; optionally panics on one call
struct ReferenceDecoder {
    calls: AtomicUsize,
    panic_on_call: Option<usize>,
}

impl ReferenceDecoder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            panic_on_call: None,
        }
    }

    fn panicking_on(call: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            panic_on_call: Some(call),
        }
    }
}

impl DecodePort for ReferenceDecoder {
    fn backend(&self) -> &str {
        "reference"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            exact_seek: true,
            sparse_decode: true,
        }
    }

    fn decode(
        &self,
        video: &Path,
        timestamps: &[f64],
        _tolerance_s: f64,
    ) -> Result<Vec<DecodedFrame>, DomainError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if Some(call) == self.panic_on_call {
            panic!("injected decoder fault");
        }

        let bytes = fs::read(video).map_err(|e| DomainError::DecodeFailed(e.to_string()))?;
        let newline = bytes.iter().position(|&b| b == b'\n').unwrap();
        let header: Vec<u32> = std::str::from_utf8(&bytes[..newline])
            .unwrap()
            .split_whitespace()
            .skip(1)
            .map(|v| v.parse().unwrap())
            .collect();
        let (width, height, fps, count) = (header[0], header[1], header[2], header[3] as usize);
        let frame_len = (width * height * 3) as usize;
        let body = &bytes[newline + 1..];

        timestamps
            .iter()
            .map(|&t| {
                let index = (t * fps as f64).round() as usize;
                if index >= count {
                    return Err(DomainError::DecodeFailed(format!("no frame at {}", t)));
                }
                let data = body[index * frame_len..(index + 1) * frame_len].to_vec();
                Ok(DecodedFrame {
                    pts: index as f64 / fps as f64,
                    frame: Frame::new(width, height, data)?,
                })
            })
            .collect()
    }
}

fn write_dataset(root: &Path, id: &str, frames: usize, fps: u32) -> PathBuf {
    let dir = root.join(id);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("dataset.toml"), format!("fps = {}\n", fps)).unwrap();
    for index in 0..frames {
        let image = image::RgbImage::from_fn(16, 12, |x, y| {
            image::Rgb([
                ((x * 16 + index as u32 * 7) % 256) as u8,
                ((y * 20) % 256) as u8,
                ((index * 25) % 256) as u8,
            ])
        });
        image.save(dir.join(Dataset::frame_file_name(index))).unwrap();
    }
    dir
}

fn reference_config(root: &Path, datasets: &[&str]) -> SweepConfig {
    SweepConfig {
        output_dir: root.join("out"),
        data_root: root.join("data"),
        datasets: datasets.iter().map(|d| d.to_string()).collect(),
        grid: EncodingGrid {
            codecs: vec![CODEC.to_string()],
            pixel_formats: vec![PIXEL_FORMAT.to_string()],
            keyframe_intervals: vec![Some(2)],
            compression_levels: vec![Some(0)],
            baseline_keyframe_interval: Some(2),
            baseline_compression_level: Some(0),
        },
        scenarios: vec![TimestampScenario::TwoFrames],
        backends: vec!["reference".to_string()],
        num_samples: 4,
        num_workers: 2,
        ..SweepConfig::default()
    }
}

fn interactor(config: SweepConfig, encoder: Arc<dyn EncodePort>, decoder: ReferenceDecoder) -> SweepInteractor {
    let datasets = Arc::new(ImageDatasetAdapter::new(&config.data_root, 30));
    let mut registry = DecoderRegistry::new();
    registry.register(Arc::new(decoder));
    SweepInteractor::new(Arc::new(config), encoder, datasets, registry)
}

#[test]
fn test_two_frames_at_point_three_seconds_decode_losslessly() {
    let root = TempDir::new().unwrap();
    write_dataset(&root.path().join("data"), "lab/ten", 10, 10);
    let datasets: Arc<dyn DatasetPort> = Arc::new(ImageDatasetAdapter::new(root.path().join("data"), 30));
    let dataset = Arc::new(datasets.load_dataset("lab/ten").unwrap());

    let spec = EncodingSpec {
        dataset_id: dataset.id.clone(),
        codec: CODEC.to_string(),
        pixel_format: PIXEL_FORMAT.to_string(),
        keyframe_interval: Some(2),
        compression_level: Some(0),
        varied: VariedParameter::KeyframeInterval,
    };
    let path = ArtifactLayout::video_path(&root.path().join("out"), &spec);
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime
        .block_on(ReferenceEncoder.encode(&EncodeJob {
            spec: spec.clone(),
            frame_pattern: dataset.frame_pattern(),
            frame_count: dataset.frame_count,
            fps: dataset.fps,
            output: path.clone(),
        }))
        .unwrap();

    let sample = Sample::derive(0, 3, TimestampScenario::TwoFrames, dataset.fps);
    assert_eq!(sample.frame_indices, vec![3, 4]);
    assert!((sample.timestamps[0] - 0.3).abs() < 1e-12);
    assert!((sample.timestamps[1] - 0.4).abs() < 1e-12);

    let artifact = Arc::new(Artifact {
        spec,
        video_size_bytes: fs::metadata(&path).unwrap().len(),
        images_size_bytes: datasets.images_size_bytes(&dataset).unwrap(),
        path,
        reused: false,
    });
    let scorer = SampleScorer::new(Arc::new(ReferenceDecoder::new()), Arc::clone(&datasets), 1e-4);
    let record = scorer
        .score(&SampleJob {
            artifact,
            dataset,
            scenario: TimestampScenario::TwoFrames,
            backend: "reference".to_string(),
            sample,
            save_frames_dir: None,
        })
        .unwrap();

    assert!(record.mse < 1e-12);
    assert_eq!(record.psnr, f64::INFINITY);
    assert!((record.ssim - 1.0).abs() < 1e-9);
    assert!((record.anchor_timestamp - 0.3).abs() < 1e-12);
}

#[test]
fn test_unwritable_save_dir_keeps_the_scored_sample() {
    let root = TempDir::new().unwrap();
    write_dataset(&root.path().join("data"), "lab/ten", 10, 10);
    let datasets: Arc<dyn DatasetPort> = Arc::new(ImageDatasetAdapter::new(root.path().join("data"), 30));
    let dataset = Arc::new(datasets.load_dataset("lab/ten").unwrap());

    let spec = EncodingSpec {
        dataset_id: dataset.id.clone(),
        codec: CODEC.to_string(),
        pixel_format: PIXEL_FORMAT.to_string(),
        keyframe_interval: Some(2),
        compression_level: Some(0),
        varied: VariedParameter::KeyframeInterval,
    };
    let path = ArtifactLayout::video_path(&root.path().join("out"), &spec);
    tokio::runtime::Runtime::new()
        .unwrap()
        .block_on(ReferenceEncoder.encode(&EncodeJob {
            spec: spec.clone(),
            frame_pattern: dataset.frame_pattern(),
            frame_count: dataset.frame_count,
            fps: dataset.fps,
            output: path.clone(),
        }))
        .unwrap();

    // A regular file where the frames directory should go
    let blocker = root.path().join("blocker");
    fs::write(&blocker, "").unwrap();

    let artifact = Arc::new(Artifact {
        spec,
        video_size_bytes: fs::metadata(&path).unwrap().len(),
        images_size_bytes: datasets.images_size_bytes(&dataset).unwrap(),
        path,
        reused: false,
    });
    let scorer = SampleScorer::new(Arc::new(ReferenceDecoder::new()), Arc::clone(&datasets), 1e-4);
    let record = scorer
        .score(&SampleJob {
            artifact,
            dataset: Arc::clone(&dataset),
            scenario: TimestampScenario::TwoFrames,
            backend: "reference".to_string(),
            sample: Sample::derive(0, 5, TimestampScenario::TwoFrames, dataset.fps),
            save_frames_dir: Some(blocker.join("frames")),
        })
        .unwrap();

    assert!(record.mse < 1e-12);
    assert!(blocker.is_file());
}

#[tokio::test]
async fn test_sweep_end_to_end() {
    let root = TempDir::new().unwrap();
    write_dataset(&root.path().join("data"), "lab/ten", 10, 10);
    let config = reference_config(root.path(), &["lab/ten"]);
    let output_dir = config.output_dir.clone();

    let report = interactor(config, Arc::new(ReferenceEncoder), ReferenceDecoder::new())
        .execute()
        .await
        .unwrap();

    let counters = &report.counters;
    assert_eq!(counters.datasets_loaded, 1);
    // g=2/crf=0 and crf=0/g=2 name the same artifact
    assert_eq!(counters.specs_attempted, 1);
    assert_eq!(counters.specs_encoded, 1);
    assert_eq!(counters.decode_runs, 1);
    assert_eq!(counters.samples_scored, 4);
    assert_eq!(counters.sample_failures, 0);

    let table_path = output_dir.join("tables").join("reference-codec_reference-format.csv");
    assert_eq!(report.paths.combination_tables, vec![table_path.clone()]);
    let table = TableWriter::read(&table_path).unwrap();
    assert_eq!(table.len(), 4);
    assert_eq!(table.columns, MetricRecord::COLUMNS.to_vec());

    // The compression ratio is the plain byte-count ratio
    let video_bytes: f64 = table.cell(0, "video_size_bytes").unwrap().parse().unwrap();
    let image_bytes: f64 = table.cell(0, "images_size_bytes").unwrap().parse().unwrap();
    let ratio: f64 = table.cell(0, "compression_ratio").unwrap().parse().unwrap();
    assert_eq!(ratio, video_bytes / image_bytes);
    // dataset.toml sits beside the frames and is not part of the image set
    let frames_dir = root.path().join("data").join("lab/ten");
    let png_bytes: u64 = (0..10)
        .map(|i| fs::metadata(frames_dir.join(Dataset::frame_file_name(i))).unwrap().len())
        .sum();
    assert_eq!(image_bytes, png_bytes as f64);
    for row in 0..table.len() {
        assert_eq!(table.cell(row, "mse"), Some("0"));
        assert_eq!(table.cell(row, "psnr"), Some("inf"));
        assert_eq!(table.cell(row, "keyframe_interval"), Some("2"));
    }

    let final_path = report.paths.final_table.clone().unwrap();
    assert!(final_path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .ends_with("_4-samples.csv"));
    assert_eq!(TableWriter::read(&final_path).unwrap().len(), 4);

    assert_eq!(report.summary.len(), 1);
    assert_eq!(report.summary.cell(0, "samples"), Some("4"));
    assert_eq!(report.summary.cell(0, FAILED_SAMPLES_COLUMN), Some("0"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(report.paths.report.unwrap()).unwrap()).unwrap();
    assert_eq!(json["counters"]["samples_scored"], 4);
    assert_eq!(json["backends"]["reference"]["sparse_decode"], true);
}

#[tokio::test]
async fn test_second_run_reuses_artifacts_and_appends() {
    let root = TempDir::new().unwrap();
    write_dataset(&root.path().join("data"), "lab/ten", 10, 10);
    let config = reference_config(root.path(), &["lab/ten"]);

    let first = interactor(config.clone(), Arc::new(ReferenceEncoder), ReferenceDecoder::new())
        .execute()
        .await
        .unwrap();
    let artifact = config.output_dir.join("videos/reference-codec_reference-format_2_0/lab_ten.mp4");
    let first_bytes = fs::read(&artifact).unwrap();

    let second = interactor(config.clone(), Arc::new(BrokenEncoder), ReferenceDecoder::new())
        .execute()
        .await
        .unwrap();
    assert_eq!(second.counters.specs_reused, 1);
    assert_eq!(second.counters.specs_encoded, 0);
    assert_eq!(fs::read(&artifact).unwrap(), first_bytes);

    // Same seed, same anchors
    let table = TableWriter::read(&first.paths.combination_tables[0]).unwrap();
    assert_eq!(table.len(), 8);
    for row in 0..4 {
        assert_eq!(
            table.cell(row, "anchor_timestamp"),
            table.cell(row + 4, "anchor_timestamp")
        );
    }
}

#[tokio::test]
async fn test_encoder_failure_skips_spec() {
    let root = TempDir::new().unwrap();
    write_dataset(&root.path().join("data"), "lab/ten", 10, 10);
    let config = reference_config(root.path(), &["lab/ten"]);

    let report = interactor(config, Arc::new(BrokenEncoder), ReferenceDecoder::new())
        .execute()
        .await
        .unwrap();

    assert_eq!(report.counters.specs_attempted, 1);
    assert_eq!(report.counters.specs_skipped, 1);
    assert_eq!(report.counters.decode_runs, 0);
    assert!(report.paths.final_table.is_none());
    assert!(report.skipped[0].contains("unknown encoder"));
}

#[tokio::test]
async fn test_sample_failure_is_isolated() {
    let root = TempDir::new().unwrap();
    write_dataset(&root.path().join("data"), "lab/ten", 10, 10);
    let mut config = reference_config(root.path(), &["lab/ten"]);
    config.num_samples = 5;

    let report = interactor(config, Arc::new(ReferenceEncoder), ReferenceDecoder::panicking_on(2))
        .execute()
        .await
        .unwrap();

    assert_eq!(report.counters.samples_scored, 4);
    assert_eq!(report.counters.sample_failures, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].error.contains("injected decoder fault"));
    assert_eq!(report.summary.cell(0, "samples"), Some("4"));
    assert_eq!(report.summary.cell(0, FAILED_SAMPLES_COLUMN), Some("1"));
}

#[tokio::test]
async fn test_bad_items_are_skipped_not_fatal() {
    let root = TempDir::new().unwrap();
    write_dataset(&root.path().join("data"), "lab/ten", 10, 10);
    write_dataset(&root.path().join("data"), "lab/short", 4, 10);
    let mut config = reference_config(root.path(), &["lab/ten", "lab/missing", "lab/short"]);
    config.scenarios = vec![TimestampScenario::OneFrame, TimestampScenario::SixFrames];
    config.backends = vec!["reference".to_string(), "pyav".to_string()];

    let report = interactor(config, Arc::new(ReferenceEncoder), ReferenceDecoder::new())
        .execute()
        .await
        .unwrap();

    let counters = &report.counters;
    assert_eq!(counters.datasets_loaded, 2);
    assert_eq!(counters.datasets_skipped, 1);
    assert_eq!(counters.specs_encoded, 2);
    // lab/ten: 2 scenarios x reference; lab/short: 1_frame x reference
    assert_eq!(counters.decode_runs, 3);
    // pyav for the 3 runnable scenarios, plus both backends of 6_frames on lab/short
    assert_eq!(counters.decode_runs_skipped, 5);
    assert_eq!(counters.samples_scored, 12);
}

#[tokio::test]
async fn test_save_frames_writes_first_sample() {
    let root = TempDir::new().unwrap();
    write_dataset(&root.path().join("data"), "lab/ten", 10, 10);
    let mut config = reference_config(root.path(), &["lab/ten"]);
    config.save_frames = true;
    let output_dir = config.output_dir.clone();

    interactor(config, Arc::new(ReferenceEncoder), ReferenceDecoder::new())
        .execute()
        .await
        .unwrap();

    let saved = output_dir.join("videos/reference-codec_reference-format_2_0/lab_ten/2_frames_reference");
    let names: Vec<String> = fs::read_dir(&saved)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.iter().filter(|n| n.ends_with("_decoded.png")).count(), 2);
    assert_eq!(names.iter().filter(|n| n.ends_with("_original.png")).count(), 2);
}
