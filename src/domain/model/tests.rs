// Unit tests for domain models

use super::*;

fn create_test_dataset(frame_count: usize, fps: u32) -> Dataset {
    Dataset::new(
        "lerobot/pusht_image",
        PathBuf::from("/data/lerobot/pusht_image"),
        frame_count,
        96,
        64,
        fps,
    )
    .unwrap()
}

fn create_test_spec() -> EncodingSpec {
    EncodingSpec {
        dataset_id: "lerobot/pusht_image".to_string(),
        codec: "libx264".to_string(),
        pixel_format: "yuv444p".to_string(),
        keyframe_interval: Some(2),
        compression_level: None,
        varied: VariedParameter::KeyframeInterval,
    }
}

#[test]
fn test_parse_param_accepts_none_in_any_case() {
    assert_eq!(parse_param("none").unwrap(), None);
    assert_eq!(parse_param("None").unwrap(), None);
    assert_eq!(parse_param(" NONE ").unwrap(), None);
    assert_eq!(parse_param("40").unwrap(), Some(40));
}

#[test]
fn test_parse_param_rejects_garbage() {
    assert!(matches!(parse_param("-3"), Err(DomainError::BadConfig(_))));
    assert!(matches!(parse_param("fast"), Err(DomainError::BadConfig(_))));
}

#[test]
fn test_format_metric_infinity() {
    assert_eq!(format_metric(f64::INFINITY), "inf");
    assert_eq!(format_metric(f64::NAN), "nan");
    assert_eq!(format_metric(0.5), "0.5");
}

#[test]
fn test_dataset_validation() {
    assert!(Dataset::new("empty", PathBuf::from("x"), 0, 10, 10, 10).is_err());
    assert!(Dataset::new("flat", PathBuf::from("x"), 5, 0, 10, 10).is_err());
    assert!(Dataset::new("still", PathBuf::from("x"), 5, 10, 10, 0).is_err());
}

#[test]
fn test_dataset_derived_values() {
    let dataset = create_test_dataset(20, 10);
    assert_eq!(dataset.safe_id(), "lerobot_pusht_image");
    assert_eq!(dataset.resolution(), "96 x 64");
    assert_eq!(dataset.num_pixels(), 96 * 64);
    assert_eq!(dataset.duration_seconds(), 2.0);
    assert_eq!(
        dataset.frame_path(7),
        PathBuf::from("/data/lerobot/pusht_image/frame_000007.png")
    );
    assert_eq!(
        dataset.frame_pattern(),
        PathBuf::from("/data/lerobot/pusht_image/frame_%06d.png")
    );
}

#[test]
fn test_spec_parameter_dir_name() {
    let spec = create_test_spec();
    assert_eq!(spec.parameter_dir_name(), "libx264_yuv444p_2_None");
    assert_eq!(spec.combination().to_string(), "libx264_yuv444p");
}

#[test]
fn test_same_artifact_ignores_varied_parameter() {
    let spec = create_test_spec();
    let twin = EncodingSpec {
        varied: VariedParameter::CompressionLevel,
        ..spec.clone()
    };
    assert!(spec.same_artifact(&twin));

    let other = EncodingSpec {
        compression_level: Some(0),
        ..spec.clone()
    };
    assert!(!spec.same_artifact(&other));
}

#[test]
fn test_artifact_compression_ratio_is_exact_byte_ratio() {
    let artifact = Artifact {
        spec: create_test_spec(),
        path: PathBuf::from("video.mp4"),
        video_size_bytes: 1_500,
        images_size_bytes: 6_000,
        reused: false,
    };
    assert_eq!(artifact.compression_ratio(), 0.25);
}

#[test]
fn test_scenario_names_round_trip() {
    for scenario in TimestampScenario::ALL {
        let parsed: TimestampScenario = scenario.name().parse().unwrap();
        assert_eq!(parsed, scenario);
    }
    assert!("3_frames".parse::<TimestampScenario>().is_err());
}

#[test]
fn test_scenario_spans() {
    assert_eq!(TimestampScenario::OneFrame.span(), 0);
    assert_eq!(TimestampScenario::TwoFrames.span(), 1);
    assert_eq!(TimestampScenario::TwoFramesFourSpace.span(), 5);
    assert_eq!(TimestampScenario::SixFrames.span(), 5);
    assert_eq!(TimestampScenario::SixFrames.frame_count(), 6);
    assert!(TimestampScenario::TwoFramesFourSpace.is_spaced());
    assert!(!TimestampScenario::SixFrames.is_spaced());
}

#[test]
fn test_sample_derive_six_frames() {
    let sample = Sample::derive(0, 12, TimestampScenario::SixFrames, 10);
    assert_eq!(sample.frame_indices, vec![12, 13, 14, 15, 16, 17]);
    for (k, ts) in sample.timestamps.iter().enumerate() {
        let expected = 1.2 + k as f64 / 10.0;
        assert!((ts - expected).abs() < 1e-9, "{} vs {}", ts, expected);
    }
}

#[test]
fn test_sample_derive_two_frames_anchor_point_three() {
    let sample = Sample::derive(0, 3, TimestampScenario::TwoFrames, 10);
    assert_eq!(sample.frame_indices, vec![3, 4]);
    assert!((sample.timestamps[0] - 0.3).abs() < 1e-12);
    assert!((sample.timestamps[1] - 0.4).abs() < 1e-12);
    assert!((sample.anchor_timestamp() - 0.3).abs() < 1e-12);
}

#[test]
fn test_frame_new_checks_length() {
    assert!(Frame::new(2, 2, vec![0; 12]).is_ok());
    assert!(matches!(
        Frame::new(2, 2, vec![0; 11]),
        Err(DomainError::FrameMismatch(_))
    ));
}

#[test]
fn test_frame_filled() {
    let frame = Frame::filled(3, 2, [1, 2, 3]);
    assert_eq!(frame.pixel_count(), 6);
    assert_eq!(frame.sample_count(), 18);
    assert_eq!(&frame.data[..6], &[1, 2, 3, 1, 2, 3]);
}

#[test]
fn test_metric_record_row_matches_columns() {
    let record = MetricRecord {
        dataset_id: "set".to_string(),
        resolution: "96 x 64".to_string(),
        num_pixels: 6144,
        codec: "libx264".to_string(),
        pixel_format: "yuv420p".to_string(),
        keyframe_interval: None,
        compression_level: Some(30),
        video_size_bytes: 10,
        images_size_bytes: 40,
        compression_ratio: 0.25,
        scenario: TimestampScenario::SixFrames,
        backend: "ffmpeg-seek".to_string(),
        sample_index: 3,
        anchor_timestamp: 0.5,
        load_time_video_ms: 2.0,
        load_time_images_ms: 1.0,
        load_time_ratio: 2.0,
        mse: 0.0,
        psnr: f64::INFINITY,
        ssim: 1.0,
    };
    let row = record.to_row();
    assert_eq!(row.len(), MetricRecord::COLUMNS.len());
    assert_eq!(row[5], "None");
    assert_eq!(row[6], "30");
    assert_eq!(row[10], "6_frames");
    assert_eq!(row[18], "inf");
    assert_eq!(record.combination(), Combination::new("libx264", "yuv420p"));
}

#[test]
fn test_sample_failure_describes_run() {
    let key = RunKey::new(&create_test_spec(), TimestampScenario::OneFrame, "ffmpeg-scan");
    let failure = SampleFailure::new(key.clone(), 4, "boom");
    assert_eq!(failure.key, key);
    assert!(failure.run.contains("ffmpeg-scan"));
    assert!(failure.run.contains("1_frame"));
}
