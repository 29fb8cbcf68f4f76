//! Scores a single sample: decode, load originals, compare

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::rules::FrameMatcher;
use crate::engine::SampleJob;
use crate::ports::*;
use crate::quality;
use crate::utils::time::{millis_per_item, timed};

/// Per-worker scoring logic; shared immutably across the pool
pub struct SampleScorer {
    decoder: Arc<dyn DecodePort>,
    datasets: Arc<dyn DatasetPort>,
    tolerance_s: f64,
}

impl SampleScorer {
    pub fn new(decoder: Arc<dyn DecodePort>, datasets: Arc<dyn DatasetPort>, tolerance_s: f64) -> Self {
        Self {
            decoder,
            datasets,
            tolerance_s,
        }
    }

    /// Produce the metric record of one sample
    pub fn score(&self, job: &SampleJob) -> Result<MetricRecord, DomainError> {
        let sample = &job.sample;
        let frames_requested = sample.timestamps.len();

        let (decoded, video_elapsed) = timed(|| {
            self.decoder
                .decode(&job.artifact.path, &sample.timestamps, self.tolerance_s)
                .and_then(|frames| FrameMatcher::select(&sample.timestamps, frames, self.tolerance_s))
        });
        let decoded = decoded?;

        let (originals, images_elapsed) = timed(|| {
            sample
                .frame_indices
                .iter()
                .map(|&index| self.datasets.load_frame(&job.dataset, index))
                .collect::<Result<Vec<_>, _>>()
        });
        let originals = originals?;

        let scores = quality::score_frames(&decoded, &originals)?;

        if let Some(dir) = &job.save_frames_dir {
            if let Err(e) = self.save_comparison(job, dir, &decoded) {
                warn!("Could not save frames of {} to {}: {}", job.run_key(), dir.display(), e);
            }
        }

        let load_time_video_ms = millis_per_item(video_elapsed, frames_requested);
        let load_time_images_ms = millis_per_item(images_elapsed, frames_requested);
        debug!(
            sample = sample.index,
            anchor = sample.anchor,
            "Scored {}: mse={:.6} psnr={:.3} ssim={:.4}",
            job.run_key(),
            scores.mse,
            scores.psnr,
            scores.ssim
        );

        let artifact = &job.artifact;
        let spec = &artifact.spec;
        Ok(MetricRecord {
            dataset_id: job.dataset.id.clone(),
            resolution: job.dataset.resolution(),
            num_pixels: job.dataset.num_pixels(),
            codec: spec.codec.clone(),
            pixel_format: spec.pixel_format.clone(),
            keyframe_interval: spec.keyframe_interval,
            compression_level: spec.compression_level,
            video_size_bytes: artifact.video_size_bytes,
            images_size_bytes: artifact.images_size_bytes,
            compression_ratio: artifact.compression_ratio(),
            scenario: job.scenario,
            backend: job.backend.clone(),
            sample_index: sample.index,
            anchor_timestamp: sample.anchor_timestamp(),
            load_time_video_ms,
            load_time_images_ms,
            load_time_ratio: load_time_video_ms / load_time_images_ms,
            mse: scores.mse,
            psnr: scores.psnr,
            ssim: scores.ssim,
        })
    }

    /// Write `frame_XXXXXX_decoded.png` / `frame_XXXXXX_original.png` pairs,
    /// unless the directory already holds all of them
    fn save_comparison(
        &self,
        job: &SampleJob,
        dir: &Path,
        decoded: &[Frame],
    ) -> Result<(), DomainError> {
        if count_decoded_files(dir) >= decoded.len() {
            debug!("Frames already saved in {}", dir.display());
            return Ok(());
        }

        for (&index, frame) in job.sample.frame_indices.iter().zip(decoded) {
            let stem = format!("frame_{:06}", index);
            self.datasets
                .save_frame(frame, &dir.join(format!("{}_decoded.png", stem)))?;
            self.datasets
                .copy_original(&job.dataset, index, &dir.join(format!("{}_original.png", stem)))?;
        }
        Ok(())
    }
}

fn count_decoded_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_name().to_string_lossy().ends_with("_decoded.png"))
                .count()
        })
        .unwrap_or(0)
}
