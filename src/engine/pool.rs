//! Fixed-size scoring worker pool

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::domain::errors::DomainError;
use crate::domain::model::{MetricRecord, SampleFailure};
use crate::engine::SampleJob;
use crate::error::{BenchError, BenchResult};

/// Records and failures of one batch, in job order
#[derive(Debug, Clone, Default)]
pub struct PoolOutcome {
    pub records: Vec<MetricRecord>,
    pub failures: Vec<SampleFailure>,
}

/// Runs sample jobs on exactly `num_workers` threads
pub struct ScorePool {
    pool: ThreadPool,
    num_workers: usize,
}

impl ScorePool {
    pub fn new(num_workers: usize) -> BenchResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|idx| format!("vbench-score-{}", idx))
            .build()
            .map_err(|e| BenchError::Pool {
                message: format!("cannot start {} scoring workers: {}", num_workers, e),
            })?;
        Ok(Self { pool, num_workers })
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Score every job, blocking until the whole batch has finished.
    ///
    /// A job that errors or panics becomes a `SampleFailure`; the rest of the
    /// batch is unaffected.
    pub fn run<F>(&self, jobs: &[SampleJob], score: F) -> PoolOutcome
    where
        F: Fn(&SampleJob) -> Result<MetricRecord, DomainError> + Sync,
    {
        let results: Vec<Result<MetricRecord, DomainError>> = self.pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    catch_unwind(AssertUnwindSafe(|| score(job))).unwrap_or_else(|payload| {
                        Err(DomainError::SampleFailed(format!(
                            "worker panicked: {}",
                            panic_message(payload.as_ref())
                        )))
                    })
                })
                .collect()
        });

        let mut outcome = PoolOutcome::default();
        for (job, result) in jobs.iter().zip(results) {
            match result {
                Ok(record) => outcome.records.push(record),
                Err(e) => outcome.failures.push(SampleFailure::new(
                    job.run_key(),
                    job.sample.index,
                    e.to_string(),
                )),
            }
        }
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn jobs(count: usize) -> Vec<SampleJob> {
        let spec = EncodingSpec {
            dataset_id: "set".to_string(),
            codec: "reference-codec".to_string(),
            pixel_format: "rgb24".to_string(),
            keyframe_interval: Some(2),
            compression_level: None,
            varied: VariedParameter::KeyframeInterval,
        };
        let artifact = Arc::new(Artifact {
            spec,
            path: PathBuf::from("set.raw"),
            video_size_bytes: 1,
            images_size_bytes: 1,
            reused: false,
        });
        let dataset = Arc::new(Dataset::new("set", PathBuf::from("set"), 10, 8, 8, 10).unwrap());
        (0..count)
            .map(|i| SampleJob {
                artifact: artifact.clone(),
                dataset: dataset.clone(),
                scenario: TimestampScenario::OneFrame,
                backend: "fake".to_string(),
                sample: Sample::derive(i, i, TimestampScenario::OneFrame, 10),
                save_frames_dir: None,
            })
            .collect()
    }

    fn record_for(job: &SampleJob) -> MetricRecord {
        MetricRecord {
            dataset_id: job.dataset.id.clone(),
            resolution: job.dataset.resolution(),
            num_pixels: job.dataset.num_pixels(),
            codec: job.artifact.spec.codec.clone(),
            pixel_format: job.artifact.spec.pixel_format.clone(),
            keyframe_interval: job.artifact.spec.keyframe_interval,
            compression_level: job.artifact.spec.compression_level,
            video_size_bytes: 1,
            images_size_bytes: 1,
            compression_ratio: 1.0,
            scenario: job.scenario,
            backend: job.backend.clone(),
            sample_index: job.sample.index,
            anchor_timestamp: job.sample.anchor_timestamp(),
            load_time_video_ms: 1.0,
            load_time_images_ms: 1.0,
            load_time_ratio: 1.0,
            mse: 0.0,
            psnr: f64::INFINITY,
            ssim: 1.0,
        }
    }

    #[test]
    fn test_pool_keeps_job_order() {
        let pool = ScorePool::new(3).unwrap();
        let batch = jobs(12);
        let outcome = pool.run(&batch, |job| Ok(record_for(job)));
        let indices: Vec<usize> = outcome.records.iter().map(|r| r.sample_index).collect();
        assert_eq!(indices, (0..12).collect::<Vec<_>>());
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn test_failures_are_isolated() {
        let pool = ScorePool::new(2).unwrap();
        let batch = jobs(5);
        let outcome = pool.run(&batch, |job| {
            if job.sample.index == 2 {
                Err(DomainError::DecodeFailed("corrupt packet".to_string()))
            } else {
                Ok(record_for(job))
            }
        });
        assert_eq!(outcome.records.len(), 4);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].sample_index, 2);
        assert!(outcome.failures[0].error.contains("corrupt packet"));
    }

    #[test]
    fn test_panics_become_failures() {
        let pool = ScorePool::new(2).unwrap();
        let batch = jobs(4);
        let outcome = pool.run(&batch, |job| {
            if job.sample.index == 1 {
                panic!("decoder exploded");
            }
            Ok(record_for(job))
        });
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].error.contains("decoder exploded"));
    }

    #[test]
    fn test_pool_uses_configured_threads() {
        let pool = ScorePool::new(4).unwrap();
        assert_eq!(pool.num_workers(), 4);
        let seen = AtomicUsize::new(0);
        let outcome = pool.run(&jobs(8), |job| {
            seen.fetch_add(1, Ordering::Relaxed);
            assert_eq!(rayon::current_num_threads(), 4);
            Ok(record_for(job))
        });
        assert_eq!(seen.load(Ordering::Relaxed), 8);
        assert!(outcome.failures.is_empty());
    }
}
