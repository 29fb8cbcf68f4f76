// Sweep interactor - Orchestrates the encode / decode-and-score / aggregate use case

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::adapters::DecoderRegistry;
use crate::config_initialization::SweepConfig;
use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::rules::*;
use crate::engine::{SampleJob, SampleScorer, ScorePool};
use crate::error::{BenchError, BenchResult};
use crate::output::*;
use crate::ports::*;
use crate::utils::time::run_stamp;
use crate::utils::Utils;

/// What a finished sweep hands back to the caller
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub counters: SweepCounters,
    pub paths: OutputPaths,
    pub summary: ResultTable,
    /// One line per skipped dataset, spec or decode run
    pub skipped: Vec<String>,
    pub failures: Vec<SampleFailure>,
    pub elapsed: Duration,
}

impl SweepReport {
    /// Human-readable end-of-run summary
    pub fn render(&self) -> String {
        let c = &self.counters;
        let mut output = String::new();

        output.push_str("Sweep Summary:\n");
        output.push_str(&format!(
            "  Datasets: {} loaded, {} skipped\n",
            c.datasets_loaded, c.datasets_skipped
        ));
        output.push_str(&format!(
            "  Specs: {} attempted, {} encoded, {} reused, {} skipped ({} filtered before encoding)\n",
            c.specs_attempted, c.specs_encoded, c.specs_reused, c.specs_skipped, c.combinations_filtered
        ));
        output.push_str(&format!(
            "  Decode runs: {} completed, {} skipped\n",
            c.decode_runs, c.decode_runs_skipped
        ));
        output.push_str(&format!(
            "  Samples: {} scored, {} failed\n",
            c.samples_scored, c.sample_failures
        ));
        output.push_str(&format!("  Elapsed: {}\n", Utils::format_duration(self.elapsed)));

        if let Some(path) = &self.paths.final_table {
            output.push_str(&format!("  Results: {}\n", path.display()));
        }
        if let Some(path) = &self.paths.summary_table {
            output.push_str(&format!("  Summary: {}\n", path.display()));
        }
        if let Some(path) = &self.paths.report {
            output.push_str(&format!("  Report: {}\n", path.display()));
        }
        output
    }
}

/// Mutable bookkeeping of one sweep, owned by the orchestrating task
#[derive(Default)]
struct SweepState {
    counters: SweepCounters,
    aggregator: Aggregator,
    skipped: Vec<String>,
}

impl SweepState {
    fn skip(&mut self, what: impl std::fmt::Display, reason: &DomainError) {
        warn!("Skipping {}: {}", what, reason);
        self.skipped.push(format!("{}: {}", what, reason));
    }
}

/// Interactor for the benchmark sweep use case
pub struct SweepInteractor {
    config: Arc<SweepConfig>,
    encoder: Arc<dyn EncodePort>,
    datasets: Arc<dyn DatasetPort>,
    decoders: DecoderRegistry,
}

impl SweepInteractor {
    /// Create new sweep interactor with injected ports
    pub fn new(
        config: Arc<SweepConfig>,
        encoder: Arc<dyn EncodePort>,
        datasets: Arc<dyn DatasetPort>,
        decoders: DecoderRegistry,
    ) -> Self {
        Self {
            config,
            encoder,
            datasets,
            decoders,
        }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Run the whole sweep and persist its tables.
    ///
    /// Per-item failures are logged and counted; only pool construction and
    /// result persistence errors are returned.
    pub async fn execute(&self) -> BenchResult<SweepReport> {
        let started_at = Local::now();
        let clock = Instant::now();
        let config = &self.config;

        let cpus = num_cpus::get();
        if config.num_workers > cpus {
            warn!(
                "{} scoring workers requested on {} CPUs; timings will be noisy",
                config.num_workers, cpus
            );
        }
        let pool = Arc::new(ScorePool::new(config.num_workers)?);

        info!(
            "Starting sweep: {} datasets, {} codecs, {} pixel formats, {} scenarios, {} backends",
            config.datasets.len(),
            config.grid.codecs.len(),
            config.grid.pixel_formats.len(),
            config.scenarios.len(),
            config.backends.len()
        );

        let mut state = SweepState::default();
        for dataset_id in &config.datasets {
            let span = info_span!("dataset", id = %dataset_id);
            self.run_dataset(dataset_id, &pool, &mut state)
                .instrument(span)
                .await?;
        }

        let paths = self.persist(&state.aggregator, started_at)?;
        let summary = state.aggregator.summary_table();

        let report = RunReport {
            started_at,
            finished_at: Local::now(),
            num_samples: config.num_samples,
            num_workers: config.num_workers,
            seed: config.seed,
            counters: state.counters.clone(),
            backends: self.decoders.capabilities(),
            skipped: state.skipped.clone(),
            failures: state.aggregator.failures().to_vec(),
        };
        let paths = self.write_report(&report, paths)?;

        info!(
            "Sweep finished: {} samples scored, {} failed",
            state.counters.samples_scored, state.counters.sample_failures
        );

        Ok(SweepReport {
            counters: state.counters,
            paths,
            summary,
            skipped: state.skipped,
            failures: report.failures,
            elapsed: clock.elapsed(),
        })
    }

    async fn run_dataset(
        &self,
        dataset_id: &str,
        pool: &Arc<ScorePool>,
        state: &mut SweepState,
    ) -> BenchResult<()> {
        let loaded = self.datasets.load_dataset(dataset_id).and_then(|dataset| {
            let images_size = self.datasets.images_size_bytes(&dataset)?;
            Ok((dataset, images_size))
        });
        let (dataset, images_size_bytes) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                state.counters.datasets_skipped += 1;
                state.skip(format!("dataset {}", dataset_id), &e);
                return Ok(());
            }
        };
        state.counters.datasets_loaded += 1;
        info!(
            "Loaded {}: {} frames, {}, {} fps",
            dataset.id,
            dataset.frame_count,
            dataset.resolution(),
            dataset.fps
        );
        let dataset = Arc::new(dataset);

        let enumeration = ParameterEnumerator::enumerate_dataset(dataset_id, &self.config.grid);
        state.counters.combinations_filtered += enumeration.filtered.len();
        for filtered in &enumeration.filtered {
            state.skip(&filtered.description, &filtered.reason);
        }

        for spec in enumeration.specs {
            state.counters.specs_attempted += 1;
            let span = info_span!("artifact", spec = %spec);

            let encoded = self
                .encode(&spec, &dataset, images_size_bytes, state)
                .instrument(span.clone())
                .await;
            let artifact = match encoded {
                Ok(artifact) => Arc::new(artifact),
                Err(e) => {
                    state.counters.specs_skipped += 1;
                    state.skip(&spec, &e);
                    continue;
                }
            };

            self.score_artifact(&artifact, &dataset, pool, state)
                .instrument(span)
                .await?;
        }
        Ok(())
    }

    /// Encode one spec, or reuse the artifact a previous run left behind
    async fn encode(
        &self,
        spec: &EncodingSpec,
        dataset: &Dataset,
        images_size_bytes: u64,
        state: &mut SweepState,
    ) -> Result<Artifact, DomainError> {
        let path = ArtifactLayout::video_path(&self.config.output_dir, spec);
        let reused = path.is_file() && !self.config.overwrite;

        if reused {
            debug!("Reusing {}", path.display());
        } else {
            let job = EncodeJob {
                spec: spec.clone(),
                frame_pattern: dataset.frame_pattern(),
                frame_count: dataset.frame_count,
                fps: dataset.fps,
                output: path.clone(),
            };
            info!("Encoding with {}", self.encoder.name());
            self.encoder.encode(&job).await?;
        }

        let video_size_bytes = tokio::fs::metadata(&path)
            .await
            .map_err(|e| DomainError::FsFail(format!("{}: {}", path.display(), e)))?
            .len();

        if reused {
            state.counters.specs_reused += 1;
        } else {
            state.counters.specs_encoded += 1;
        }

        let artifact = Artifact {
            spec: spec.clone(),
            path,
            video_size_bytes,
            images_size_bytes,
            reused,
        };
        debug!(
            "Artifact {} bytes, compression ratio {:.4}",
            artifact.video_size_bytes,
            artifact.compression_ratio()
        );
        Ok(artifact)
    }

    /// Every (scenario, backend) decode run of one artifact
    async fn score_artifact(
        &self,
        artifact: &Arc<Artifact>,
        dataset: &Arc<Dataset>,
        pool: &Arc<ScorePool>,
        state: &mut SweepState,
    ) -> BenchResult<()> {
        let config = &self.config;
        let mut rng = StdRng::seed_from_u64(config.seed);

        for &scenario in &config.scenarios {
            let samples = match TimestampSampler::draw(&mut rng, dataset, scenario, config.num_samples) {
                Ok(samples) => samples,
                Err(e) => {
                    state.counters.decode_runs_skipped += config.backends.len();
                    state.skip(format!("{} {}", artifact.spec, scenario), &e);
                    continue;
                }
            };

            for backend in &config.backends {
                let key = RunKey::new(&artifact.spec, scenario, backend);
                let decoder = match self.resolve_backend(&artifact.spec, backend) {
                    Ok(decoder) => decoder,
                    Err(e) => {
                        state.counters.decode_runs_skipped += 1;
                        state.skip(&key, &e);
                        continue;
                    }
                };

                if scenario.is_spaced() && !decoder.capabilities().sparse_decode {
                    debug!(
                        "{} decodes the full span of {}; timings include the skipped frames",
                        backend, scenario
                    );
                }

                let jobs = self.sample_jobs(artifact, dataset, scenario, backend, &samples);
                let scorer = SampleScorer::new(decoder, Arc::clone(&self.datasets), config.tolerance_s);
                let pool = Arc::clone(pool);

                info!("Scoring {} samples for {}", jobs.len(), key);
                let outcome = tokio::task::spawn_blocking(move || {
                    pool.run(&jobs, |job| scorer.score(job))
                })
                .await
                .map_err(|e| BenchError::Pool {
                    message: format!("scoring batch for {} did not complete: {}", key, e),
                })?;

                for failure in &outcome.failures {
                    warn!("Sample {} of {} failed: {}", failure.sample_index, key, failure.error);
                }
                state.counters.decode_runs += 1;
                state.counters.samples_scored += outcome.records.len();
                state.counters.sample_failures += outcome.failures.len();
                state.aggregator.add_outcome(outcome);
            }
        }
        Ok(())
    }

    fn resolve_backend(
        &self,
        spec: &EncodingSpec,
        backend: &str,
    ) -> Result<Arc<dyn DecodePort>, DomainError> {
        CodecSupport::check_backend(&spec.codec, backend)?;
        self.decoders.get(backend).ok_or_else(|| {
            DomainError::UnsupportedCombination(format!(
                "decode backend {} is not registered (available: {})",
                backend,
                self.decoders.names().join(", ")
            ))
        })
    }

    fn sample_jobs(
        &self,
        artifact: &Arc<Artifact>,
        dataset: &Arc<Dataset>,
        scenario: TimestampScenario,
        backend: &str,
        samples: &[Sample],
    ) -> Vec<SampleJob> {
        let save_dir = self
            .config
            .save_frames
            .then(|| ArtifactLayout::saved_frames_dir(&artifact.path, scenario, backend));

        samples
            .iter()
            .map(|sample| SampleJob {
                artifact: Arc::clone(artifact),
                dataset: Arc::clone(dataset),
                scenario,
                backend: backend.to_string(),
                sample: sample.clone(),
                save_frames_dir: if sample.index == 0 {
                    save_dir.clone()
                } else {
                    None
                },
            })
            .collect()
    }

    /// Append per-combination tables, then write the final and summary tables
    fn persist(
        &self,
        aggregator: &Aggregator,
        started_at: chrono::DateTime<Local>,
    ) -> BenchResult<OutputPaths> {
        let mut paths = OutputPaths::default();
        let combination_tables = aggregator.combination_tables();
        if combination_tables.is_empty() {
            warn!("No samples were scored; no result tables written");
            return Ok(paths);
        }

        let tables_dir = self.config.output_dir.join("tables");
        let mut touched = Vec::with_capacity(combination_tables.len());
        for (combination, table) in &combination_tables {
            let path = tables_dir.join(format!("{}.csv", combination));
            TableWriter::append(table, &path)?;
            debug!("Appended {} rows to {}", table.len(), path.display());
            touched.push(TableWriter::read(&path)?);
            paths.combination_tables.push(path);
        }

        let final_table = ResultTable::concat(&touched);
        let final_path = self.run_file(started_at, ".csv");
        TableWriter::write(&final_table, &final_path)?;
        info!("Wrote {} rows to {}", final_table.len(), final_path.display());
        paths.final_table = Some(final_path);

        let summary_path = self.run_file(started_at, "_summary.csv");
        TableWriter::write(&aggregator.summary_table(), &summary_path)?;
        paths.summary_table = Some(summary_path);

        Ok(paths)
    }

    fn write_report(&self, report: &RunReport, mut paths: OutputPaths) -> BenchResult<OutputPaths> {
        let path = self.run_file(report.started_at, "_report.json");
        std::fs::create_dir_all(&self.config.output_dir)?;
        std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
        paths.report = Some(path);
        Ok(paths)
    }

    /// `<output>/<stamp>_<N>-samples<suffix>`
    fn run_file(&self, started_at: chrono::DateTime<Local>, suffix: &str) -> PathBuf {
        self.config.output_dir.join(format!(
            "{}_{}-samples{}",
            run_stamp(started_at),
            self.config.num_samples,
            suffix
        ))
    }
}
