//! Decode-and-score engine
//!
//! A `SampleJob` is one independent unit of work for the worker pool: it
//! owns shared read-only handles to its artifact and dataset and everything
//! needed to produce a single metric record.

use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::model::*;

pub mod pool;
pub mod scorer;

pub use pool::{PoolOutcome, ScorePool};
pub use scorer::SampleScorer;

/// One sample of one (artifact, scenario, backend) decode run
#[derive(Debug, Clone)]
pub struct SampleJob {
    pub artifact: Arc<Artifact>,
    pub dataset: Arc<Dataset>,
    pub scenario: TimestampScenario,
    pub backend: String,
    pub sample: Sample,
    /// Directory for decoded/original frame pairs, set for the saved sample only
    pub save_frames_dir: Option<PathBuf>,
}

impl SampleJob {
    pub fn run_key(&self) -> RunKey {
        RunKey::new(&self.artifact.spec, self.scenario, &self.backend)
    }
}
