//! vbench video decoding benchmark library
//!
//! Sweeps encoder parameters (codec, pixel format, keyframe interval,
//! compression level) over image datasets, then measures how fast and how
//! faithfully sampled timestamps decode back out of each encoded video.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config_initialization;
pub mod domain;
pub mod engine;
pub mod error;
pub mod output;
pub mod ports;
pub mod quality;
pub mod utils;

// Re-export commonly used types
pub use config_initialization::SweepConfig;
pub use domain::errors::DomainError;
pub use domain::model::{EncodingSpec, MetricRecord, TimestampScenario};
pub use error::{BenchError, BenchResult};
