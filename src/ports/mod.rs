// Ports - Interface definitions (contracts)

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::errors::*;
use crate::domain::model::*;

/// Everything an encoder needs to turn a frame sequence into one artifact
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub spec: EncodingSpec,
    /// printf-style pattern of the input frames (`.../frame_%06d.png`)
    pub frame_pattern: PathBuf,
    pub frame_count: usize,
    pub fps: u32,
    pub output: PathBuf,
}

/// Port for producing video artifacts
#[async_trait]
pub trait EncodePort: Send + Sync {
    /// Human-readable encoder name for logs
    fn name(&self) -> &str;

    /// Encode `job.frame_pattern` into `job.output`, replacing any existing file
    async fn encode(&self, job: &EncodeJob) -> Result<(), DomainError>;
}

/// Port for decoding frames at given timestamps.
///
/// Implementations are called concurrently from scoring workers.
pub trait DecodePort: Send + Sync {
    /// Backend name as used on the command line and in tables
    fn backend(&self) -> &str;

    fn capabilities(&self) -> BackendCapabilities;

    /// Decode the frames around `timestamps` (seconds, ascending).
    ///
    /// May return more frames than requested; callers select the nearest ones.
    fn decode(
        &self,
        video: &Path,
        timestamps: &[f64],
        tolerance_s: f64,
    ) -> Result<Vec<DecodedFrame>, DomainError>;
}

/// Port for reading original frames and writing comparison images
pub trait DatasetPort: Send + Sync {
    /// Resolve an identifier to a validated dataset
    fn load_dataset(&self, id: &str) -> Result<Dataset, DomainError>;

    /// Total on-disk size of the dataset's frame images
    fn images_size_bytes(&self, dataset: &Dataset) -> Result<u64, DomainError>;

    /// Load one original frame as RGB8
    fn load_frame(&self, dataset: &Dataset, index: usize) -> Result<Frame, DomainError>;

    /// Write a decoded frame as PNG
    fn save_frame(&self, frame: &Frame, path: &Path) -> Result<(), DomainError>;

    /// Copy an original frame file next to its decoded counterpart
    fn copy_original(&self, dataset: &Dataset, index: usize, path: &Path)
        -> Result<(), DomainError>;
}
