// Inspect interactor - Orchestrates dataset inspection use case

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::domain::errors::*;
use crate::ports::*;
use crate::utils::Utils;

/// Interactor for dataset inspection use case
pub struct InspectInteractor {
    datasets: Arc<dyn DatasetPort>,
}

/// Request for dataset inspection
#[derive(Debug, Clone)]
pub struct InspectRequest {
    pub dataset_id: String,
    pub json: bool,
}

/// Facts about one dataset as seen by the sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub id: String,
    pub frames_dir: PathBuf,
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub duration_seconds: f64,
    pub images_size_bytes: u64,
}

/// Response from dataset inspection
#[derive(Debug, Clone)]
pub struct InspectResponse {
    pub info: DatasetInfo,
    pub summary: String,
}

impl InspectInteractor {
    /// Create new inspect interactor with injected ports
    pub fn new(datasets: Arc<dyn DatasetPort>) -> Self {
        Self { datasets }
    }

    /// Execute dataset inspection
    pub fn execute(&self, request: &InspectRequest) -> Result<InspectResponse, DomainError> {
        info!("Inspecting dataset {}", request.dataset_id);

        let dataset = self.datasets.load_dataset(&request.dataset_id)?;
        let images_size_bytes = self.datasets.images_size_bytes(&dataset)?;

        let info = DatasetInfo {
            id: dataset.id.clone(),
            frames_dir: dataset.frames_dir.clone(),
            frame_count: dataset.frame_count,
            width: dataset.width,
            height: dataset.height,
            fps: dataset.fps,
            duration_seconds: dataset.duration_seconds(),
            images_size_bytes,
        };

        let summary = if request.json {
            serde_json::to_string_pretty(&info)
                .map_err(|e| DomainError::SampleFailed(format!("JSON serialization failed: {}", e)))?
        } else {
            Self::format_as_text(&info)
        };

        Ok(InspectResponse { info, summary })
    }

    fn format_as_text(info: &DatasetInfo) -> String {
        let mut output = String::new();
        output.push_str("Dataset Information:\n");
        output.push_str(&format!("  Id: {}\n", info.id));
        output.push_str(&format!("  Frames: {}\n", info.frames_dir.display()));
        output.push_str(&format!("  Frame Count: {}\n", info.frame_count));
        output.push_str(&format!("  Resolution: {} x {}\n", info.width, info.height));
        output.push_str(&format!("  Frame Rate: {} fps\n", info.fps));
        output.push_str(&format!("  Duration: {:.3}s\n", info.duration_seconds));
        output.push_str(&format!(
            "  Images Size: {} ({} bytes)\n",
            Utils::format_file_size(info.images_size_bytes),
            info.images_size_bytes
        ));
        output
    }
}
