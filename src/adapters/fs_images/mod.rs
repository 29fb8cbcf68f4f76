//! PNG image datasets on the local filesystem
//!
//! A dataset identifier is a path under the data root. Frames are
//! `frame_%06d.png`, contiguous from 0, either directly in the dataset
//! directory or in its first `episode_*` sub-directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;

/// Optional per-dataset metadata file
pub const MANIFEST_FILE: &str = "dataset.toml";

#[derive(Debug, Default, Deserialize)]
struct DatasetManifest {
    fps: Option<u32>,
    #[allow(dead_code)]
    name: Option<String>,
}

/// Filesystem dataset adapter
pub struct ImageDatasetAdapter {
    data_root: PathBuf,
    default_fps: u32,
}

impl ImageDatasetAdapter {
    pub fn new(data_root: impl Into<PathBuf>, default_fps: u32) -> Self {
        Self {
            data_root: data_root.into(),
            default_fps,
        }
    }

    fn read_fps(&self, dataset_dir: &Path) -> Result<u32, DomainError> {
        let manifest_path = dataset_dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            warn!(
                "{} has no {}; assuming {} fps",
                dataset_dir.display(),
                MANIFEST_FILE,
                self.default_fps
            );
            return Ok(self.default_fps);
        }

        let content = fs::read_to_string(&manifest_path)
            .map_err(|e| DomainError::FsFail(format!("{}: {}", manifest_path.display(), e)))?;
        let manifest: DatasetManifest = toml::from_str(&content).map_err(|e| {
            DomainError::DatasetInvalid(format!("{}: {}", manifest_path.display(), e))
        })?;
        Ok(manifest.fps.unwrap_or(self.default_fps))
    }

    /// First `episode_*` sub-directory in lexicographic order, else the dataset directory
    fn frames_dir(dataset_dir: &Path) -> Result<PathBuf, DomainError> {
        let mut episodes: Vec<PathBuf> = fs::read_dir(dataset_dir)
            .map_err(|e| DomainError::FsFail(format!("{}: {}", dataset_dir.display(), e)))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("episode_"))
            .map(|entry| entry.path())
            .collect();
        episodes.sort();
        Ok(episodes
            .into_iter()
            .next()
            .unwrap_or_else(|| dataset_dir.to_path_buf()))
    }

    /// Number of contiguous frames starting at 0
    fn count_frames(frames_dir: &Path) -> Result<usize, DomainError> {
        let mut indices: Vec<usize> = fs::read_dir(frames_dir)
            .map_err(|e| DomainError::FsFail(format!("{}: {}", frames_dir.display(), e)))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| parse_frame_index(&entry.file_name().to_string_lossy()))
            .collect();
        indices.sort_unstable();

        if indices.is_empty() {
            return Err(DomainError::DatasetInvalid(format!(
                "no frame_%06d.png files in {}",
                frames_dir.display()
            )));
        }
        if let Some((expected, found)) = indices
            .iter()
            .enumerate()
            .find(|(expected, found)| *expected != **found)
        {
            return Err(DomainError::DatasetInvalid(format!(
                "frame {} missing in {} (next frame is {})",
                expected,
                frames_dir.display(),
                found
            )));
        }
        Ok(indices.len())
    }
}

/// `frame_000042.png` → 42
pub fn parse_frame_index(file_name: &str) -> Option<usize> {
    let digits = file_name.strip_prefix("frame_")?.strip_suffix(".png")?;
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn image_error(path: &Path) -> impl Fn(image::ImageError) -> DomainError + '_ {
    move |e| DomainError::DatasetInvalid(format!("{}: {}", path.display(), e))
}

impl DatasetPort for ImageDatasetAdapter {
    fn load_dataset(&self, id: &str) -> Result<Dataset, DomainError> {
        let dataset_dir = self.data_root.join(id);
        if !dataset_dir.is_dir() {
            return Err(DomainError::DatasetInvalid(format!(
                "{} is not a directory",
                dataset_dir.display()
            )));
        }

        let fps = self.read_fps(&dataset_dir)?;
        let frames_dir = Self::frames_dir(&dataset_dir)?;
        let frame_count = Self::count_frames(&frames_dir)?;

        let first = frames_dir.join(Dataset::frame_file_name(0));
        let (width, height) = image::image_dimensions(&first).map_err(image_error(&first))?;
        for index in 1..frame_count {
            let path = frames_dir.join(Dataset::frame_file_name(index));
            let size = image::image_dimensions(&path).map_err(image_error(&path))?;
            if size != (width, height) {
                return Err(DomainError::DatasetInvalid(format!(
                    "{} is {}x{}, frame 0 is {}x{}",
                    path.display(),
                    size.0,
                    size.1,
                    width,
                    height
                )));
            }
        }

        debug!(
            "Loaded dataset {} ({} frames, {}x{} @ {} fps) from {}",
            id,
            frame_count,
            width,
            height,
            fps,
            frames_dir.display()
        );
        Dataset::new(id, frames_dir, frame_count, width, height, fps)
    }

    fn images_size_bytes(&self, dataset: &Dataset) -> Result<u64, DomainError> {
        let mut total = 0u64;
        for entry in WalkDir::new(&dataset.frames_dir).max_depth(1) {
            let entry = entry.map_err(|e| DomainError::FsFail(e.to_string()))?;
            let is_frame = parse_frame_index(&entry.file_name().to_string_lossy())
                .is_some_and(|index| index < dataset.frame_count);
            if is_frame && entry.file_type().is_file() {
                let metadata = entry
                    .metadata()
                    .map_err(|e| DomainError::FsFail(e.to_string()))?;
                total += metadata.len();
            }
        }
        Ok(total)
    }

    fn load_frame(&self, dataset: &Dataset, index: usize) -> Result<Frame, DomainError> {
        let path = dataset.frame_path(index);
        let rgb = image::open(&path).map_err(image_error(&path))?.to_rgb8();
        let (width, height) = rgb.dimensions();
        Frame::new(width, height, rgb.into_raw())
    }

    fn save_frame(&self, frame: &Frame, path: &Path) -> Result<(), DomainError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| DomainError::FsFail(format!("{}: {}", parent.display(), e)))?;
        }
        image::RgbImage::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(|| {
                DomainError::FrameMismatch(format!(
                    "{} bytes do not form a {}x{} RGB image",
                    frame.data.len(),
                    frame.width,
                    frame.height
                ))
            })?
            .save(path)
            .map_err(|e| DomainError::FsFail(format!("{}: {}", path.display(), e)))
    }

    fn copy_original(
        &self,
        dataset: &Dataset,
        index: usize,
        path: &Path,
    ) -> Result<(), DomainError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| DomainError::FsFail(format!("{}: {}", parent.display(), e)))?;
        }
        fs::copy(dataset.frame_path(index), path)
            .map(|_| ())
            .map_err(|e| DomainError::FsFail(format!("{}: {}", path.display(), e)))
    }
}
