use std::sync::Arc;

use crate::adapters::{DecoderRegistry, FfmpegEncoderAdapter, ImageDatasetAdapter};
use crate::app::{inspect_interactor::InspectInteractor, sweep_interactor::SweepInteractor};
use crate::config_initialization::SweepConfig;
use crate::ports::{DatasetPort, EncodePort};

pub trait AppContainer: Send + Sync {
    fn sweep_interactor(&self) -> Arc<SweepInteractor>;
    fn inspect_interactor(&self) -> Arc<InspectInteractor>;
    fn decoders(&self) -> &DecoderRegistry;
}

/// Wires the ffmpeg and filesystem adapters into the interactors
pub struct DefaultAppContainer {
    sweep_interactor: Arc<SweepInteractor>,
    inspect_interactor: Arc<InspectInteractor>,
    decoders: DecoderRegistry,
}

impl DefaultAppContainer {
    pub fn new(config: Arc<SweepConfig>) -> Self {
        let encoder = Arc::new(FfmpegEncoderAdapter::new(&config.ffmpeg_bin));
        let datasets = Arc::new(ImageDatasetAdapter::new(&config.data_root, config.default_fps));
        let decoders = DecoderRegistry::with_defaults(&config.ffmpeg_bin);

        Self::with_ports(config, encoder, datasets, decoders)
    }

    /// Build a container around caller-supplied ports
    pub fn with_ports(
        config: Arc<SweepConfig>,
        encoder: Arc<dyn EncodePort>,
        datasets: Arc<dyn DatasetPort>,
        decoders: DecoderRegistry,
    ) -> Self {
        let sweep_interactor = Arc::new(SweepInteractor::new(
            Arc::clone(&config),
            Arc::clone(&encoder),
            Arc::clone(&datasets),
            decoders.clone(),
        ));

        let inspect_interactor = Arc::new(InspectInteractor::new(Arc::clone(&datasets)));

        Self {
            sweep_interactor,
            inspect_interactor,
            decoders,
        }
    }
}

impl AppContainer for DefaultAppContainer {
    fn sweep_interactor(&self) -> Arc<SweepInteractor> {
        Arc::clone(&self.sweep_interactor)
    }

    fn inspect_interactor(&self) -> Arc<InspectInteractor> {
        Arc::clone(&self.inspect_interactor)
    }

    fn decoders(&self) -> &DecoderRegistry {
        &self.decoders
    }
}
