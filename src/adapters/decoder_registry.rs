//! Registry of decode backends by name

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::adapters::decode_ffmpeg::FfmpegDecodeAdapter;
use crate::domain::model::BackendCapabilities;
use crate::ports::DecodePort;

/// Backend name → decoder
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    decoders: BTreeMap<String, Arc<dyn DecodePort>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The ffmpeg backends, plus libav when compiled in
    pub fn with_defaults(ffmpeg_bin: &Path) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FfmpegDecodeAdapter::seek(ffmpeg_bin)));
        registry.register(Arc::new(FfmpegDecodeAdapter::scan(ffmpeg_bin)));

        #[cfg(feature = "libav")]
        match crate::adapters::decode_libav::LibavDecodeAdapter::new() {
            Ok(adapter) => registry.register(Arc::new(adapter)),
            Err(e) => warn!("libav backend unavailable: {}", e),
        }

        registry
    }

    /// Register a decoder under its own backend name, replacing any previous one
    pub fn register(&mut self, decoder: Arc<dyn DecodePort>) {
        let name = decoder.backend().to_string();
        if self.decoders.insert(name.clone(), decoder).is_some() {
            warn!("Decode backend {} registered twice; keeping the latest", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DecodePort>> {
        self.decoders.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.decoders.keys().cloned().collect()
    }

    /// Capability flags of every registered backend, by name
    pub fn capabilities(&self) -> BTreeMap<String, BackendCapabilities> {
        self.decoders
            .iter()
            .map(|(name, decoder)| (name.clone(), decoder.capabilities()))
            .collect()
    }
}
