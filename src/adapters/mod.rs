// Adapters - External system implementations

pub mod decode_ffmpeg;
#[cfg(feature = "libav")]
pub mod decode_libav;
pub mod decoder_registry;
pub mod exec_ffmpeg;
pub mod fs_images;
pub mod toml_config;

// Re-export adapters
pub use decode_ffmpeg::{FfmpegDecodeAdapter, SeekMode};
#[cfg(feature = "libav")]
pub use decode_libav::LibavDecodeAdapter;
pub use decoder_registry::DecoderRegistry;
pub use exec_ffmpeg::FfmpegEncoderAdapter;
pub use fs_images::ImageDatasetAdapter;
pub use toml_config::SweepFileConfig;
