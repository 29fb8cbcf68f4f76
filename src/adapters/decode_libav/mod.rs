//! In-process decode backend over libav (`ffmpeg-next`)
//!
//! Seeks to the keyframe at or before the first requested timestamp, decodes
//! until past the last one and converts every kept frame to RGB24.

use std::path::Path;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;

/// libav-based decode adapter
pub struct LibavDecodeAdapter;

impl LibavDecodeAdapter {
    /// Create new adapter, initializing libav once
    pub fn new() -> Result<Self, DomainError> {
        ffmpeg_next::init()
            .map_err(|e| DomainError::DecodeFailed(format!("libav initialization failed: {}", e)))?;
        Ok(Self)
    }

    fn to_frame(rgb: &Video) -> Result<Frame, DomainError> {
        let width = rgb.width();
        let height = rgb.height();
        let row_bytes = width as usize * Frame::CHANNELS;
        let stride = rgb.stride(0);
        let plane = rgb.data(0);

        let mut data = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            data.extend_from_slice(&plane[start..start + row_bytes]);
        }
        Frame::new(width, height, data)
    }
}

fn libav_error(context: &str) -> impl Fn(ffmpeg_next::Error) -> DomainError + '_ {
    move |e| DomainError::DecodeFailed(format!("{}: {}", context, e))
}

impl DecodePort for LibavDecodeAdapter {
    fn backend(&self) -> &str {
        "libav"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            exact_seek: true,
            sparse_decode: false,
        }
    }

    fn decode(
        &self,
        video: &Path,
        timestamps: &[f64],
        tolerance_s: f64,
    ) -> Result<Vec<DecodedFrame>, DomainError> {
        let (first, last) = match (timestamps.first(), timestamps.last()) {
            (Some(first), Some(last)) => (*first - tolerance_s, *last + tolerance_s),
            _ => return Ok(Vec::new()),
        };

        let mut ictx = ffmpeg_next::format::input(&video).map_err(libav_error("open input"))?;

        let (video_index, time_base, parameters) = {
            let stream = ictx
                .streams()
                .best(ffmpeg_next::media::Type::Video)
                .ok_or_else(|| DomainError::DecodeFailed("no video stream".to_string()))?;
            (stream.index(), stream.time_base(), stream.parameters())
        };
        let seconds_per_tick = time_base.numerator() as f64 / time_base.denominator() as f64;

        let mut decoder = ffmpeg_next::codec::context::Context::from_parameters(parameters)
            .map_err(libav_error("decoder context"))?
            .decoder()
            .video()
            .map_err(libav_error("video decoder"))?;

        let mut scaler = scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            scaling::Flags::BILINEAR,
        )
        .map_err(libav_error("scaler"))?;

        let target = (first.max(0.0) * ffmpeg_next::ffi::AV_TIME_BASE as f64) as i64;
        ictx.seek(target, ..target).map_err(libav_error("seek"))?;

        let mut frames = Vec::new();
        let mut decoded = Video::empty();
        let mut done = false;

        let mut drain = |decoder: &mut ffmpeg_next::decoder::Video,
                         frames: &mut Vec<DecodedFrame>|
         -> Result<bool, DomainError> {
            while decoder.receive_frame(&mut decoded).is_ok() {
                let pts = match decoded.timestamp().or(decoded.pts()) {
                    Some(pts) => pts as f64 * seconds_per_tick,
                    None => continue,
                };
                if pts < first {
                    continue;
                }
                if pts > last {
                    return Ok(true);
                }
                let mut rgb = Video::empty();
                scaler.run(&decoded, &mut rgb).map_err(libav_error("scale"))?;
                frames.push(DecodedFrame {
                    pts,
                    frame: Self::to_frame(&rgb)?,
                });
            }
            Ok(false)
        };

        for (stream, packet) in ictx.packets() {
            if stream.index() != video_index {
                continue;
            }
            decoder.send_packet(&packet).map_err(libav_error("send packet"))?;
            if drain(&mut decoder, &mut frames)? {
                done = true;
                break;
            }
        }

        if !done {
            decoder.send_eof().map_err(libav_error("flush"))?;
            drain(&mut decoder, &mut frames)?;
        }

        Ok(frames)
    }
}
