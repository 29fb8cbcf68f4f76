//! Reconstruction quality metrics.
//!
//! All metrics work on samples normalized to [0, 1] so PSNR uses a peak of
//! 1.0 and SSIM uses a data range of 1.0.

pub mod ssim;

use crate::domain::errors::DomainError;
use crate::domain::model::Frame;

pub use ssim::ssim;

/// Scores of one decoded frame against its original
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameScore {
    pub mse: f64,
    pub psnr: f64,
    pub ssim: f64,
}

/// Mean squared error over every sample of every channel
pub fn mse(a: &Frame, b: &Frame) -> Result<f64, DomainError> {
    if !a.same_shape(b) {
        return Err(DomainError::FrameMismatch(format!(
            "cannot compare {}x{} with {}x{}",
            a.width, a.height, b.width, b.height
        )));
    }
    if a.data.is_empty() {
        return Err(DomainError::FrameMismatch("empty frame".to_string()));
    }

    let sum: f64 = a
        .data
        .iter()
        .zip(&b.data)
        .map(|(&x, &y)| {
            let diff = (x as f64 - y as f64) / 255.0;
            diff * diff
        })
        .sum();
    Ok(sum / a.data.len() as f64)
}

/// PSNR in dB for a peak of 1.0; identical frames give +inf
pub fn psnr_from_mse(mse: f64) -> f64 {
    if mse == 0.0 {
        f64::INFINITY
    } else {
        10.0 * (1.0 / mse).log10()
    }
}

/// Score one decoded frame against its original
pub fn score_frame(decoded: &Frame, original: &Frame) -> Result<FrameScore, DomainError> {
    let mse = mse(original, decoded)?;
    Ok(FrameScore {
        mse,
        psnr: psnr_from_mse(mse),
        ssim: ssim(original, decoded)?,
    })
}

/// Average per-frame scores of one sample (each metric averaged on its own)
pub fn score_frames(decoded: &[Frame], originals: &[Frame]) -> Result<FrameScore, DomainError> {
    if decoded.len() != originals.len() || decoded.is_empty() {
        return Err(DomainError::FrameMismatch(format!(
            "{} decoded frames for {} originals",
            decoded.len(),
            originals.len()
        )));
    }

    let scores = decoded
        .iter()
        .zip(originals)
        .map(|(d, o)| score_frame(d, o))
        .collect::<Result<Vec<_>, _>>()?;

    let n = scores.len() as f64;
    Ok(FrameScore {
        mse: scores.iter().map(|s| s.mse).sum::<f64>() / n,
        psnr: scores.iter().map(|s| s.psnr).sum::<f64>() / n,
        ssim: scores.iter().map(|s| s.ssim).sum::<f64>() / n,
    })
}
