//! Structural similarity over a uniform window.
//!
//! Local statistics come from summed-area tables so each window costs a
//! constant number of lookups. Variances and covariance use the sample
//! estimator (`N / (N - 1)` correction) and only windows lying fully inside
//! the image contribute to the mean. Channels are scored independently and
//! averaged.

use rayon::prelude::*;

use crate::domain::errors::DomainError;
use crate::domain::model::Frame;

/// Side of the square averaging window
pub const WINDOW_SIZE: usize = 7;

const K1: f64 = 0.01;
const K2: f64 = 0.03;
/// Samples are normalized to [0, 1]
const DATA_RANGE: f64 = 1.0;

/// Summed-area tables of one channel pair
struct Moments {
    width: usize,
    x: Vec<f64>,
    y: Vec<f64>,
    xx: Vec<f64>,
    yy: Vec<f64>,
    xy: Vec<f64>,
}

impl Moments {
    fn build(a: &Frame, b: &Frame, channel: usize) -> Self {
        let width = a.width as usize;
        let height = a.height as usize;
        let stride = width + 1;
        let len = stride * (height + 1);

        let mut moments = Self {
            width: stride,
            x: vec![0.0; len],
            y: vec![0.0; len],
            xx: vec![0.0; len],
            yy: vec![0.0; len],
            xy: vec![0.0; len],
        };

        for row in 0..height {
            let (mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for col in 0..width {
                let offset = (row * width + col) * Frame::CHANNELS + channel;
                let px = a.data[offset] as f64 / 255.0;
                let py = b.data[offset] as f64 / 255.0;
                sx += px;
                sy += py;
                sxx += px * px;
                syy += py * py;
                sxy += px * py;

                let above = row * stride + col + 1;
                let here = (row + 1) * stride + col + 1;
                moments.x[here] = moments.x[above] + sx;
                moments.y[here] = moments.y[above] + sy;
                moments.xx[here] = moments.xx[above] + sxx;
                moments.yy[here] = moments.yy[above] + syy;
                moments.xy[here] = moments.xy[above] + sxy;
            }
        }

        moments
    }

    fn window_sum(&self, table: &[f64], top: usize, left: usize) -> f64 {
        let bottom = top + WINDOW_SIZE;
        let right = left + WINDOW_SIZE;
        table[bottom * self.width + right] - table[top * self.width + right]
            - table[bottom * self.width + left]
            + table[top * self.width + left]
    }

    fn window_ssim(&self, top: usize, left: usize) -> f64 {
        let n = (WINDOW_SIZE * WINDOW_SIZE) as f64;
        let cov_norm = n / (n - 1.0);
        let c1 = (K1 * DATA_RANGE).powi(2);
        let c2 = (K2 * DATA_RANGE).powi(2);

        let ux = self.window_sum(&self.x, top, left) / n;
        let uy = self.window_sum(&self.y, top, left) / n;
        let uxx = self.window_sum(&self.xx, top, left) / n;
        let uyy = self.window_sum(&self.yy, top, left) / n;
        let uxy = self.window_sum(&self.xy, top, left) / n;

        let vx = cov_norm * (uxx - ux * ux);
        let vy = cov_norm * (uyy - uy * uy);
        let vxy = cov_norm * (uxy - ux * uy);

        let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
        let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
        numerator / denominator
    }
}

fn channel_ssim(a: &Frame, b: &Frame, channel: usize) -> f64 {
    let moments = Moments::build(a, b, channel);
    let rows = a.height as usize - WINDOW_SIZE + 1;
    let cols = a.width as usize - WINDOW_SIZE + 1;

    let total: f64 = (0..rows)
        .into_par_iter()
        .map(|top| (0..cols).map(|left| moments.window_ssim(top, left)).sum::<f64>())
        .sum();

    total / (rows * cols) as f64
}

/// Mean SSIM of two RGB frames, in [-1, 1]
pub fn ssim(a: &Frame, b: &Frame) -> Result<f64, DomainError> {
    if !a.same_shape(b) {
        return Err(DomainError::FrameMismatch(format!(
            "cannot compare {}x{} with {}x{}",
            a.width, a.height, b.width, b.height
        )));
    }
    if (a.width as usize) < WINDOW_SIZE || (a.height as usize) < WINDOW_SIZE {
        return Err(DomainError::FrameMismatch(format!(
            "{}x{} is smaller than the {}x{} SSIM window",
            a.width, a.height, WINDOW_SIZE, WINDOW_SIZE
        )));
    }

    let per_channel: Vec<f64> = (0..Frame::CHANNELS)
        .map(|channel| channel_ssim(a, b, channel))
        .collect();
    Ok(per_channel.iter().sum::<f64>() / per_channel.len() as f64)
}
