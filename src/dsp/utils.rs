//! Windows and separable convolution shared by the image stages.

use std::f32::consts::PI;

/// Raised-cosine window sampled at bin centres, so the sum of two copies
/// offset by half a window is exactly 1.
pub fn raised_cosine_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * (i as f32 + 0.5) / n as f32).cos()))
        .collect()
}

/// Normalised Gaussian kernel with `taps` coefficients.
pub fn gaussian_kernel(sigma: f32, taps: usize) -> Vec<f32> {
    let half = (taps as f32 - 1.0) * 0.5;
    let denom = 2.0 * sigma.max(1e-3) * sigma.max(1e-3);
    let mut k: Vec<f32> = (0..taps)
        .map(|i| {
            let d = i as f32 - half;
            (-(d * d) / denom).exp()
        })
        .collect();
    let sum: f32 = k.iter().sum();
    for v in &mut k {
        *v /= sum;
    }
    k
}

/// Convolve each row of a `width`-wide image with an odd symmetric kernel,
/// replicating edge samples.
pub fn convolve_rows(data: &[f32], width: usize, kernel: &[f32], out: &mut [f32]) {
    let half = kernel.len() / 2;
    for (src, dst) in data.chunks_exact(width).zip(out.chunks_exact_mut(width)) {
        for (x, d) in dst.iter_mut().enumerate() {
            let mut acc = 0.0f32;
            for (k, &c) in kernel.iter().enumerate() {
                let xi = (x + k).saturating_sub(half).min(width - 1);
                acc += src[xi] * c;
            }
            *d = acc;
        }
    }
}

/// Convolve each column of a `width`-wide image with an odd symmetric kernel,
/// replicating edge samples.
pub fn convolve_cols(data: &[f32], width: usize, kernel: &[f32], out: &mut [f32]) {
    let height = data.len() / width.max(1);
    let half = kernel.len() / 2;
    for y in 0..height {
        let dst = &mut out[y * width..(y + 1) * width];
        dst.iter_mut().for_each(|v| *v = 0.0);
        for (k, &c) in kernel.iter().enumerate() {
            let yi = (y + k).saturating_sub(half).min(height - 1);
            let src = &data[yi * width..(yi + 1) * width];
            for (d, &s) in dst.iter_mut().zip(src) {
                *d += s * c;
            }
        }
    }
}

/// Separable 2D smoothing in place.
pub fn blur_separable(data: &mut [f32], width: usize, kernel: &[f32]) {
    if width == 0 || data.is_empty() {
        return;
    }
    let mut tmp = vec![0.0f32; data.len()];
    convolve_rows(data, width, kernel, &mut tmp);
    convolve_cols(&tmp, width, kernel, data);
}
