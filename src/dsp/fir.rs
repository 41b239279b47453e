//! Symmetric FIR filters for the post-filter stage.
//!
//! All filters here are odd-length, linear-phase windowed-sinc designs
//! applied centred on each sample, so output sample `h` lines up with input
//! sample `h` and no delay compensation is needed. Line ends are extended by
//! repeating the first and last sample.

use std::f32::consts::PI;

/// Design a windowed-sinc (Hamming) lowpass.
///
/// `cutoff` is normalised to Nyquist (0..1). Coefficients sum to 1.
pub fn design_lowpass(cutoff: f32, num_taps: usize) -> Vec<f32> {
    let taps = num_taps.max(1) | 1;
    let half = (taps - 1) as f32 / 2.0;
    let mut coeffs: Vec<f32> = (0..taps)
        .map(|i| {
            let n = i as f32 - half;
            let window = if taps > 1 {
                0.54 - 0.46 * (2.0 * PI * i as f32 / (taps - 1) as f32).cos()
            } else {
                1.0
            };
            let sinc = if n.abs() < 1e-6 {
                cutoff
            } else {
                (PI * cutoff * n).sin() / (PI * n)
            };
            sinc * window
        })
        .collect();

    let sum: f32 = coeffs.iter().sum();
    if sum.abs() > 1e-12 {
        for c in &mut coeffs {
            *c /= sum;
        }
    }
    coeffs
}

#[derive(Debug, Clone)]
pub struct SymmetricFir {
    coeffs: Vec<f32>,
}

impl SymmetricFir {
    pub fn lowpass(cutoff: f32, num_taps: usize) -> Self {
        Self {
            coeffs: design_lowpass(cutoff, num_taps),
        }
    }

    pub fn taps(&self) -> usize {
        self.coeffs.len()
    }

    /// Filter `input` into `output` (same length).
    pub fn apply(&self, input: &[f32], output: &mut [f32]) {
        let n = input.len();
        if n == 0 {
            return;
        }
        let half = self.coeffs.len() / 2;
        for (h, out) in output.iter_mut().enumerate().take(n) {
            let mut acc = 0.0f32;
            for (k, &c) in self.coeffs.iter().enumerate() {
                let idx = (h + k).saturating_sub(half).min(n - 1);
                acc += input[idx] * c;
            }
            *out = acc;
        }
    }

    /// Filter a slice in place using `scratch` as the input copy.
    pub fn apply_in_place(&self, data: &mut [f32], scratch: &mut Vec<f32>) {
        scratch.clear();
        scratch.extend_from_slice(data);
        self.apply(scratch, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowpass_passes_dc() {
        let fir = SymmetricFir::lowpass(0.18, 17);
        let input = vec![3.0f32; 64];
        let mut out = vec![0.0f32; 64];
        fir.apply(&input, &mut out);
        assert!(out.iter().all(|v| (v - 3.0).abs() < 1e-4));
    }

    #[test]
    fn test_lowpass_rejects_nyquist() {
        let fir = SymmetricFir::lowpass(0.18, 17);
        let input: Vec<f32> = (0..128).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let mut out = vec![0.0f32; 128];
        fir.apply(&input, &mut out);
        let interior = &out[20..108];
        assert!(interior.iter().all(|v| v.abs() < 0.02));
    }

    #[test]
    fn test_taps_forced_odd() {
        assert_eq!(SymmetricFir::lowpass(0.3, 16).taps(), 17);
    }
}
