//! Burst-referenced PAL demodulator.
//!
//! Turns the chroma plane from the transform separator into U and V:
//! 1. The colour burst of each line is correlated against the 4fSC
//!    reference to get the burst phase.
//! 2. The V-switch is read from the burst phase step to the previous line of
//!    the same field. The subcarrier advances ~270° per line and the swinging
//!    burst adds ±90°, so the step is ~180° on lines with V-switch +1 and
//!    ~360° otherwise.
//! 3. The burst sits at 180° ∓ 45° from +U, which gives the U reference
//!    phase. Chroma is multiplied by the U and V references and smoothed with
//!    a kernel that nulls the 2fSC product term.
//!
//! Luma is the composite minus the separated chroma.

use super::quadrature::YiqPlanes;
use super::ActiveArea;
use crate::config::Configuration;
use crate::frame::Plane;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

// 4fSC reference, one cycle.
const REF_SIN: [f32; 4] = [0.0, 1.0, 0.0, -1.0];
const REF_COS: [f32; 4] = [1.0, 0.0, -1.0, 0.0];
// Full-period smoothing, zero gain at 2fSC.
const SMOOTH_KERNEL: [f32; 5] = [0.125, 0.25, 0.25, 0.25, 0.125];

pub struct PalDemodulator {
    burst_start: usize,
    burst_end: usize,
}

impl PalDemodulator {
    pub fn new(config: &Configuration) -> Self {
        Self {
            burst_start: config.colour_burst_start,
            burst_end: config.colour_burst_end.min(config.field_width),
        }
    }

    /// Phase of the colour burst on `line`, relative to `sin(πh/2)`.
    pub fn burst_phase(&self, line: &[f32]) -> f32 {
        let burst = &line[self.burst_start..self.burst_end];
        let mean = burst.iter().sum::<f32>() / burst.len().max(1) as f32;
        let mut bs = 0.0f32;
        let mut bc = 0.0f32;
        for (k, &s) in burst.iter().enumerate() {
            let h = self.burst_start + k;
            bs += (s - mean) * REF_SIN[h % 4];
            bc += (s - mean) * REF_COS[h % 4];
        }
        bc.atan2(bs)
    }

    /// Burst phase and V-switch (+1 / -1) for each frame line inside `area`.
    pub fn line_references(&self, raw: &Plane, area: &ActiveArea) -> (Vec<f32>, Vec<f32>) {
        let mut phase = vec![0.0f32; raw.height];
        let mut vsw = vec![0.0f32; raw.height];
        for y in area.y0..area.y1 {
            phase[y] = self.burst_phase(raw.row(y));
        }

        let switch = |from: f32, to: f32| if (to - from).cos() < 0.0 { 1.0 } else { -1.0 };
        for y in area.y0..area.y1 {
            vsw[y] = if y >= area.y0 + 2 {
                switch(phase[y - 2], phase[y])
            } else if y + 2 < area.y1 {
                -switch(phase[y], phase[y + 2])
            } else {
                1.0
            };
        }
        (phase, vsw)
    }

    /// Demodulate `chroma` (the separated chroma of `raw`) into Y, U and V.
    pub fn demodulate(&self, raw: &Plane, chroma: &Plane, area: &ActiveArea) -> YiqPlanes {
        let mut out = YiqPlanes::new(raw.width, raw.height);
        let (phase, vsw) = self.line_references(raw, area);
        let width = area.width();
        let mut u_line = vec![0.0f32; width];
        let mut v_line = vec![0.0f32; width];

        for y in area.y0..area.y1 {
            let v = vsw[y];
            let u_phase = phase[y] - PI + v * FRAC_PI_4;
            let c = chroma.row(y);
            for (k, h) in (area.x0..area.x1).enumerate() {
                let arg = FRAC_PI_2 * (h % 4) as f32 + u_phase;
                u_line[k] = 2.0 * c[h] * arg.sin();
                v_line[k] = v * 2.0 * c[h] * arg.cos();
            }

            let raw_line = raw.row(y);
            for (k, h) in (area.x0..area.x1).enumerate() {
                out.y.set(h, y, raw_line[h] - c[h]);
                out.i.set(h, y, smooth(&u_line, k));
                out.q.set(h, y, smooth(&v_line, k));
            }
        }
        out
    }
}

#[inline]
fn smooth(line: &[f32], k: usize) -> f32 {
    let n = line.len();
    let mut acc = 0.0f32;
    for (t, &c) in SMOOTH_KERNEL.iter().enumerate() {
        let idx = (k + t).saturating_sub(2).min(n - 1);
        acc += line[idx] * c;
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{pal_chroma, small_pal_config};

    #[test]
    fn test_burst_phase_recovered() {
        let config = small_pal_config();
        let demod = PalDemodulator::new(&config);
        let mut line = vec![16384.0f32; config.field_width];
        for phi in [0.3f32, 1.7, -2.5] {
            for (h, s) in line.iter_mut().enumerate() {
                *s = 16384.0 + 3000.0 * (FRAC_PI_2 * h as f32 + phi).sin();
            }
            let got = demod.burst_phase(&line);
            assert!(((got - phi).sin()).abs() < 1e-3 && (got - phi).cos() > 0.999);
        }
    }

    #[test]
    fn test_demodulates_known_uv() {
        let config = small_pal_config();
        let area = ActiveArea::from_config(&config);
        let (raw, chroma, vsw) = pal_chroma(&config, 20000.0, 1200.0, -900.0);
        let demod = PalDemodulator::new(&config);

        let (_, got_vsw) = demod.line_references(&raw, &area);
        for y in area.y0..area.y1 {
            assert_eq!(got_vsw[y], vsw[y], "v-switch on line {y}");
        }

        let yuv = demod.demodulate(&raw, &chroma, &area);
        for y in area.y0..area.y1 {
            for x in (area.x0 + 4)..(area.x1 - 4) {
                assert!((yuv.i.at(x, y) - 1200.0).abs() < 5.0, "u at {x},{y}");
                assert!((yuv.q.at(x, y) + 900.0).abs() < 5.0, "v at {x},{y}");
                assert!((yuv.y.at(x, y) - 20000.0).abs() < 1e-2);
            }
        }
    }
}
