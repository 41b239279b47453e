//! Post filters: coring noise reduction and the chroma low-pass.
//!
//! # Coring
//! A high-pass residue (`x - lowpass(x)`) is clipped to the coring level and
//! subtracted, so small high-frequency noise is removed while edges larger
//! than the level keep all but `level` of their detail. Luma, I and Q are
//! cored independently. A level of 0 leaves the buffer untouched.
//!
//! # Chroma low-pass
//! Optional smoothing of I and Q only. The normal mode uses a narrower
//! filter for Q than for I (Q carries less bandwidth); the high-quality mode
//! uses the wider I filter for both.

use super::fir::SymmetricFir;
use super::quadrature::YiqPlanes;
use super::ActiveArea;
use crate::config::Configuration;

// Cutoffs are normalised to Nyquist at 4fSC.
// Luma coring: residue above ~2.8 MHz.
const LUMA_NR_CUTOFF: f32 = 0.39;
const LUMA_NR_TAPS: usize = 15;
// Chroma coring: residue above ~0.4 MHz.
const CHROMA_NR_CUTOFF: f32 = 0.056;
const CHROMA_NR_TAPS: usize = 33;
// Chroma low-pass: I to ~1.3 MHz, Q to ~0.6 MHz.
const COLOUR_LPF_I_CUTOFF: f32 = 0.18;
const COLOUR_LPF_I_TAPS: usize = 17;
const COLOUR_LPF_Q_CUTOFF: f32 = 0.084;
const COLOUR_LPF_Q_TAPS: usize = 25;

pub struct PostFilters {
    luma_level: f32,
    chroma_level: f32,
    luma_nr: SymmetricFir,
    chroma_nr: SymmetricFir,
    colour_lpf: Option<(SymmetricFir, SymmetricFir)>,
}

impl PostFilters {
    pub fn new(config: &Configuration) -> Self {
        let irescale = config.irescale();
        let colour_lpf = config.colour_lpf.then(|| {
            let i = SymmetricFir::lowpass(COLOUR_LPF_I_CUTOFF, COLOUR_LPF_I_TAPS);
            let q = if config.colour_lpf_hq {
                i.clone()
            } else {
                SymmetricFir::lowpass(COLOUR_LPF_Q_CUTOFF, COLOUR_LPF_Q_TAPS)
            };
            (i, q)
        });
        Self {
            luma_level: config.luma_nr * irescale,
            chroma_level: config.chroma_nr * irescale,
            luma_nr: SymmetricFir::lowpass(LUMA_NR_CUTOFF, LUMA_NR_TAPS),
            chroma_nr: SymmetricFir::lowpass(CHROMA_NR_CUTOFF, CHROMA_NR_TAPS),
            colour_lpf,
        }
    }

    /// Core one line segment in place.
    pub fn coring(line: &mut [f32], lowpass: &SymmetricFir, level: f32, scratch: &mut Vec<f32>) {
        if level <= 0.0 || line.is_empty() {
            return;
        }
        scratch.clear();
        scratch.resize(line.len(), 0.0);
        lowpass.apply(line, scratch);
        for (x, &lp) in line.iter_mut().zip(scratch.iter()) {
            let hp = (*x - lp).clamp(-level, level);
            *x -= hp;
        }
    }

    pub fn apply_colour_lpf(&self, yiq: &mut YiqPlanes, area: &ActiveArea) {
        let Some((fi, fq)) = &self.colour_lpf else {
            return;
        };
        let mut scratch = Vec::with_capacity(area.width());
        for y in area.y0..area.y1 {
            fi.apply_in_place(&mut yiq.i.row_mut(y)[area.x0..area.x1], &mut scratch);
            fq.apply_in_place(&mut yiq.q.row_mut(y)[area.x0..area.x1], &mut scratch);
        }
    }

    pub fn apply_luma_nr(&self, yiq: &mut YiqPlanes, area: &ActiveArea) {
        let mut scratch = Vec::with_capacity(area.width());
        for y in area.y0..area.y1 {
            let line = &mut yiq.y.row_mut(y)[area.x0..area.x1];
            Self::coring(line, &self.luma_nr, self.luma_level, &mut scratch);
        }
    }

    pub fn apply_chroma_nr(&self, yiq: &mut YiqPlanes, area: &ActiveArea) {
        let mut scratch = Vec::with_capacity(area.width());
        for y in area.y0..area.y1 {
            let line = &mut yiq.i.row_mut(y)[area.x0..area.x1];
            Self::coring(line, &self.chroma_nr, self.chroma_level, &mut scratch);
            let line = &mut yiq.q.row_mut(y)[area.x0..area.x1];
            Self::coring(line, &self.chroma_nr, self.chroma_level, &mut scratch);
        }
    }

    /// Chroma low-pass, then luma and chroma coring.
    pub fn process(&self, yiq: &mut YiqPlanes, area: &ActiveArea) {
        self.apply_colour_lpf(yiq, area);
        self.apply_luma_nr(yiq, area);
        self.apply_chroma_nr(yiq, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Plane;
    use rand::Rng;

    fn area() -> ActiveArea {
        ActiveArea {
            x0: 4,
            x1: 60,
            y0: 0,
            y1: 4,
        }
    }

    fn noisy_planes() -> YiqPlanes {
        let mut rng = rand::rng();
        let mut yiq = YiqPlanes::new(64, 4);
        for plane in [&mut yiq.y, &mut yiq.i, &mut yiq.q] {
            for v in plane.data.iter_mut() {
                *v = rng.random_range(-5000.0..5000.0);
            }
        }
        yiq
    }

    #[test]
    fn test_level_zero_is_bit_identical() {
        let mut config = Configuration::ntsc();
        config.luma_nr = 0.0;
        config.chroma_nr = 0.0;
        config.colour_lpf = false;
        let filters = PostFilters::new(&config);
        let mut yiq = noisy_planes();
        let before = yiq.clone();
        filters.process(&mut yiq, &area());
        assert_eq!(yiq.y.data, before.y.data);
        assert_eq!(yiq.i.data, before.i.data);
        assert_eq!(yiq.q.data, before.q.data);
    }

    #[test]
    fn test_coring_removes_small_noise_only() {
        let fir = SymmetricFir::lowpass(LUMA_NR_CUTOFF, LUMA_NR_TAPS);
        let mut scratch = Vec::new();

        // small alternating ripple is removed completely
        let mut ripple: Vec<f32> = (0..64).map(|i| if i % 2 == 0 { 10.0 } else { -10.0 }).collect();
        PostFilters::coring(&mut ripple, &fir, 100.0, &mut scratch);
        assert!(ripple[16..48].iter().all(|v| v.abs() < 1.0));

        // a large step keeps most of its height
        let mut step: Vec<f32> = (0..64).map(|i| if i < 32 { 0.0 } else { 10000.0 }).collect();
        PostFilters::coring(&mut step, &fir, 100.0, &mut scratch);
        assert!(step[40] > 9800.0);
        assert!(step[24] < 200.0);
    }

    #[test]
    fn test_colour_lpf_leaves_luma_alone() {
        let config = Configuration::ntsc();
        let mut filters = PostFilters::new(&config);
        filters.luma_level = 0.0;
        let mut yiq = noisy_planes();
        let y_before: Plane = yiq.y.clone();
        filters.apply_colour_lpf(&mut yiq, &area());
        assert_eq!(yiq.y.data, y_before.data);
    }
}
