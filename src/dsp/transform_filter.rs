//! Transform-Domain Chroma Separator
//!
//! # Purpose
//! Separates chroma from a PAL field by looking at its 2D spectrum. A real
//! modulated chroma signal is symmetric about the subcarrier (fSC
//! horizontally, a quarter of the field-line rate vertically), while luma
//! detail that leaks into the chroma band generally is not.
//!
//! # Design Notes
//! - Each field is cut into tiles with 50% overlap in both axes. Every tile
//!   is multiplied by a raised-cosine window whose overlapping copies sum to
//!   one, so the filtered tiles can be added straight back together.
//! - For every spectrum point in the horizontal chroma band (X/8..=X/4) the
//!   magnitude is compared with its mirror point. Points that are their own
//!   mirror are carriers and are always kept. Other points are kept in pairs
//!   when the smaller magnitude is at least `threshold` times the larger.
//! - The kept half-spectrum is completed with its Hermitian conjugate before
//!   the inverse transform, so the result is real.
//! - Tiles that stick out of the active area read zeros there and only write
//!   back inside it.
//!
//! # Assumptions
//! - 4fSC sampling, so the horizontal subcarrier sits at X/4.
//! - Field line `l` of field `f` is frame line `2l + f`.

use super::utils::raised_cosine_window;
use super::ActiveArea;
use crate::frame::Plane;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

pub struct TransformFilter {
    threshold_sq: f32,
    x_tile: usize,
    y_tile: usize,
    window: Vec<f32>,
    fft_x: Arc<dyn Fft<f32>>,
    fft_y: Arc<dyn Fft<f32>>,
    ifft_x: Arc<dyn Fft<f32>>,
    ifft_y: Arc<dyn Fft<f32>>,
}

struct TileBuffers {
    spectrum: Vec<Complex<f32>>,
    filtered: Vec<Complex<f32>>,
    transposed: Vec<Complex<f32>>,
}

impl TransformFilter {
    /// Tile sizes must already be validated (X a multiple of 8, Y even).
    pub fn new(threshold: f32, y_tile: usize, x_tile: usize) -> Self {
        let wx = raised_cosine_window(x_tile);
        let wy = raised_cosine_window(y_tile);
        let mut window = vec![0.0f32; x_tile * y_tile];
        for y in 0..y_tile {
            for x in 0..x_tile {
                window[y * x_tile + x] = wy[y] * wx[x];
            }
        }

        let mut planner = FftPlanner::<f32>::new();
        Self {
            threshold_sq: threshold * threshold,
            x_tile,
            y_tile,
            window,
            fft_x: planner.plan_fft_forward(x_tile),
            fft_y: planner.plan_fft_forward(y_tile),
            ifft_x: planner.plan_fft_inverse(x_tile),
            ifft_y: planner.plan_fft_inverse(y_tile),
        }
    }

    /// Chroma estimate for both fields of a frame raster.
    pub fn filter_frame(&self, raw: &Plane, area: &ActiveArea) -> Plane {
        let mut out = Plane::new(raw.width, raw.height);
        for parity in 0..2 {
            let first = (area.y0 + 1).saturating_sub(parity) / 2;
            let last = (area.y1 + 1).saturating_sub(parity) / 2;
            self.filter_field(raw, parity, first, last, area.x0, area.x1, &mut out);
        }
        out
    }

    /// Filter field `parity` over field lines `first..last` and columns
    /// `x0..x1`, adding the result into `out` (a frame raster).
    #[allow(clippy::too_many_arguments)]
    pub fn filter_field(
        &self,
        raw: &Plane,
        parity: usize,
        first: usize,
        last: usize,
        x0: usize,
        x1: usize,
        out: &mut Plane,
    ) {
        let (xt, yt) = (self.x_tile as isize, self.y_tile as isize);
        let (hx, hy) = (xt / 2, yt / 2);
        let n = self.x_tile * self.y_tile;
        let mut buf = TileBuffers {
            spectrum: vec![Complex::new(0.0, 0.0); n],
            filtered: vec![Complex::new(0.0, 0.0); n],
            transposed: vec![Complex::new(0.0, 0.0); n],
        };
        let norm = n as f32;
        let frame_line = |l: isize| (2 * l) as usize + parity;

        let mut tile_y = first as isize - hy;
        while tile_y < last as isize {
            let mut tile_x = x0 as isize - hx;
            while tile_x < x1 as isize {
                let sx = (x0 as isize - tile_x).max(0);
                let ex = (x1 as isize - tile_x).min(xt);
                let sy = (first as isize - tile_y).max(0);
                let ey = (last as isize - tile_y).min(yt);

                buf.spectrum.iter_mut().for_each(|c| *c = Complex::new(0.0, 0.0));
                for y in sy..ey {
                    let row = raw.row(frame_line(tile_y + y));
                    for x in sx..ex {
                        let k = (y * xt + x) as usize;
                        buf.spectrum[k] = Complex::new(row[(tile_x + x) as usize] * self.window[k], 0.0);
                    }
                }

                self.transform(&mut buf.spectrum, &mut buf.transposed, true);
                self.apply_filter(&buf.spectrum, &mut buf.filtered);
                self.transform(&mut buf.filtered, &mut buf.transposed, false);

                for y in sy..ey {
                    let dst = out.row_mut(frame_line(tile_y + y));
                    for x in sx..ex {
                        let k = (y * xt + x) as usize;
                        dst[(tile_x + x) as usize] += buf.filtered[k].re / norm;
                    }
                }
                tile_x += hx;
            }
            tile_y += hy;
        }
    }

    /// 2D FFT in place: rows, then columns through a transposed copy.
    fn transform(&self, data: &mut [Complex<f32>], scratch: &mut [Complex<f32>], forward: bool) {
        let (fx, fy) = if forward {
            (&self.fft_x, &self.fft_y)
        } else {
            (&self.ifft_x, &self.ifft_y)
        };
        let (xt, yt) = (self.x_tile, self.y_tile);

        fx.process(data);
        for y in 0..yt {
            for x in 0..xt {
                scratch[x * yt + y] = data[y * xt + x];
            }
        }
        fy.process(scratch);
        for x in 0..xt {
            for y in 0..yt {
                data[y * xt + x] = scratch[x * yt + y];
            }
        }
    }

    /// Keep symmetric chroma pairs from `input` into `output`.
    fn apply_filter(&self, input: &[Complex<f32>], output: &mut [Complex<f32>]) {
        let (xt, yt) = (self.x_tile, self.y_tile);
        output.iter_mut().for_each(|c| *c = Complex::new(0.0, 0.0));

        for y in 0..yt {
            // reflect around a quarter of the line rate vertically
            let y_ref = (yt / 2 + yt - y) % yt;
            for x in xt / 8..=xt / 4 {
                // reflect around fSC horizontally
                let x_ref = xt / 2 - x;
                let in_val = input[y * xt + x];
                let ref_val = input[y_ref * xt + x_ref];

                if x == x_ref && y == y_ref {
                    output[y * xt + x] = in_val;
                    continue;
                }

                let m_in = in_val.norm_sqr();
                let m_ref = ref_val.norm_sqr();
                if m_in < m_ref * self.threshold_sq || m_ref < m_in * self.threshold_sq {
                    continue;
                }

                output[y * xt + x] = in_val;
                output[y_ref * xt + x_ref] = ref_val;
            }
        }

        // Hermitian completion so the inverse is real. Kept pairs reach out
        // to X/2 - X/8.
        for y in 0..yt {
            for x in xt / 8..=xt / 2 - xt / 8 {
                let v = output[y * xt + x];
                output[((yt - y) % yt) * xt + (xt - x)] = v.conj();
            }
        }
    }
}
