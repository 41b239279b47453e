//! Dense Motion Estimator
//!
//! # Purpose
//! Produces a per-pixel motion map in [0, 1] (0 = stationary, 1 = moving)
//! that gates the temporal candidates of the 3D comb.
//!
//! # Model
//! 1. **Luma**: the first field of each frame (raw + 2D chroma estimate, which
//!    cancels the subcarrier) normalised to black = 0, white = 1. Comparing
//!    like fields one frame apart keeps the interlace offset out of the flow.
//! 2. **Flow**: pyramidal dense Lucas-Kanade. Each level refines the upsampled
//!    flow of the level below with a few Gauss-Newton steps over a square
//!    window of summed structure tensors.
//! 3. **Smoothing**: a wide Gaussian blur over both flow components, so
//!    isolated noisy vectors do not switch the 3D filter and scene cuts
//!    degrade smoothly.
//! 4. **Magnitude**: `sqrt((2 dx)^2 + dy^2)` clamped to [0, 1]. Horizontal
//!    motion counts double because one field line spans two frame lines of
//!    height but only one sample of width.
//!
//! # Lifecycle
//! - **Bootstrap**: with no earlier frame the whole map is 0, which lets the
//!   3D comb assume a static picture.
//! - **Active**: every later frame is compared with the frame before it.

use super::utils::{blur_separable, convolve_cols, convolve_rows, gaussian_kernel};
use super::ActiveArea;
use crate::frame::Plane;

// Pyramid levels (level 0 is full resolution).
const PYRAMID_LEVELS: usize = 3;
// Smallest pyramid level edge worth refining on.
const PYRAMID_MIN_EDGE: usize = 8;
// Half-width of the Lucas-Kanade window.
const WINDOW_RADIUS: usize = 3;
// Gauss-Newton iterations per level.
const ITERATIONS: usize = 3;
// Structure tensors with a smaller determinant are treated as flat.
const DET_EPSILON: f32 = 1e-9;
// Largest per-step update in pixels.
const MAX_STEP: f32 = 2.0;
// Flow smoothing.
const BLUR_SIGMA: f32 = 3.5;
const BLUR_TAPS: usize = 21;
// Weight of horizontal flow in the magnitude.
const HORIZONTAL_WEIGHT: f32 = 2.0;

pub struct MotionEstimator {
    window: Vec<f32>,
    blur: Vec<f32>,
}

impl Default for MotionEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionEstimator {
    pub fn new() -> Self {
        let taps = 2 * WINDOW_RADIUS + 1;
        Self {
            window: vec![1.0 / taps as f32; taps],
            blur: gaussian_kernel(BLUR_SIGMA, BLUR_TAPS),
        }
    }

    /// Normalised luma of the first-field lines inside `area`.
    pub fn field_luma(raw: &Plane, c2: &Plane, area: &ActiveArea, black: f32, white: f32) -> Plane {
        let first = area.y0 + area.y0 % 2;
        let rows = (first..area.y1).step_by(2).count();
        let range = (white - black).max(1.0);
        let mut out = Plane::new(area.width(), rows);
        for (r, y) in (first..area.y1).step_by(2).enumerate() {
            let src = &raw.row(y)[area.x0..area.x1];
            let chroma = &c2.row(y)[area.x0..area.x1];
            for ((d, &s), &c) in out.row_mut(r).iter_mut().zip(src).zip(chroma) {
                *d = (s + c - black) / range;
            }
        }
        out
    }

    /// Dense flow `(dx, dy)` taking `prev` onto `cur`.
    pub fn flow(&self, prev: &Plane, cur: &Plane) -> (Plane, Plane) {
        let prev_pyr = pyramid(prev);
        let cur_pyr = pyramid(cur);
        let levels = prev_pyr.len().min(cur_pyr.len());

        let mut dx = Plane::new(prev_pyr[levels - 1].width, prev_pyr[levels - 1].height);
        let mut dy = dx.clone();

        for level in (0..levels).rev() {
            let i_img = &prev_pyr[level];
            let j_img = &cur_pyr[level];
            if dx.width != i_img.width || dx.height != i_img.height {
                dx = upsample_flow(&dx, i_img.width, i_img.height);
                dy = upsample_flow(&dy, i_img.width, i_img.height);
            }
            self.refine(i_img, j_img, &mut dx, &mut dy);
        }
        (dx, dy)
    }

    fn refine(&self, i_img: &Plane, j_img: &Plane, dx: &mut Plane, dy: &mut Plane) {
        let w = i_img.width;
        let h = i_img.height;
        let (gx, gy) = gradients(i_img);

        let n = w * h;
        let mut sxx = vec![0.0f32; n];
        let mut sxy = vec![0.0f32; n];
        let mut syy = vec![0.0f32; n];
        for k in 0..n {
            sxx[k] = gx.data[k] * gx.data[k];
            sxy[k] = gx.data[k] * gy.data[k];
            syy[k] = gy.data[k] * gy.data[k];
        }
        self.window_sum(&mut sxx, w);
        self.window_sum(&mut sxy, w);
        self.window_sum(&mut syy, w);

        let mut sxt = vec![0.0f32; n];
        let mut syt = vec![0.0f32; n];
        for _ in 0..ITERATIONS {
            for y in 0..h {
                for x in 0..w {
                    let k = y * w + x;
                    let warped = sample_bilinear(j_img, x as f32 + dx.data[k], y as f32 + dy.data[k]);
                    let it = warped - i_img.data[k];
                    sxt[k] = gx.data[k] * it;
                    syt[k] = gy.data[k] * it;
                }
            }
            self.window_sum(&mut sxt, w);
            self.window_sum(&mut syt, w);

            for k in 0..n {
                let det = sxx[k] * syy[k] - sxy[k] * sxy[k];
                if det.abs() < DET_EPSILON {
                    continue;
                }
                let ux = -(syy[k] * sxt[k] - sxy[k] * syt[k]) / det;
                let uy = -(sxx[k] * syt[k] - sxy[k] * sxt[k]) / det;
                dx.data[k] += ux.clamp(-MAX_STEP, MAX_STEP);
                dy.data[k] += uy.clamp(-MAX_STEP, MAX_STEP);
            }
        }
    }

    fn window_sum(&self, data: &mut [f32], width: usize) {
        let mut tmp = vec![0.0f32; data.len()];
        convolve_rows(data, width, &self.window, &mut tmp);
        convolve_cols(&tmp, width, &self.window, data);
    }

    /// Smoothed motion magnitude on the field-luma grid.
    pub fn field_motion(&self, prev: &Plane, cur: &Plane) -> Plane {
        let (mut dx, mut dy) = self.flow(prev, cur);
        blur_separable(&mut dx.data, dx.width, &self.blur);
        blur_separable(&mut dy.data, dy.width, &self.blur);

        let mut out = Plane::new(dx.width, dx.height);
        for ((o, &fx), &fy) in out.data.iter_mut().zip(&dx.data).zip(&dy.data) {
            let hx = fx * HORIZONTAL_WEIGHT;
            *o = (hx * hx + fy * fy).sqrt().clamp(0.0, 1.0);
        }
        out
    }

    /// Frame-sized motion map. `prev` is `None` until an earlier frame exists.
    pub fn motion_map(
        &self,
        prev: Option<&Plane>,
        cur: &Plane,
        area: &ActiveArea,
        width: usize,
        height: usize,
    ) -> Plane {
        let mut map = Plane::new(width, height);
        let prev = match prev {
            Some(p) if p.width == cur.width && p.height == cur.height && cur.height > 0 => p,
            _ => {
                log::debug!("motion map bootstrap: no reference frame");
                return map;
            }
        };

        let field = self.field_motion(prev, cur);
        let first = area.y0 + area.y0 % 2;
        for y in area.y0..area.y1 {
            let r = (y.saturating_sub(first) / 2).min(field.height - 1);
            let src = field.row(r);
            map.row_mut(y)[area.x0..area.x1].copy_from_slice(&src[..area.width()]);
        }
        map
    }
}

// =============================================================================
// IMAGE HELPERS
// =============================================================================

fn pyramid(base: &Plane) -> Vec<Plane> {
    let mut levels = vec![base.clone()];
    while levels.len() < PYRAMID_LEVELS {
        let last = &levels[levels.len() - 1];
        if last.width / 2 < PYRAMID_MIN_EDGE || last.height / 2 < PYRAMID_MIN_EDGE {
            break;
        }
        let next = downsample(last);
        levels.push(next);
    }
    levels
}

fn downsample(src: &Plane) -> Plane {
    let w = src.width / 2;
    let h = src.height / 2;
    let mut out = Plane::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let s = src.at(2 * x, 2 * y)
                + src.at(2 * x + 1, 2 * y)
                + src.at(2 * x, 2 * y + 1)
                + src.at(2 * x + 1, 2 * y + 1);
            out.set(x, y, s * 0.25);
        }
    }
    out
}

fn upsample_flow(src: &Plane, width: usize, height: usize) -> Plane {
    let mut out = Plane::new(width, height);
    for y in 0..height {
        let sy = (y / 2).min(src.height - 1);
        for x in 0..width {
            let sx = (x / 2).min(src.width - 1);
            out.set(x, y, src.at(sx, sy) * 2.0);
        }
    }
    out
}

fn gradients(img: &Plane) -> (Plane, Plane) {
    let w = img.width;
    let h = img.height;
    let mut gx = Plane::new(w, h);
    let mut gy = Plane::new(w, h);
    for y in 0..h {
        let yu = y.saturating_sub(1);
        let yd = (y + 1).min(h - 1);
        for x in 0..w {
            let xl = x.saturating_sub(1);
            let xr = (x + 1).min(w - 1);
            let sx = (xr - xl).max(1) as f32;
            let sy = (yd - yu).max(1) as f32;
            gx.set(x, y, (img.at(xr, y) - img.at(xl, y)) / sx);
            gy.set(x, y, (img.at(x, yd) - img.at(x, yu)) / sy);
        }
    }
    (gx, gy)
}

#[inline]
fn sample_bilinear(img: &Plane, x: f32, y: f32) -> f32 {
    let max_x = (img.width - 1) as f32;
    let max_y = (img.height - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(img.width - 1);
    let y1 = (y0 + 1).min(img.height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let top = img.at(x0, y0) * (1.0 - fx) + img.at(x1, y0) * fx;
    let bottom = img.at(x0, y1) * (1.0 - fx) + img.at(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture(width: usize, height: usize, shift: f32) -> Plane {
        let mut p = Plane::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let xf = x as f32 - shift;
                let yf = y as f32;
                let v = 0.5
                    + 0.2 * (xf * 0.21).sin() * (yf * 0.33).cos()
                    + 0.15 * (xf * 0.07 + yf * 0.11).sin();
                p.set(x, y, v);
            }
        }
        p
    }

    #[test]
    fn test_identical_frames_have_no_motion() {
        let est = MotionEstimator::new();
        let a = texture(96, 48, 0.0);
        let m = est.field_motion(&a, &a);
        assert!(m.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_horizontal_shift_reads_as_motion() {
        let est = MotionEstimator::new();
        let a = texture(96, 48, 0.0);
        let b = texture(96, 48, 4.0);
        let m = est.field_motion(&a, &b);
        let mut sum = 0.0;
        let mut count = 0;
        for y in 12..36 {
            for x in 24..72 {
                sum += m.at(x, y);
                count += 1;
            }
        }
        assert!(sum / count as f32 > 0.5);
    }

    #[test]
    fn test_bootstrap_map_is_stationary() {
        let est = MotionEstimator::new();
        let area = ActiveArea {
            x0: 4,
            x1: 20,
            y0: 2,
            y1: 10,
        };
        let cur = Plane::new(16, 4);
        let map = est.motion_map(None, &cur, &area, 24, 12);
        assert_eq!(map.width, 24);
        assert!(map.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_field_luma_normalises_first_field() {
        let area = ActiveArea {
            x0: 2,
            x1: 6,
            y0: 1,
            y1: 7,
        };
        let mut raw = Plane::new(8, 8);
        raw.fill(200.0);
        let c2 = Plane::new(8, 8);
        let luma = MotionEstimator::field_luma(&raw, &c2, &area, 100.0, 300.0);
        // first-field lines 2, 4 and 6
        assert_eq!((luma.width, luma.height), (4, 3));
        assert!(luma.data.iter().all(|&v| (v - 0.5).abs() < 1e-6));
    }
}
