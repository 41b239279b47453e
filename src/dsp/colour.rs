//! Luma/chroma to 16-bit RGB.
//!
//! Luma is rescaled so black maps to 0 and white (or 75% white) maps to
//! 65535. Chroma uses the same scale, multiplied by the burst gain
//! correction. Output channels are clamped to the 16-bit range.

use super::quadrature::YiqPlanes;
use super::ActiveArea;
use crate::config::{Configuration, VideoSystem};
use log::warn;

// Burst gain correction limits.
const BURST_GAIN_MIN: f32 = 0.5;
const BURST_GAIN_MAX: f32 = 2.0;
const WHITE_POINT_75: f32 = 0.75;

/// Which pair of chroma axes the planes carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColourSpace {
    Yiq,
    Yuv,
}

impl ColourSpace {
    pub fn for_system(system: VideoSystem) -> Self {
        match system {
            VideoSystem::Ntsc => ColourSpace::Yiq,
            VideoSystem::Pal => ColourSpace::Yuv,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColourConverter {
    space: ColourSpace,
    black: f32,
    y_scale: f32,
    c_scale: f32,
    monochrome: bool,
}

impl ColourConverter {
    /// Converter for one frame; `burst_ire` is its measured burst amplitude.
    pub fn new(config: &Configuration, burst_ire: f32) -> Self {
        let mut range = config.white_level as f32 - config.black_level as f32;
        if config.white_point_75 {
            range *= WHITE_POINT_75;
        }
        let y_scale = 65535.0 / range;

        let burst_gain = if burst_ire > 0.0 && burst_ire.is_finite() {
            (config.system.nominal_burst_ire() / burst_ire).clamp(BURST_GAIN_MIN, BURST_GAIN_MAX)
        } else {
            warn!("burst amplitude {burst_ire} is not positive, chroma gain left uncorrected");
            1.0
        };

        Self {
            space: ColourSpace::for_system(config.system),
            black: config.black_level as f32,
            y_scale,
            c_scale: y_scale * burst_gain,
            monochrome: config.monochrome,
        }
    }

    pub fn chroma_scale(&self) -> f32 {
        self.c_scale
    }

    /// Convert one pixel (raw sample units) to RGB.
    #[inline]
    pub fn convert(&self, y: f32, c1: f32, c2: f32) -> [u16; 3] {
        let y = (y - self.black) * self.y_scale;
        let (c1, c2) = if self.monochrome {
            (0.0, 0.0)
        } else {
            (c1 * self.c_scale, c2 * self.c_scale)
        };

        let (r, g, b) = match self.space {
            // c1 = I, c2 = Q
            ColourSpace::Yiq => (
                y + 0.9563 * c1 + 0.6210 * c2,
                y - 0.2721 * c1 - 0.6474 * c2,
                y - 1.1070 * c1 + 1.7046 * c2,
            ),
            // c1 = U, c2 = V
            ColourSpace::Yuv => (y + 1.140 * c2, y - 0.395 * c1 - 0.581 * c2, y + 2.032 * c1),
        };

        [to_u16(r), to_u16(g), to_u16(b)]
    }

    /// Convert the active area into an interleaved RGB raster of `width`
    /// pixels per line. Pixels outside the area are left as they are.
    pub fn convert_planes(&self, yiq: &YiqPlanes, area: &ActiveArea, rgb: &mut [u16], width: usize) {
        for y in area.y0..area.y1 {
            let row = &mut rgb[y * width * 3..(y + 1) * width * 3];
            for x in area.x0..area.x1 {
                let px = self.convert(yiq.y.at(x, y), yiq.i.at(x, y), yiq.q.at(x, y));
                row[x * 3..x * 3 + 3].copy_from_slice(&px);
            }
        }
    }
}

#[inline]
fn to_u16(v: f32) -> u16 {
    v.round().clamp(0.0, 65535.0) as u16
}
