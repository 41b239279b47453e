pub mod adaptive_comb;
pub mod band_split;
pub mod candidate_comb;
pub mod colour;
pub mod fir;
pub mod motion;
pub mod noise_reduction;
pub mod pal_demod;
pub mod quadrature;
pub mod transform_filter;
pub mod utils;

pub use adaptive_comb::AdaptiveComb;
pub use band_split::split_1d;
pub use candidate_comb::{CandidateComb, CandidateKind};
pub use colour::{ColourConverter, ColourSpace};
pub use fir::SymmetricFir;
pub use motion::MotionEstimator;
pub use noise_reduction::PostFilters;
pub use pal_demod::PalDemodulator;
pub use quadrature::{QuadratureDemodulator, YiqPlanes};
pub use transform_filter::TransformFilter;

use crate::config::Configuration;

/// Rectangle of a frame that carries picture: columns `x0..x1`, frame lines
/// `y0..y1`. Everything outside stays at zero in derived buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveArea {
    pub x0: usize,
    pub x1: usize,
    pub y0: usize,
    pub y1: usize,
}

impl ActiveArea {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            x0: config.active_video_start,
            x1: config.active_video_end,
            y0: config.first_active_line,
            y1: config.last_active_line.min(config.frame_height()),
        }
    }

    #[inline]
    pub fn contains(&self, x: isize, y: isize) -> bool {
        x >= self.x0 as isize && x < self.x1 as isize && y >= self.y0 as isize && y < self.y1 as isize
    }

    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }
}
