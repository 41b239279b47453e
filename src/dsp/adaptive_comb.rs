//! 2D adaptive line comb.
//!
//! # Purpose
//! Refines the 1D chroma estimate by differencing it against the lines above
//! and below in the same field (frame lines `y - 2` and `y + 2`), where the
//! subcarrier is inverted. Each neighbour is weighted by how well its 1D
//! chroma magnitude matches the current line, so vertical detail edges fall
//! back to the better-matching side instead of smearing colour.
//!
//! # Design Notes
//! - Similarity is the summed absolute difference of |chroma| over two
//!   adjacent columns, minus a 10% bias towards using neighbours, halved and
//!   mapped linearly from `0..SIMILARITY_RANGE_IRE` onto `1..0`.
//! - When one side is more than 3x as usable as the other, only that side is
//!   used. Otherwise both are blended and the result is scaled up when both
//!   scores are low (never below 1).
//! - When neither side is usable but the previous and next lines agree with
//!   each other, both are used at full weight.
//! - Lines outside the active area read as zero.

use super::ActiveArea;
use crate::frame::Plane;

// Similarity distance (IRE) at which a neighbour stops being usable.
pub const SIMILARITY_RANGE_IRE: f32 = 45.0;
// Bias towards using a neighbour, as a fraction of the current magnitude.
const NEIGHBOUR_BIAS: f32 = 0.10;
// One side is used alone when its score exceeds the other's by this factor.
const DOMINANCE_RATIO: f32 = 3.0;
// Tolerance of the previous/next agreement check, as a fraction of their sum.
const CROSS_CHECK_BIAS: f32 = 0.2;

pub struct AdaptiveComb {
    range: f32,
}

impl AdaptiveComb {
    pub fn new(irescale: f32) -> Self {
        Self {
            range: SIMILARITY_RANGE_IRE * irescale,
        }
    }

    /// Usability of `other` as a comb partner for `cur` at column `h`, in
    /// [0, 1]. Bit-identical lines always score 1.
    #[inline]
    pub fn similarity(&self, cur: &[f32], other: &[f32], h: usize) -> f32 {
        let mut k = (cur[h].abs() - other[h].abs()).abs();
        k += (cur[h - 1].abs() - other[h - 1].abs()).abs();
        k -= (cur[h].abs() + cur[h - 1].abs()) * NEIGHBOUR_BIAS;
        k *= 0.5;
        (1.0 - k / self.range).clamp(0.0, 1.0)
    }

    /// Weights `(kp, kn, scale)` for the previous and next line at `h`.
    #[inline]
    pub fn weights(&self, prev: &[f32], cur: &[f32], next: &[f32], h: usize) -> (f32, f32, f32) {
        let mut kp = self.similarity(cur, prev, h);
        let mut kn = self.similarity(cur, next, h);
        let mut sc = 1.0f32;

        if kn > 0.0 || kp > 0.0 {
            if kn > DOMINANCE_RATIO * kp {
                kp = 0.0;
            } else if kp > DOMINANCE_RATIO * kn {
                kn = 0.0;
            }
            sc = (2.0 / (kn + kp)).max(1.0);
        } else if (prev[h].abs() - next[h].abs()).abs() - ((next[h] + prev[h]) * CROSS_CHECK_BIAS).abs()
            <= 0.0
        {
            kp = 1.0;
            kn = 1.0;
        }
        (kp, kn, sc)
    }

    /// Compute the 2D chroma buffer from the 1D buffer.
    pub fn process(&self, c1: &Plane, area: &ActiveArea) -> Plane {
        let mut out = Plane::new(c1.width, c1.height);
        let black = vec![0.0f32; c1.width];
        let neighbour = |y: isize| -> &[f32] {
            if y >= area.y0 as isize && y < area.y1 as isize {
                c1.row(y as usize)
            } else {
                &black
            }
        };

        for y in area.y0..area.y1 {
            let prev = neighbour(y as isize - 2);
            let next = neighbour(y as isize + 2);
            let cur = c1.row(y);
            let dst = out.row_mut(y);
            for h in area.x0..area.x1 {
                let (kp, kn, sc) = self.weights(prev, cur, next, h);
                dst[h] = ((cur[h] - prev[h]) * kp * sc + (cur[h] - next[h]) * kn * sc) / 8.0;
            }
        }
        out
    }
}
