//! Quadrature demodulator for 4fSC NTSC.
//!
//! With four samples per subcarrier cycle, consecutive samples of the chroma
//! signal are `-Q, I, Q, -I` (for a line of positive polarity), so
//! synchronous detection reduces to routing each sample to the I or Q
//! channel with the right sign. Each channel holds its value until the next
//! sample of the same channel arrives.
//!
//! The chroma buffers handed in carry the negated chroma (see the 1D and 2D
//! stages), which the routing below accounts for.

use super::ActiveArea;
use crate::frame::Plane;

/// Luma and the two chroma components, one plane each.
#[derive(Debug, Clone)]
pub struct YiqPlanes {
    pub y: Plane,
    pub i: Plane,
    pub q: Plane,
}

impl YiqPlanes {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            y: Plane::new(width, height),
            i: Plane::new(width, height),
            q: Plane::new(width, height),
        }
    }

    pub fn width(&self) -> usize {
        self.y.width
    }

    pub fn height(&self) -> usize {
        self.y.height
    }
}

pub struct QuadratureDemodulator;

impl QuadratureDemodulator {
    /// Composite chroma value at subcarrier phase index `phase` (0..4) for
    /// components `i` and `q`.
    #[inline]
    pub fn chroma_at(i: f32, q: f32, phase: usize) -> f32 {
        match phase % 4 {
            0 => -q,
            1 => i,
            2 => q,
            _ => -i,
        }
    }

    /// Phase index of sample `h` on a line of the given polarity.
    #[inline]
    pub fn sample_phase(h: usize, line_phase: bool) -> usize {
        (h + if line_phase { 0 } else { 2 }) % 4
    }

    /// Split `chroma * gain` into I and Q. Luma is the raw sample.
    pub fn split_iq(
        raw: &Plane,
        chroma: &Plane,
        gain: f32,
        line_phase: &[bool],
        area: &ActiveArea,
    ) -> YiqPlanes {
        let mut out = YiqPlanes::new(raw.width, raw.height);
        for y in area.y0..area.y1 {
            let src = chroma.row(y);
            let line = raw.row(y);
            let polarity = if line_phase[y] { gain } else { -gain };
            let mut si = 0.0f32;
            let mut sq = 0.0f32;
            for h in area.x0..area.x1 {
                let c = src[h] * polarity;
                match h % 4 {
                    0 => sq = c,
                    1 => si = -c,
                    2 => sq = -c,
                    _ => si = c,
                }
                out.y.set(h, y, line[h]);
                out.i.set(h, y, si);
                out.q.set(h, y, sq);
            }
        }
        out
    }

    /// Remove the remodulated chroma from luma.
    pub fn adjust_y(yiq: &mut YiqPlanes, line_phase: &[bool], area: &ActiveArea) {
        for y in area.y0..area.y1 {
            for h in area.x0..area.x1 {
                let p = Self::sample_phase(h, line_phase[y]);
                let c = Self::chroma_at(yiq.i.at(h, y), yiq.q.at(h, y), p);
                let v = yiq.y.at(h, y) - c;
                yiq.y.set(h, y, v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::band_split::split_1d;

    fn area() -> ActiveArea {
        ActiveArea {
            x0: 8,
            x1: 56,
            y0: 2,
            y1: 10,
        }
    }

    fn phases() -> Vec<bool> {
        (0..12).map(|y| (y / 2) % 2 == 0).collect()
    }

    fn encode(luma: f32, i: f32, q: f32) -> Plane {
        let phases = phases();
        let mut raw = Plane::new(64, 12);
        for y in 0..12 {
            for x in 0..64 {
                let c = QuadratureDemodulator::chroma_at(
                    i,
                    q,
                    QuadratureDemodulator::sample_phase(x, phases[y]),
                );
                raw.set(x, y, luma + c);
            }
        }
        raw
    }

    #[test]
    fn test_1d_round_trip_recovers_iq() {
        let raw = encode(30000.0, 1200.0, -700.0);
        let a = area();
        let c1 = split_1d(&raw, &a);
        let mut yiq = QuadratureDemodulator::split_iq(&raw, &c1, 0.5, &phases(), &a);
        for y in a.y0..a.y1 {
            for x in (a.x0 + 2)..a.x1 {
                assert!((yiq.i.at(x, y) - 1200.0).abs() < 1e-2, "i at {x},{y}");
                assert!((yiq.q.at(x, y) + 700.0).abs() < 1e-2, "q at {x},{y}");
            }
        }
        QuadratureDemodulator::adjust_y(&mut yiq, &phases(), &a);
        for y in a.y0..a.y1 {
            for x in (a.x0 + 2)..a.x1 {
                assert!((yiq.y.at(x, y) - 30000.0).abs() < 1e-2);
            }
        }
    }

    #[test]
    fn test_flat_field_has_no_chroma() {
        let raw = encode(25000.0, 0.0, 0.0);
        let a = area();
        let c1 = split_1d(&raw, &a);
        let yiq = QuadratureDemodulator::split_iq(&raw, &c1, 0.5, &phases(), &a);
        assert!(yiq.i.data.iter().all(|&v| v == 0.0));
        assert!(yiq.q.data.iter().all(|&v| v == 0.0));
    }
}
