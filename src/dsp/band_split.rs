//! 1D band separator.
//!
//! At four samples per subcarrier cycle the chroma at `h - 2` and `h + 2` is
//! the negation of the chroma at `h`, so `(s[h-2] + s[h+2]) / 2 - s[h]` cancels
//! flat luma and yields the chroma at `h` with a gain of -2.

use super::ActiveArea;
use crate::frame::Plane;

pub fn split_1d(raw: &Plane, area: &ActiveArea) -> Plane {
    let mut out = Plane::new(raw.width, raw.height);
    for y in area.y0..area.y1 {
        let line = raw.row(y);
        let dst = out.row_mut(y);
        for h in area.x0..area.x1 {
            dst[h] = (line[h - 2] + line[h + 2]) / 2.0 - line[h];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area() -> ActiveArea {
        ActiveArea {
            x0: 4,
            x1: 28,
            y0: 1,
            y1: 3,
        }
    }

    #[test]
    fn test_flat_line_has_no_chroma() {
        let mut raw = Plane::new(32, 4);
        raw.fill(20000.0);
        let c = split_1d(&raw, &area());
        assert!(c.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_carrier_gain_is_minus_two() {
        let mut raw = Plane::new(32, 4);
        let pattern = [100.0, 40.0, -100.0, -40.0];
        for y in 0..4 {
            for x in 0..32 {
                raw.set(x, y, 30000.0 + pattern[x % 4]);
            }
        }
        let c = split_1d(&raw, &area());
        for x in 4..28 {
            assert!((c.at(x, 1) + 2.0 * pattern[x % 4]).abs() < 1e-3);
        }
        // outside the active lines stays black
        assert_eq!(c.at(10, 0), 0.0);
        assert_eq!(c.at(10, 3), 0.0);
    }
}
