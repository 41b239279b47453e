//! 3D Candidate Comb
//!
//! # Purpose
//! For every active pixel, pick the sample elsewhere in space or time whose
//! subcarrier is inverted relative to this one and whose picture content
//! best matches. The reference sample is luma + chroma, a good candidate is
//! luma - chroma, so half their difference is the chroma estimate.
//!
//! # Candidates
//! In enumeration order (ties go to the earlier candidate):
//! - **SameLine**: two samples left and right on the same line. Skipped while
//!   the motion map is bootstrapping.
//! - **Line**: the lines above and below in the same field (frame lines ±2).
//! - **Field**: the nearest opposite-phase line one field away, before and
//!   after. A first-field line (even frame line) uses line +1 of this frame
//!   and line -1 of the previous frame; a second-field line uses line -1 of
//!   this frame and line +1 of the next frame.
//! - **Frame**: the same position in the previous and next frame.
//!
//! # Scoring
//! A candidate is disqualified (fixed large penalty) unless its sample phase
//! is the reference phase rotated by 180° and it lies in the active area.
//! Otherwise its penalty is the mean absolute luma difference over three
//! neighbouring samples, plus a down-weighted mean chroma mismatch, plus the
//! category bonus, plus a motion term for the temporal categories. All terms
//! are in IRE.
//!
//! # Selection
//! - The minimum penalty wins.
//! - A Field or Frame winner is averaged with every candidate of the same
//!   category within `MERGE_MARGIN` of it. Spatial winners are never merged.
//! - In adaptive mode a spatial winner is replaced by the 2D result.
//! - When every candidate is disqualified the 2D result is used.

use super::ActiveArea;
use crate::frame::Plane;

// Category bonuses (IRE): nearer in time/space is trusted less than a
// matching sample from another field or frame.
const SAME_LINE_BONUS: f32 = 0.0;
const LINE_BONUS: f32 = -2.0;
const FIELD_BONUS: f32 = -4.0;
const FRAME_BONUS: f32 = -6.0;
// Penalty of a candidate that is off the raster or in the wrong phase.
const DISQUALIFIED: f32 = 1000.0;
// Weight of the chroma mismatch relative to the luma difference.
const CHROMA_WEIGHT: f32 = 0.28;
// Penalty per unit of motion for temporal candidates (IRE).
const MOTION_WEIGHT: f32 = 8.0;
// Same-category temporal candidates this close to the best are averaged.
const MERGE_MARGIN: f32 = 0.5;

/// Which candidate produced a pixel's 3D chroma value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidateKind {
    /// Outside the active area.
    #[default]
    Unset,
    SameLine,
    Line,
    Field,
    Frame,
    /// The 2D result was used instead.
    Fallback2D,
}

impl CandidateKind {
    fn bonus(self) -> f32 {
        match self {
            CandidateKind::SameLine => SAME_LINE_BONUS,
            CandidateKind::Line => LINE_BONUS,
            CandidateKind::Field => FIELD_BONUS,
            CandidateKind::Frame => FRAME_BONUS,
            CandidateKind::Unset | CandidateKind::Fallback2D => 0.0,
        }
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, CandidateKind::Field | CandidateKind::Frame)
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    sample: f32,
    penalty: f32,
    kind: CandidateKind,
}

/// Read-only view of one processed frame, scoped to a single 3D decode.
#[derive(Clone, Copy)]
pub struct CombView<'a> {
    pub raw: &'a Plane,
    pub c2: &'a Plane,
    /// Subcarrier polarity of each frame line.
    pub line_phase: &'a [bool],
}

impl<'a> CombView<'a> {
    /// Subcarrier phase index (0..4) of sample `x` on line `y`.
    #[inline]
    pub fn sample_phase(&self, x: usize, y: usize) -> usize {
        (x + if self.line_phase[y] { 0 } else { 2 }) % 4
    }

    #[inline]
    fn luma(&self, x: usize, y: usize) -> f32 {
        self.raw.at(x, y) + self.c2.at(x, y)
    }
}

/// Output of one 3D pass.
pub struct CandidateResult {
    pub chroma: Plane,
    pub kinds: Vec<CandidateKind>,
}

pub struct CandidateComb {
    irescale: f32,
    adaptive: bool,
}

impl CandidateComb {
    pub fn new(irescale: f32, adaptive: bool) -> Self {
        Self { irescale, adaptive }
    }

    /// Run the 3D comb on `cur`. `motion` is `None` during bootstrap.
    pub fn process(
        &self,
        cur: &CombView,
        prev: Option<&CombView>,
        next: Option<&CombView>,
        motion: Option<&Plane>,
        area: &ActiveArea,
    ) -> CandidateResult {
        let width = cur.raw.width;
        let height = cur.raw.height;
        let mut chroma = Plane::new(width, height);
        let mut kinds = vec![CandidateKind::Unset; width * height];
        let bootstrap = motion.is_none();
        let mut candidates: Vec<Candidate> = Vec::with_capacity(8);

        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                let m = motion.map_or(0.0, |p| p.at(x, y));
                candidates.clear();
                if !bootstrap {
                    candidates.push(self.score(cur, x, y, cur, x as isize - 2, y as isize, CandidateKind::SameLine, m, area));
                    candidates.push(self.score(cur, x, y, cur, x as isize + 2, y as isize, CandidateKind::SameLine, m, area));
                }
                candidates.push(self.score(cur, x, y, cur, x as isize, y as isize - 2, CandidateKind::Line, m, area));
                candidates.push(self.score(cur, x, y, cur, x as isize, y as isize + 2, CandidateKind::Line, m, area));
                // first-field lines pair with the second field of this frame
                // and of the previous one, second-field lines with the first
                // field of this frame and of the next one
                let (other_field, (outer, outer_y)) = if y % 2 == 0 {
                    (y as isize + 1, (prev, y as isize - 1))
                } else {
                    (y as isize - 1, (next, y as isize + 1))
                };
                candidates.push(self.score(cur, x, y, cur, x as isize, other_field, CandidateKind::Field, m, area));
                candidates.push(self.score_in(cur, x, y, outer, x as isize, outer_y, CandidateKind::Field, m, area));
                for view in [prev, next] {
                    candidates.push(self.score_in(cur, x, y, view, x as isize, y as isize, CandidateKind::Frame, m, area));
                }

                let (value, kind) = self.select(&candidates, cur.raw.at(x, y), cur.c2.at(x, y));
                chroma.set(x, y, value);
                kinds[y * width + x] = kind;
            }
        }

        CandidateResult { chroma, kinds }
    }

    /// Score a candidate in a neighbouring frame, disqualified when that
    /// frame is not available.
    #[allow(clippy::too_many_arguments)]
    #[inline]
    fn score_in(
        &self,
        cur: &CombView,
        x: usize,
        y: usize,
        view: Option<&CombView>,
        cx: isize,
        cy: isize,
        kind: CandidateKind,
        motion: f32,
        area: &ActiveArea,
    ) -> Candidate {
        match view {
            Some(v) => self.score(cur, x, y, v, cx, cy, kind, motion, area),
            None => Candidate {
                sample: 0.0,
                penalty: DISQUALIFIED,
                kind,
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    #[inline]
    fn score(
        &self,
        cur: &CombView,
        x: usize,
        y: usize,
        view: &CombView,
        cx: isize,
        cy: isize,
        kind: CandidateKind,
        motion: f32,
        area: &ActiveArea,
    ) -> Candidate {
        if !area.contains(cx, cy) {
            return Candidate {
                sample: 0.0,
                penalty: DISQUALIFIED,
                kind,
            };
        }
        let (cx, cy) = (cx as usize, cy as usize);
        let sample = view.raw.at(cx, cy);
        if view.sample_phase(cx, cy) != (cur.sample_phase(x, y) + 2) % 4 {
            return Candidate {
                sample,
                penalty: DISQUALIFIED,
                kind,
            };
        }

        let mut luma_diff = 0.0f32;
        let mut chroma_diff = 0.0f32;
        for o in 0..3 {
            let rx = x + o - 1;
            let vx = cx + o - 1;
            luma_diff += (cur.luma(rx, y) - view.luma(vx, cy)).abs();
            chroma_diff += (cur.c2.at(rx, y) + view.c2.at(vx, cy)).abs();
        }
        let mut penalty = (luma_diff / 3.0) / self.irescale
            + CHROMA_WEIGHT * (chroma_diff / 3.0) / self.irescale
            + kind.bonus();
        if kind.is_temporal() {
            penalty += motion * MOTION_WEIGHT;
        }

        Candidate {
            sample,
            penalty,
            kind,
        }
    }

    fn select(&self, candidates: &[Candidate], reference: f32, c2: f32) -> (f32, CandidateKind) {
        let mut best = candidates[0];
        for c in &candidates[1..] {
            if c.penalty < best.penalty {
                best = *c;
            }
        }

        if best.penalty >= DISQUALIFIED {
            return (c2, CandidateKind::Fallback2D);
        }
        if self.adaptive && !best.kind.is_temporal() {
            return (c2, CandidateKind::Fallback2D);
        }

        let sample = if best.kind.is_temporal() {
            let mut sum = 0.0f32;
            let mut count = 0u32;
            for c in candidates {
                if c.kind == best.kind && c.penalty <= best.penalty + MERGE_MARGIN {
                    sum += c.sample;
                    count += 1;
                }
            }
            sum / count.max(1) as f32
        } else {
            best.sample
        };

        ((sample - reference) / 2.0, best.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IRESCALE: f32 = 358.4;
    const W: usize = 32;
    const H: usize = 16;

    fn area() -> ActiveArea {
        ActiveArea {
            x0: 4,
            x1: 28,
            y0: 2,
            y1: 14,
        }
    }

    // Phases for a frame whose first field has phase id 1 (odd = false) or 3.
    fn phases(odd_frame: bool) -> Vec<bool> {
        (0..H)
            .map(|y| {
                let positive_on_even = if y % 2 == 0 { !odd_frame } else { odd_frame };
                if (y / 2) % 2 == 0 {
                    positive_on_even
                } else {
                    !positive_on_even
                }
            })
            .collect()
    }

    fn encode(line_phase: &[bool], luma: f32, chroma: f32) -> (Plane, Plane) {
        encode_rows(line_phase, |_| luma, chroma)
    }

    /// Like `encode`, with a per-line luma level.
    fn encode_rows(line_phase: &[bool], luma: impl Fn(usize) -> f32, chroma: f32) -> (Plane, Plane) {
        let mut raw = Plane::new(W, H);
        let mut c2 = Plane::new(W, H);
        let base = [-chroma, chroma * 0.5, chroma, -chroma * 0.5];
        for y in 0..H {
            let sign = if line_phase[y] { 1.0 } else { -1.0 };
            for x in 0..W {
                let c = sign * base[x % 4];
                raw.set(x, y, luma(y) + c);
                if area().contains(x as isize, y as isize) {
                    c2.set(x, y, -c);
                }
            }
        }
        (raw, c2)
    }

    #[test]
    fn test_static_sequence_prefers_adjacent_frames() {
        let p_even = phases(false);
        let p_odd = phases(true);
        let (raw_a, c2_a) = encode(&p_even, 30000.0, 1500.0);
        let (raw_b, c2_b) = encode(&p_odd, 30000.0, 1500.0);
        let cur = CombView {
            raw: &raw_b,
            c2: &c2_b,
            line_phase: &p_odd,
        };
        let prev = CombView {
            raw: &raw_a,
            c2: &c2_a,
            line_phase: &p_even,
        };
        let next = prev;
        let motion = Plane::new(W, H);

        let comb = CandidateComb::new(IRESCALE, true);
        let out = comb.process(&cur, Some(&prev), Some(&next), Some(&motion), &area());
        let a = area();
        for y in a.y0..a.y1 {
            for x in a.x0..a.x1 {
                assert_eq!(out.kinds[y * W + x], CandidateKind::Frame, "at {x},{y}");
                assert!((out.chroma.at(x, y) - c2_b.at(x, y)).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_close_frame_candidates_are_averaged() {
        let p_even = phases(false);
        let p_odd = phases(true);
        let (raw_cur, c2_cur) = encode(&p_odd, 30000.0, 1500.0);
        // 100 and 60 samples of luma error are both well inside the margin
        let (raw_prev, c2_prev) = encode(&p_even, 30100.0, 1500.0);
        let (raw_next, c2_next) = encode(&p_even, 29940.0, 1500.0);
        let cur = CombView {
            raw: &raw_cur,
            c2: &c2_cur,
            line_phase: &p_odd,
        };
        let prev = CombView {
            raw: &raw_prev,
            c2: &c2_prev,
            line_phase: &p_even,
        };
        let next = CombView {
            raw: &raw_next,
            c2: &c2_next,
            line_phase: &p_even,
        };
        let motion = Plane::new(W, H);

        let out = CandidateComb::new(IRESCALE, true).process(&cur, Some(&prev), Some(&next), Some(&motion), &area());
        let a = area();
        for y in a.y0..a.y1 {
            for x in a.x0..a.x1 {
                assert_eq!(out.kinds[y * W + x], CandidateKind::Frame, "at {x},{y}");
                // mean luma of the two frames is 20 above the current one
                let expected = c2_cur.at(x, y) + 10.0;
                assert!((out.chroma.at(x, y) - expected).abs() < 0.05, "at {x},{y}");
            }
        }
    }

    #[test]
    fn test_field_candidates_span_both_frames() {
        let p_even = phases(false);
        let p_odd = phases(true);
        // second field line 9 of this frame is 60 low, second field line 7
        // of the previous frame 100 high; its line 8 is too far off to win
        let (raw_cur, c2_cur) = encode_rows(&p_odd, |y| if y == 9 { 29940.0 } else { 30000.0 }, 1500.0);
        let (raw_prev, c2_prev) = encode_rows(
            &p_even,
            |y| match y {
                7 => 30100.0,
                8 => 33000.0,
                _ => 30000.0,
            },
            1500.0,
        );
        let cur = CombView {
            raw: &raw_cur,
            c2: &c2_cur,
            line_phase: &p_odd,
        };
        let prev = CombView {
            raw: &raw_prev,
            c2: &c2_prev,
            line_phase: &p_even,
        };
        let comb = CandidateComb::new(IRESCALE, true);

        let out = comb.process(&cur, Some(&prev), None, None, &area());
        assert_eq!(out.kinds[8 * W + 12], CandidateKind::Field);
        assert!((out.chroma.at(12, 8) - (c2_cur.at(12, 8) + 10.0)).abs() < 0.05);

        // without the previous frame only this frame's field line is left
        let out = comb.process(&cur, None, None, None, &area());
        assert_eq!(out.kinds[8 * W + 12], CandidateKind::Field);
        assert!((out.chroma.at(12, 8) - (c2_cur.at(12, 8) - 30.0)).abs() < 0.05);
    }

    #[test]
    fn test_close_line_candidates_are_not_averaged() {
        let p = phases(false);
        // lines 6 and 10 are near matches, the other field is far off
        let (raw, c2) = encode_rows(
            &p,
            |y| match y {
                6 => 30100.0,
                10 => 29940.0,
                y if y % 2 == 1 => 33000.0,
                _ => 30000.0,
            },
            1500.0,
        );
        let cur = CombView {
            raw: &raw,
            c2: &c2,
            line_phase: &p,
        };

        let out = CandidateComb::new(IRESCALE, false).process(&cur, None, None, None, &area());
        assert_eq!(out.kinds[8 * W + 12], CandidateKind::Line);
        // only line 10 is used
        assert!((out.chroma.at(12, 8) - (c2.at(12, 8) - 30.0)).abs() < 0.05);
    }

    #[test]
    fn test_moving_picture_falls_back_to_2d() {
        let p_even = phases(false);
        let p_odd = phases(true);
        let (raw_a, c2_a) = encode(&p_even, 30000.0, 1500.0);
        let (raw_b, c2_b) = encode(&p_odd, 30000.0, 1500.0);
        let cur = CombView {
            raw: &raw_b,
            c2: &c2_b,
            line_phase: &p_odd,
        };
        let prev = CombView {
            raw: &raw_a,
            c2: &c2_a,
            line_phase: &p_even,
        };
        let mut motion = Plane::new(W, H);
        motion.fill(1.0);

        let comb = CandidateComb::new(IRESCALE, true);
        let out = comb.process(&cur, Some(&prev), Some(&prev), Some(&motion), &area());
        // a fully moving pixel pays 8 IRE on temporal candidates, so the
        // same-field lines win and adaptive mode reuses the 2D value
        assert_eq!(out.kinds[8 * W + 12], CandidateKind::Fallback2D);
        assert_eq!(out.chroma.at(12, 8), c2_b.at(12, 8));
    }

    #[test]
    fn test_wrong_phase_frames_are_disqualified() {
        let p = phases(false);
        let (raw, c2) = encode(&p, 30000.0, 1500.0);
        let cur = CombView {
            raw: &raw,
            c2: &c2,
            line_phase: &p,
        };
        // neighbours with the same phase as the current frame cannot be used
        let comb = CandidateComb::new(IRESCALE, false);
        let motion = Plane::new(W, H);
        let out = comb.process(&cur, Some(&cur), Some(&cur), Some(&motion), &area());
        for y in 4..12 {
            for x in 6..26 {
                assert_ne!(out.kinds[y * W + x], CandidateKind::Frame);
            }
        }
    }

    #[test]
    fn test_outside_active_area_untouched() {
        let p = phases(false);
        let (raw, c2) = encode(&p, 30000.0, 0.0);
        let cur = CombView {
            raw: &raw,
            c2: &c2,
            line_phase: &p,
        };
        let out = CandidateComb::new(IRESCALE, true).process(&cur, None, None, None, &area());
        assert_eq!(out.kinds[0], CandidateKind::Unset);
        assert!(out.chroma.data.iter().all(|&v| v == 0.0));
    }
}
