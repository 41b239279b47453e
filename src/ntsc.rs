//! NTSC Comb Decoder
//!
//! # Purpose
//! Decodes one NTSC frame per call: 1D band split, 2D adaptive line comb and,
//! in 3D mode, motion estimation plus the candidate comb over the previous
//! and next frames. The selected chroma buffer is demodulated to YIQ, post
//! filtered and converted to RGB.
//!
//! # Lifecycle
//! [`NtscDecoder`] is built once from a validated configuration and shared by
//! every worker thread. Each thread owns an [`NtscWorker`] holding its filter
//! state and a three-slot ring of processed frames. A frame that is still in
//! the ring from the previous window is reused instead of being assembled and
//! combed again.
//!
//! # Phase
//! The colour sequence number of a field (1..=4) fixes the subcarrier
//! polarity of its first line. Polarity then alternates every field line.

use crate::config::{Configuration, Dimensions, VideoSystem};
use crate::dsp::candidate_comb::{CandidateResult, CombView};
use crate::dsp::{
    split_1d, ActiveArea, AdaptiveComb, CandidateComb, CandidateKind, ColourConverter,
    MotionEstimator, PostFilters, QuadratureDemodulator,
};
use crate::error::{Error, Result};
use crate::frame::{FrameBuffer, Plane};
use crate::output::{DecodedFrame, OutputGeometry, RgbFrame};
use crate::pool::{Decoder, DecoderWorker, FrameWindow, InputFrame};
use log::{debug, info, warn};

// Slots in the per-worker frame ring: previous, current, next.
const RING_SLOTS: usize = 3;

/// Subcarrier polarity of field line `field_line` in a field with colour
/// sequence number `phase_id`. `true` means the chroma samples run
/// `-Q, I, Q, -I` from column 0.
pub fn line_phase(phase_id: u8, field_line: usize) -> bool {
    let positive_on_even = phase_id == 1 || phase_id == 4;
    if field_line % 2 == 0 {
        positive_on_even
    } else {
        !positive_on_even
    }
}

// =============================================================================
// DECODER
// =============================================================================

pub struct NtscDecoder {
    config: Configuration,
    geometry: OutputGeometry,
}

impl NtscDecoder {
    pub fn new(config: Configuration) -> Result<Self> {
        config.validate()?;
        if config.system != VideoSystem::Ntsc {
            return Err(Error::configuration(format!(
                "NTSC decoder given a {} configuration",
                config.system.name()
            )));
        }
        let mut config = config;
        if config.show_map && config.dimensions != Dimensions::Three {
            warn!("diagnostic map needs the 3D comb, disabling it");
            config.show_map = false;
        }

        let geometry = OutputGeometry::new(&config);
        info!(
            "NTSC {}D decoder: input {}x{}, output {}x{}",
            u8::from(config.dimensions),
            config.field_width,
            config.frame_height(),
            geometry.width(),
            geometry.height()
        );
        Ok(Self { config, geometry })
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn geometry(&self) -> &OutputGeometry {
        &self.geometry
    }
}

impl Decoder for NtscDecoder {
    type Worker = NtscWorker;

    fn lookbehind(&self) -> usize {
        usize::from(self.config.needs_neighbours())
    }

    fn lookahead(&self) -> usize {
        usize::from(self.config.needs_neighbours())
    }

    fn make_worker(&self) -> NtscWorker {
        NtscWorker::new(&self.config, self.geometry)
    }
}

// =============================================================================
// PER-FRAME PROCESSING
// =============================================================================

/// Everything the comb stages derive from one frame before demodulation.
struct ProcessedFrame {
    index: usize,
    raw: Plane,
    c1: Plane,
    c2: Plane,
    line_phase: Vec<bool>,
    /// First-field luma for motion estimation (3D only, empty otherwise).
    luma: Plane,
    burst_ire: f32,
}

impl ProcessedFrame {
    fn view(&self) -> CombView<'_> {
        CombView {
            raw: &self.raw,
            c2: &self.c2,
            line_phase: &self.line_phase,
        }
    }
}

/// Stages that run once per input frame.
struct FrameStages {
    config: Configuration,
    area: ActiveArea,
    comb2d: AdaptiveComb,
}

impl FrameStages {
    fn process(&self, input: &InputFrame) -> Result<ProcessedFrame> {
        let frame = FrameBuffer::assemble(&input.first, &input.second)?;
        if frame.width() != self.config.field_width || frame.field_height != self.config.field_height {
            return Err(Error::dimension_mismatch(format!(
                "frame {} is {}x{} fields, configured for {}x{}",
                input.index,
                frame.width(),
                frame.field_height,
                self.config.field_width,
                self.config.field_height
            )));
        }

        let c1 = split_1d(&frame.raw, &self.area);
        let c2 = match self.config.dimensions {
            Dimensions::One => Plane::new(0, 0),
            _ => self.comb2d.process(&c1, &self.area),
        };
        let line_phase = (0..frame.height())
            .map(|y| line_phase(frame.phase_id_of_line(y), y / 2))
            .collect();
        let luma = match self.config.dimensions {
            Dimensions::Three => MotionEstimator::field_luma(
                &frame.raw,
                &c2,
                &self.area,
                self.config.black_level as f32,
                self.config.white_level as f32,
            ),
            _ => Plane::new(0, 0),
        };

        Ok(ProcessedFrame {
            index: input.index,
            burst_ire: frame.burst_ire,
            raw: frame.raw,
            c1,
            c2,
            line_phase,
            luma,
        })
    }
}

/// Fixed arena of processed frames, slot chosen by frame index.
struct FrameRing {
    slots: [Option<ProcessedFrame>; RING_SLOTS],
}

impl FrameRing {
    fn new() -> Self {
        Self {
            slots: [None, None, None],
        }
    }

    fn load(&mut self, input: &InputFrame, stages: &FrameStages) -> Result<()> {
        let slot = &mut self.slots[input.index % RING_SLOTS];
        if slot.as_ref().is_some_and(|f| f.index == input.index) {
            debug!("frame {} reused from ring", input.index);
            return Ok(());
        }
        *slot = Some(stages.process(input)?);
        Ok(())
    }

    fn get(&self, index: usize) -> Option<&ProcessedFrame> {
        self.slots[index % RING_SLOTS]
            .as_ref()
            .filter(|f| f.index == index)
    }
}

// =============================================================================
// WORKER
// =============================================================================

/// 3D comb output for one frame.
struct TemporalSelection {
    motion: Option<Plane>,
    result: CandidateResult,
}

pub struct NtscWorker {
    stages: FrameStages,
    geometry: OutputGeometry,
    motion: MotionEstimator,
    comb3d: CandidateComb,
    post: PostFilters,
    ring: FrameRing,
}

impl NtscWorker {
    fn new(config: &Configuration, geometry: OutputGeometry) -> Self {
        let irescale = config.irescale();
        Self {
            stages: FrameStages {
                config: config.clone(),
                area: ActiveArea::from_config(config),
                comb2d: AdaptiveComb::new(irescale),
            },
            geometry,
            motion: MotionEstimator::new(),
            comb3d: CandidateComb::new(irescale, config.adaptive),
            post: PostFilters::new(config),
            ring: FrameRing::new(),
        }
    }

    fn select_3d(&self, cur: &ProcessedFrame, index: usize) -> TemporalSelection {
        let area = &self.stages.area;
        let prev = index.checked_sub(1).and_then(|i| self.ring.get(i));
        let next = self.ring.get(index + 1);

        let motion = match prev {
            Some(p) => Some(self.motion.motion_map(
                Some(&p.luma),
                &cur.luma,
                area,
                cur.raw.width,
                cur.raw.height,
            )),
            None => {
                debug!("frame {}: no previous frame, motion map bootstrapping", index);
                None
            }
        };

        let prev_view = prev.map(ProcessedFrame::view);
        let next_view = next.map(ProcessedFrame::view);
        let result = self.comb3d.process(
            &cur.view(),
            prev_view.as_ref(),
            next_view.as_ref(),
            motion.as_ref(),
            area,
        );
        TemporalSelection { motion, result }
    }

    /// Diagnostic map: the chosen candidate category, tinted red where the
    /// picture moves and blue where it is still.
    fn render_map(&self, selection: &TemporalSelection, width: usize, height: usize) -> RgbFrame {
        let area = &self.stages.area;
        let mut full = vec![0u16; width * height * 3];
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                let m = selection.motion.as_ref().map_or(0.0, |p| p.at(x, y));
                let kind = kind_colour(selection.result.kinds[y * width + x]);
                let tint = [m, 0.0, 1.0 - m];
                let k = (y * width + x) * 3;
                for c in 0..3 {
                    full[k + c] = ((0.75 * kind[c] + 0.25 * tint[c]) * 65535.0) as u16;
                }
            }
        }
        self.geometry.crop(&full)
    }
}

fn kind_colour(kind: CandidateKind) -> [f32; 3] {
    match kind {
        CandidateKind::Unset => [0.0, 0.0, 0.0],
        CandidateKind::SameLine => [1.0, 0.0, 0.0],
        CandidateKind::Line => [1.0, 1.0, 0.0],
        CandidateKind::Field => [0.0, 1.0, 0.0],
        CandidateKind::Frame => [0.0, 0.5, 1.0],
        CandidateKind::Fallback2D => [0.5, 0.5, 0.5],
    }
}

impl DecoderWorker for NtscWorker {
    fn decode_frame(&mut self, window: &FrameWindow) -> Result<DecodedFrame> {
        let index = window.index;
        let input = window
            .current()
            .ok_or_else(|| Error::source(format!("frame {index} missing from its window")))?;
        if self.stages.config.dimensions == Dimensions::Three {
            for neighbour in [window.previous(), window.next()].into_iter().flatten() {
                self.ring.load(neighbour, &self.stages)?;
            }
        }
        self.ring.load(input, &self.stages)?;
        let cur = self
            .ring
            .get(index)
            .ok_or_else(|| Error::source(format!("frame {index} was not processed")))?;

        let area = &self.stages.area;
        let config = &self.stages.config;
        let selection = match config.dimensions {
            Dimensions::Three => Some(self.select_3d(cur, index)),
            _ => None,
        };
        let (chroma, gain) = match (&selection, config.dimensions) {
            (Some(s), _) => (&s.result.chroma, 1.0),
            // the 1D buffer has twice the gain of the others
            (None, Dimensions::One) => (&cur.c1, 0.5),
            (None, _) => (&cur.c2, 1.0),
        };

        let mut yiq = QuadratureDemodulator::split_iq(&cur.raw, chroma, gain, &cur.line_phase, area);
        QuadratureDemodulator::adjust_y(&mut yiq, &cur.line_phase, area);
        self.post.process(&mut yiq, area);

        let (width, height) = (cur.raw.width, cur.raw.height);
        let converter = ColourConverter::new(config, cur.burst_ire);
        let mut full = vec![0u16; width * height * 3];
        converter.convert_planes(&yiq, area, &mut full, width);

        let map = match &selection {
            Some(s) if config.show_map => Some(self.render_map(s, width, height)),
            _ => None,
        };

        Ok(DecodedFrame {
            index,
            rgb: self.geometry.crop(&full),
            map,
        })
    }
}
