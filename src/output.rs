//! Decoded frames and their output geometry.
//!
//! # Purpose
//! - [`RgbFrame`]: interleaved 16-bit RGB raster, written out as RGB48
//!   little-endian.
//! - [`OutputGeometry`]: which part of the full raster is written. In
//!   active-crop mode the active columns are widened, alternately right and
//!   left, until the width is a multiple of 8, and black lines are added,
//!   alternately bottom and top, until the height is a multiple of 8.
//! - [`RgbWriter`]: a [`FrameSink`] over any `Write`.

use crate::config::{Configuration, OutputRegion};
use crate::pool::FrameSink;
use std::io::{self, Write};

/// Interleaved RGB, three `u16` per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbFrame {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u16>,
}

impl RgbFrame {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u16; 3] {
        let k = (y * self.width + x) * 3;
        [self.data[k], self.data[k + 1], self.data[k + 2]]
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() * 2);
        for v in &self.data {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }
}

/// One finished frame as handed to the sink.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub index: usize,
    pub rgb: RgbFrame,
    /// Diagnostic map, when requested.
    pub map: Option<RgbFrame>,
}

// =============================================================================
// GEOMETRY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputGeometry {
    pub x0: usize,
    pub x1: usize,
    pub y0: usize,
    pub y1: usize,
    pub top_pad: usize,
    pub bottom_pad: usize,
    full_width: usize,
}

impl OutputGeometry {
    pub fn new(config: &Configuration) -> Self {
        let full_width = config.field_width;
        match config.output_region {
            OutputRegion::Full => Self {
                x0: 0,
                x1: full_width,
                y0: 0,
                y1: config.frame_height(),
                top_pad: 0,
                bottom_pad: 0,
                full_width,
            },
            OutputRegion::ActiveCrop => {
                let mut x0 = config.active_video_start;
                let mut x1 = config.active_video_end;
                while (x1 - x0) % 8 != 0 {
                    if (x1 - x0) % 2 == 0 && x1 < full_width {
                        x1 += 1;
                    } else if x0 > 0 {
                        x0 -= 1;
                    } else {
                        x1 += 1;
                    }
                }

                let y0 = config.first_active_line;
                let y1 = config.last_active_line.min(config.frame_height());
                let mut top_pad = 0;
                let mut bottom_pad = 0;
                while (top_pad + (y1 - y0) + bottom_pad) % 8 != 0 {
                    if (top_pad + (y1 - y0) + bottom_pad) % 2 == 0 {
                        bottom_pad += 1;
                    } else {
                        top_pad += 1;
                    }
                }

                Self {
                    x0,
                    x1: x1.min(full_width),
                    y0,
                    y1,
                    top_pad,
                    bottom_pad,
                    full_width,
                }
            }
        }
    }

    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    pub fn height(&self) -> usize {
        self.top_pad + (self.y1 - self.y0) + self.bottom_pad
    }

    /// Cut the output region out of a full-raster RGB buffer.
    pub fn crop(&self, full: &[u16]) -> RgbFrame {
        let mut out = RgbFrame::new(self.width(), self.height());
        let line = self.width() * 3;
        for (k, y) in (self.y0..self.y1).enumerate() {
            let src = &full[(y * self.full_width + self.x0) * 3..(y * self.full_width + self.x1) * 3];
            let row = self.top_pad + k;
            out.data[row * line..(row + 1) * line].copy_from_slice(src);
        }
        out
    }
}

// =============================================================================
// RGB48 WRITER
// =============================================================================

/// Writes RGB48 little-endian frames, and optionally the diagnostic maps to a
/// second stream.
pub struct RgbWriter<W: Write> {
    out: W,
    map_out: Option<W>,
}

impl<W: Write> RgbWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, map_out: None }
    }

    pub fn with_map(out: W, map_out: W) -> Self {
        Self {
            out,
            map_out: Some(map_out),
        }
    }

    pub fn into_inner(self) -> (W, Option<W>) {
        (self.out, self.map_out)
    }
}

impl<W: Write> FrameSink for RgbWriter<W> {
    fn write_frame(&mut self, frame: &DecodedFrame) -> io::Result<()> {
        self.out.write_all(&frame.rgb.to_le_bytes())?;
        if let (Some(map_out), Some(map)) = (self.map_out.as_mut(), frame.map.as_ref()) {
            map_out.write_all(&map.to_le_bytes())?;
        }
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()?;
        if let Some(map_out) = self.map_out.as_mut() {
            map_out.flush()?;
        }
        Ok(())
    }
}
