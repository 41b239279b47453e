//! Field and frame buffers.
//!
//! # Purpose
//! A [`Field`] is one interlace pass as delivered by the capture source: 16-bit
//! samples plus a small metadata record. [`FrameBuffer::assemble`] interleaves
//! two fields into one full-height raster of `f32` samples, which is what every
//! separation stage works on. [`Plane`] is the row-major `f32` image used for
//! the raster and for all derived per-pixel buffers.
//!
//! # Layout
//! Frame line `y` comes from field `y % 2` (0 = first field), field line
//! `y / 2`. A frame is `2 * field_height - 1` lines tall, so the last line of
//! the second field is not part of the raster.

use crate::error::{Error, Result};
use log::warn;

// =============================================================================
// PLANE
// =============================================================================

/// Row-major image of `f32` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl Plane {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[f32] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        &mut self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn fill(&mut self, value: f32) {
        self.data.iter_mut().for_each(|v| *v = value);
    }
}

// =============================================================================
// FIELD
// =============================================================================

/// Per-field metadata supplied by the capture source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldMetadata {
    /// Position in the colour sequence (1..=4 for NTSC, 1..=8 for PAL).
    pub phase_id: u8,
    /// Measured colour burst amplitude in IRE.
    pub burst_ire: f32,
    pub is_first_field: bool,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub width: usize,
    pub height: usize,
    pub samples: Vec<u16>,
    pub metadata: FieldMetadata,
}

impl Field {
    pub fn new(width: usize, height: usize, samples: Vec<u16>, metadata: FieldMetadata) -> Self {
        Self {
            width,
            height,
            samples,
            metadata,
        }
    }

    /// Parse a raw capture field of little-endian 16-bit samples.
    pub fn from_le_bytes(
        bytes: &[u8],
        width: usize,
        height: usize,
        metadata: FieldMetadata,
    ) -> Result<Self> {
        let needed = width * height * 2;
        if bytes.len() < needed {
            return Err(Error::dimension_mismatch(format!(
                "field buffer holds {} bytes, {}x{} needs {}",
                bytes.len(),
                width,
                height,
                needed
            )));
        }
        let samples = bytes[..needed]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self::new(width, height, samples, metadata))
    }

    fn check_length(&self) -> Result<()> {
        if self.samples.len() < self.width * self.height {
            return Err(Error::dimension_mismatch(format!(
                "field holds {} samples, {}x{} needs {}",
                self.samples.len(),
                self.width,
                self.height,
                self.width * self.height
            )));
        }
        Ok(())
    }
}

// =============================================================================
// FRAME
// =============================================================================

/// Two interlaced fields as one raster.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub raw: Plane,
    pub field_height: usize,
    pub first_phase_id: u8,
    pub second_phase_id: u8,
    /// Mean burst amplitude of the two fields, in IRE.
    pub burst_ire: f32,
}

impl FrameBuffer {
    /// Interleave two fields into one frame.
    pub fn assemble(first: &Field, second: &Field) -> Result<Self> {
        if first.width != second.width || first.height != second.height {
            return Err(Error::dimension_mismatch(format!(
                "fields are {}x{} and {}x{}",
                first.width, first.height, second.width, second.height
            )));
        }
        first.check_length()?;
        second.check_length()?;
        if first.metadata.is_first_field == second.metadata.is_first_field {
            warn!(
                "field pair has matching polarity (phase ids {} and {}), keeping input order",
                first.metadata.phase_id, second.metadata.phase_id
            );
        }

        let width = first.width;
        let field_height = first.height;
        let height = (field_height * 2).saturating_sub(1);
        let mut raw = Plane::new(width, height);
        for y in 0..height {
            let field = if y % 2 == 0 { first } else { second };
            let src = &field.samples[(y / 2) * width..(y / 2 + 1) * width];
            for (dst, &s) in raw.row_mut(y).iter_mut().zip(src) {
                *dst = s as f32;
            }
        }

        Ok(Self {
            raw,
            field_height,
            first_phase_id: first.metadata.phase_id,
            second_phase_id: second.metadata.phase_id,
            burst_ire: (first.metadata.burst_ire + second.metadata.burst_ire) * 0.5,
        })
    }

    pub fn width(&self) -> usize {
        self.raw.width
    }

    pub fn height(&self) -> usize {
        self.raw.height
    }

    /// Phase id of the field frame line `y` belongs to.
    pub fn phase_id_of_line(&self, y: usize) -> u8 {
        if y % 2 == 0 {
            self.first_phase_id
        } else {
            self.second_phase_id
        }
    }
}
