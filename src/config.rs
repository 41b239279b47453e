//! Decoder configuration.
//!
//! # Purpose
//! One immutable record of every per-run parameter: raster geometry, active
//! video bounds, black/white calibration, separation mode and post-filter
//! levels. It is built once (from a constructor, a preset or JSON), checked
//! with [`Configuration::validate`], and then shared read-only by every
//! worker in the pool.
//!
//! # Geometry
//! Column bounds are in samples of a field line. Line bounds are in frame
//! lines, where a frame is two interlaced fields and therefore
//! `2 * field_height - 1` lines tall.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

// =============================================================================
// CONSTANTS
// =============================================================================

// Samples the 1D separator and 3D scorer read on each side of a column.
const COLUMN_GUARD: usize = 4;
// Largest transform tile edge supported.
const TILE_MAX: usize = 64;
// Nominal colour burst amplitude in IRE (NTSC: 40 IRE peak to peak).
const NTSC_NOMINAL_BURST_IRE: f32 = 20.0;
// PAL burst is 300 mV peak to peak against a 700 mV luma range.
const PAL_NOMINAL_BURST_IRE: f32 = 21.43;

// =============================================================================
// ENUMS
// =============================================================================

/// Composite video standard of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoSystem {
    Ntsc,
    Pal,
}

impl VideoSystem {
    pub fn name(&self) -> &'static str {
        match self {
            VideoSystem::Ntsc => "NTSC",
            VideoSystem::Pal => "PAL",
        }
    }

    /// Burst amplitude the chroma gain is normalised against.
    pub fn nominal_burst_ire(&self) -> f32 {
        match self {
            VideoSystem::Ntsc => NTSC_NOMINAL_BURST_IRE,
            VideoSystem::Pal => PAL_NOMINAL_BURST_IRE,
        }
    }
}

/// Comb filter dimensionality. Serialised as the bare numbers 1, 2 and 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Dimensions {
    One,
    Two,
    Three,
}

impl TryFrom<u8> for Dimensions {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Dimensions::One),
            2 => Ok(Dimensions::Two),
            3 => Ok(Dimensions::Three),
            other => Err(format!("dimensions must be 1, 2 or 3 (got {other})")),
        }
    }
}

impl From<Dimensions> for u8 {
    fn from(value: Dimensions) -> Self {
        match value {
            Dimensions::One => 1,
            Dimensions::Two => 2,
            Dimensions::Three => 3,
        }
    }
}

/// Which part of the frame is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputRegion {
    /// Whole field width by whole frame height.
    Full,
    /// Active video only, widened and padded to multiples of 8.
    ActiveCrop,
}

// =============================================================================
// CONFIGURATION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub system: VideoSystem,

    // Raster
    pub field_width: usize,
    pub field_height: usize,
    pub active_video_start: usize,
    pub active_video_end: usize,
    pub first_active_line: usize,
    pub last_active_line: usize,
    pub colour_burst_start: usize,
    pub colour_burst_end: usize,

    // Calibration (16-bit sample values)
    pub black_level: u16,
    pub white_level: u16,
    pub white_point_75: bool,

    // Separation
    pub dimensions: Dimensions,
    pub adaptive: bool,
    pub transform_threshold: f32,
    pub transform_tile_width: usize,
    pub transform_tile_height: usize,

    // Post filters (noise reduction levels in IRE, 0 disables)
    pub luma_nr: f32,
    pub chroma_nr: f32,
    pub colour_lpf: bool,
    pub colour_lpf_hq: bool,
    pub monochrome: bool,

    // Output
    pub show_map: bool,
    pub output_region: OutputRegion,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::ntsc()
    }
}

impl Configuration {
    /// 4fSC NTSC as captured by ld-decode.
    pub fn ntsc() -> Self {
        Self {
            system: VideoSystem::Ntsc,
            field_width: 910,
            field_height: 263,
            active_video_start: 134,
            active_video_end: 894,
            first_active_line: 40,
            last_active_line: 525,
            colour_burst_start: 78,
            colour_burst_end: 110,
            black_level: 15360,
            white_level: 51200,
            white_point_75: false,
            dimensions: Dimensions::Two,
            adaptive: true,
            transform_threshold: 0.4,
            transform_tile_width: 32,
            transform_tile_height: 16,
            luma_nr: 1.0,
            chroma_nr: 0.0,
            colour_lpf: true,
            colour_lpf_hq: false,
            monochrome: false,
            show_map: false,
            output_region: OutputRegion::ActiveCrop,
        }
    }

    /// 4fSC PAL as captured by ld-decode.
    pub fn pal() -> Self {
        Self {
            system: VideoSystem::Pal,
            field_width: 1135,
            field_height: 313,
            active_video_start: 185,
            active_video_end: 1107,
            first_active_line: 44,
            last_active_line: 620,
            colour_burst_start: 98,
            colour_burst_end: 138,
            black_level: 16384,
            white_level: 54016,
            luma_nr: 0.0,
            ..Self::ntsc()
        }
    }

    pub fn frame_height(&self) -> usize {
        (self.field_height * 2).saturating_sub(1)
    }

    /// Sample units per IRE.
    pub fn irescale(&self) -> f32 {
        (self.white_level as f32 - self.black_level as f32) / 100.0
    }

    pub fn active_width(&self) -> usize {
        self.active_video_end.saturating_sub(self.active_video_start)
    }

    /// True when a previous and next frame must be supplied to each decode.
    pub fn needs_neighbours(&self) -> bool {
        self.system == VideoSystem::Ntsc && self.dimensions == Dimensions::Three
    }

    /// Check the whole configuration once, before any decoding starts.
    pub fn validate(&self) -> Result<()> {
        if self.field_width == 0 || self.field_height < 2 {
            return Err(Error::configuration(format!(
                "field size {}x{} is too small",
                self.field_width, self.field_height
            )));
        }
        if self.active_video_start < COLUMN_GUARD
            || self.active_video_start >= self.active_video_end
            || self.active_video_end + COLUMN_GUARD > self.field_width
        {
            return Err(Error::configuration(format!(
                "active video {}..{} must lie inside {}..{}",
                self.active_video_start,
                self.active_video_end,
                COLUMN_GUARD,
                self.field_width.saturating_sub(COLUMN_GUARD)
            )));
        }
        if self.first_active_line >= self.last_active_line
            || self.last_active_line > self.frame_height()
        {
            return Err(Error::configuration(format!(
                "active lines {}..{} must lie inside a {}-line frame",
                self.first_active_line,
                self.last_active_line,
                self.frame_height()
            )));
        }
        if self.colour_burst_start >= self.colour_burst_end
            || self.colour_burst_end > self.field_width
        {
            return Err(Error::configuration(format!(
                "colour burst {}..{} must lie inside the field width {}",
                self.colour_burst_start, self.colour_burst_end, self.field_width
            )));
        }
        if self.black_level >= self.white_level {
            return Err(Error::configuration(format!(
                "black level {} must be below white level {}",
                self.black_level, self.white_level
            )));
        }
        if !self.luma_nr.is_finite() || self.luma_nr < 0.0 {
            return Err(Error::configuration(format!(
                "luma noise reduction {} must be a non-negative number",
                self.luma_nr
            )));
        }
        if !self.chroma_nr.is_finite() || self.chroma_nr < 0.0 {
            return Err(Error::configuration(format!(
                "chroma noise reduction {} must be a non-negative number",
                self.chroma_nr
            )));
        }
        if !self.transform_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.transform_threshold)
        {
            return Err(Error::configuration(format!(
                "transform threshold {} must be within 0..=1",
                self.transform_threshold
            )));
        }
        let tx = self.transform_tile_width;
        if tx < 8 || tx > TILE_MAX || tx % 8 != 0 {
            return Err(Error::configuration(format!(
                "transform tile width {tx} must be a multiple of 8 up to {TILE_MAX}"
            )));
        }
        let ty = self.transform_tile_height;
        if ty < 4 || ty > TILE_MAX || ty % 2 != 0 {
            return Err(Error::configuration(format!(
                "transform tile height {ty} must be even, between 4 and {TILE_MAX}"
            )));
        }
        Ok(())
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::configuration(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(Configuration::ntsc().validate().is_ok());
        assert!(Configuration::pal().validate().is_ok());
        assert_eq!(Configuration::ntsc().frame_height(), 525);
        assert_eq!(Configuration::pal().frame_height(), 625);
    }

    #[test]
    fn test_active_bounds_outside_buffer_rejected() {
        let mut config = Configuration::ntsc();
        config.active_video_end = config.field_width;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let mut config = Configuration::ntsc();
        config.active_video_start = 0;
        assert!(config.validate().is_err());

        let mut config = Configuration::ntsc();
        config.last_active_line = 600;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tile_sizes_checked() {
        let mut config = Configuration::pal();
        config.transform_tile_width = 20;
        assert!(config.validate().is_err());
        config.transform_tile_width = 16;
        config.transform_tile_height = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dimensions_serialise_as_numbers() {
        let mut config = Configuration::ntsc();
        config.dimensions = Dimensions::Three;
        let json = config.to_json().unwrap();
        assert!(json.contains("\"dimensions\": 3"));
        let back = Configuration::from_json(&json).unwrap();
        assert_eq!(back, config);
        assert!(Configuration::from_json(r#"{"dimensions": 4}"#).is_err());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config = Configuration::from_json(r#"{"luma_nr": 2.5}"#).unwrap();
        assert_eq!(config.luma_nr, 2.5);
        assert_eq!(config.field_width, 910);
    }

    #[test]
    fn test_irescale() {
        let config = Configuration::ntsc();
        assert!((config.irescale() - 358.4).abs() < 1e-3);
    }
}
