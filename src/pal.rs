//! PAL Transform Decoder
//!
//! Separates chroma with the 2D transform filter, demodulates it against
//! each line's colour burst and converts YUV to RGB. Every frame is decoded
//! on its own, so no neighbouring frames are requested from the pool.

use crate::config::{Configuration, VideoSystem};
use crate::dsp::{ActiveArea, ColourConverter, PalDemodulator, PostFilters, TransformFilter};
use crate::error::{Error, Result};
use crate::frame::FrameBuffer;
use crate::output::{DecodedFrame, OutputGeometry};
use crate::pool::{Decoder, DecoderWorker, FrameWindow};
use log::{info, warn};

pub struct PalDecoder {
    config: Configuration,
    geometry: OutputGeometry,
}

impl PalDecoder {
    pub fn new(config: Configuration) -> Result<Self> {
        config.validate()?;
        if config.system != VideoSystem::Pal {
            return Err(Error::configuration(format!(
                "PAL decoder given a {} configuration",
                config.system.name()
            )));
        }
        let mut config = config;
        if config.show_map {
            warn!("diagnostic map is only produced by the NTSC 3D comb, disabling it");
            config.show_map = false;
        }

        let geometry = OutputGeometry::new(&config);
        info!(
            "PAL transform decoder: input {}x{}, output {}x{}, tiles {}x{}, threshold {}",
            config.field_width,
            config.frame_height(),
            geometry.width(),
            geometry.height(),
            config.transform_tile_width,
            config.transform_tile_height,
            config.transform_threshold
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

impl Decoder for PalDecoder {
    type Worker = PalWorker;

    fn lookbehind(&self) -> usize {
        0
    }

    fn lookahead(&self) -> usize {
        0
    }

    fn make_worker(&self) -> PalWorker {
        let config = &self.config;
        PalWorker {
            config: config.clone(),
            area: ActiveArea::from_config(config),
            geometry: self.geometry,
            transform: TransformFilter::new(
                config.transform_threshold,
                config.transform_tile_height,
                config.transform_tile_width,
            ),
            demod: PalDemodulator::new(config),
            post: PostFilters::new(config),
        }
    }
}

pub struct PalWorker {
    config: Configuration,
    area: ActiveArea,
    geometry: OutputGeometry,
    transform: TransformFilter,
    demod: PalDemodulator,
    post: PostFilters,
}

impl DecoderWorker for PalWorker {
    fn decode_frame(&mut self, window: &FrameWindow) -> Result<DecodedFrame> {
        let index = window.index;
        let input = window
            .current()
            .ok_or_else(|| Error::source(format!("frame {index} missing from its window")))?;
        let frame = FrameBuffer::assemble(&input.first, &input.second)?;
        if frame.width() != self.config.field_width || frame.field_height != self.config.field_height {
            return Err(Error::dimension_mismatch(format!(
                "frame {} is {}x{} fields, configured for {}x{}",
                index,
                frame.width(),
                frame.field_height,
                self.config.field_width,
                self.config.field_height
            )));
        }

        let chroma = self.transform.filter_frame(&frame.raw, &self.area);
        let mut yuv = self.demod.demodulate(&frame.raw, &chroma, &self.area);
        self.post.process(&mut yuv, &self.area);

        let (width, height) = (frame.width(), frame.height());
        let converter = ColourConverter::new(&self.config, frame.burst_ire);
        let mut full = vec![0u16; width * height * 3];
        converter.convert_planes(&yuv, &self.area, &mut full, width);

        Ok(DecodedFrame {
            index,
            rgb: self.geometry.crop(&full),
            map: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::InputFrame;
    use crate::test_utils::{pal_fields, small_pal_config};
    use std::sync::Arc;

    fn decode(config: &Configuration, y: f32, u: f32, v: f32) -> DecodedFrame {
        let decoder = PalDecoder::new(config.clone()).unwrap();
        let (first, second) = pal_fields(config, y, u, v);
        let window = FrameWindow::new(
            0,
            vec![Arc::new(InputFrame {
                index: 0,
                first,
                second,
            })],
        );
        decoder.make_worker().decode_frame(&window).unwrap()
    }

    #[test]
    fn test_rejects_ntsc_configuration() {
        let config = crate::test_utils::small_ntsc_config();
        assert!(matches!(PalDecoder::new(config), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_grey_has_no_colour() {
        let config = small_pal_config();
        let out = decode(&config, 30000.0, 0.0, 0.0);
        // columns and lines covered only by whole tiles
        for y in 24..92 {
            for x in 32..120 {
                let [r, g, b] = out.rgb.pixel(x, y);
                assert!((r as i32 - g as i32).abs() < 64, "at {x},{y}");
                assert!((g as i32 - b as i32).abs() < 64, "at {x},{y}");
            }
        }
    }

    #[test]
    fn test_recovers_uv() {
        let config = small_pal_config();
        let (y, u, v) = (30000.0, 2400.0, -1600.0);
        let expected = ColourConverter::new(&config, config.system.nominal_burst_ire()).convert(y, u, v);
        let out = decode(&config, y, u, v);
        for row in 24..92 {
            for x in 32..120 {
                let got = out.rgb.pixel(x, row);
                for c in 0..3 {
                    let err = (got[c] as i32 - expected[c] as i32).abs();
                    assert!(err < 1500, "channel {c} at {x},{row}: {got:?} vs {expected:?}");
                }
            }
        }
    }
}
