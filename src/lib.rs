//! Colour decoder for digitised composite video sampled at four times the
//! colour subcarrier.
//!
//! NTSC frames go through the comb filters (1D band split, 2D adaptive line
//! comb, 3D motion-adaptive candidate comb), PAL frames through the
//! transform-domain separator. Both end in a quadrature demodulator, post
//! filters and an RGB48 converter. [`DecoderPool`] runs either decoder over a
//! [`FieldSource`] on a fixed set of threads and delivers frames to a
//! [`FrameSink`] in order.

pub mod config;
pub mod dsp;
pub mod error;
pub mod frame;
pub mod meters;
pub mod ntsc;
pub mod output;
pub mod pal;
pub mod pool;
pub mod presets;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{Configuration, Dimensions, OutputRegion, VideoSystem};
pub use error::{Error, Result};
pub use frame::{Field, FieldMetadata, FrameBuffer, Plane};
pub use meters::DecodeMeters;
pub use ntsc::NtscDecoder;
pub use output::{DecodedFrame, OutputGeometry, RgbFrame, RgbWriter};
pub use pal::PalDecoder;
pub use pool::{Decoder, DecoderPool, DecoderWorker, FieldSource, FrameSink, FrameWindow};
pub use presets::{Preset, PresetManager};
