//! Error types for the chroma decoder.
//!
//! Per-pixel edge cases (lines outside the active area, candidates that fall
//! off the raster, zero burst) are never errors: the DSP stages substitute
//! black lines or disqualifying penalties instead. Only structural problems
//! surface here.

use std::io;
use thiserror::Error;

/// Result type alias for decoder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the decoder
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration cannot describe a decodable raster
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Two fields of a frame disagree in shape, or a field buffer is short
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The output sink rejected a frame; decoding stops
    #[error("Failed to write frame {frame}: {source}")]
    WriteFailure {
        frame: usize,
        #[source]
        source: io::Error,
    },

    /// The field source could not supply a frame
    #[error("Source error: {0}")]
    Source(String),

    /// IO error outside the decode core
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch<S: Into<String>>(msg: S) -> Self {
        Error::DimensionMismatch(msg.into())
    }

    /// Create a source error
    pub fn source<S: Into<String>>(msg: S) -> Self {
        Error::Source(msg.into())
    }
}
