//! Signal processing - spectral analysis and time-domain statistics for
//! accelerometer signals

mod fft;
pub mod statistics;

pub use fft::*;

use thiserror::Error;

/// Errors in signal processing
///
/// All variants are recovered from by the caller with a defined fallback;
/// they are logged, never forwarded to clients.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("Insufficient data: need {needed}, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Invalid sampling rate: {0}")]
    InvalidSamplingRate(f64),

    #[error("Numerically degenerate input: {0}")]
    NumericDegenerate(String),
}
