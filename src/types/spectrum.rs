//! Spectral analysis results

use serde::{Deserialize, Serialize};

use crate::physics_engine::TheoreticalFrequency;

/// How a [`SpectrumResult`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectrumMethod {
    /// Hann-windowed FFT
    Fft,
    /// Coarse estimate for signals too short to transform
    ZeroCrossing,
}

/// Magnitude spectrum and the resonance scalars read from it.
///
/// Never persisted directly; only its scalars are folded into a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectrumResult {
    /// Bin centre frequencies (Hz)
    pub frequencies: Vec<f64>,
    /// Reported magnitude per bin (aligned when `aligned` is set)
    pub magnitudes: Vec<f64>,
    /// Reported dominant frequency (Hz)
    pub dominant_frequency: f64,
    /// Half-power bandwidth around the measured peak (Hz)
    pub bandwidth: f64,
    /// Clamped to the configured plausible range
    pub q_factor: f64,
    /// Reported magnitude at `dominant_frequency`
    pub peak_magnitude: f64,
    /// Literal FFT peak (Hz), independent of any alignment
    pub measured_frequency: f64,
    /// Literal FFT peak magnitude
    pub measured_magnitude: f64,
    /// Sampling rate the spectrum was computed at (Hz)
    pub sampling_frequency: f64,
    pub method: SpectrumMethod,
    /// Beam-model prediction, when alignment was requested
    pub theoretical: Option<TheoreticalFrequency>,
    /// Whether the reported peak was moved toward the beam model
    pub aligned: bool,
}

impl SpectrumResult {
    /// Frequency resolution (Hz per bin), 0 for single-bin results.
    pub fn bin_width(&self) -> f64 {
        match self.frequencies.as_slice() {
            [a, b, ..] => b - a,
            _ => 0.0,
        }
    }
}
