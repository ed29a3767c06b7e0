//! Spectral analysis using rustfft
//!
//! Turns a run of deltaZ samples into a magnitude spectrum and reads the
//! resonance scalars off it.
//!
//! # Pipeline
//!
//! 1. Remove the mean, apply a Hann window over the real samples
//! 2. Zero-pad to the next power of two and transform
//! 3. Magnitude per bin = |X(k)| / (N/2) for k in 0..=N/2
//! 4. Dominant bin = first maximum, DC excluded
//! 5. Half-power bandwidth by interpolated outward scan, Q = f / bandwidth
//!
//! Signals shorter than [`MIN_SAMPLES_FOR_FFT`] get a zero-crossing
//! estimate instead, so sparse data still produces a result.
//!
//! # Example
//!
//! ```ignore
//! let analyzer = SpectralAnalyzer::new(AnalysisConfig::default());
//! let spectrum = analyzer.analyze(&delta_z, 100.0, None)?;
//! println!("{:.2} Hz, Q = {:.1}", spectrum.dominant_frequency, spectrum.q_factor);
//! ```

use num_complex::Complex;
use rustfft::FftPlanner;
use std::f64::consts::{PI, SQRT_2};

use super::statistics;
use super::ProcessingError;
use crate::config::defaults::MIN_SAMPLES_FOR_FFT;
use crate::config::AnalysisConfig;
use crate::physics_engine::{theoretical_frequency, BeamParameters};
use crate::types::{SpectrumMethod, SpectrumResult};

// ============================================================================
// Analyzer
// ============================================================================

/// Stateless spectral analyzer; safe to share across tasks.
#[derive(Debug, Clone, Default)]
pub struct SpectralAnalyzer {
    settings: AnalysisConfig,
}

impl SpectralAnalyzer {
    pub fn new(settings: AnalysisConfig) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AnalysisConfig {
        &self.settings
    }

    /// Analyze `signal` sampled at `sampling_hz`.
    ///
    /// When `alignment` is given, the reported dominant bin is moved to the
    /// bin nearest the beam-model prediction; `measured_frequency` always
    /// holds the literal FFT peak.
    ///
    /// # Errors
    ///
    /// [`ProcessingError::NumericDegenerate`] for an empty signal or a
    /// non-finite sample, [`ProcessingError::InvalidSamplingRate`] when the
    /// rate is not positive and finite. Callers recover from both locally;
    /// neither is sent to clients.
    pub fn analyze(
        &self,
        signal: &[f64],
        sampling_hz: f64,
        alignment: Option<&BeamParameters>,
    ) -> Result<SpectrumResult, ProcessingError> {
        if signal.is_empty() {
            return Err(ProcessingError::NumericDegenerate("empty signal".to_string()));
        }
        if !(sampling_hz.is_finite() && sampling_hz > 0.0) {
            return Err(ProcessingError::InvalidSamplingRate(sampling_hz));
        }
        if let Some(i) = signal.iter().position(|x| !x.is_finite()) {
            return Err(ProcessingError::NumericDegenerate(format!(
                "non-finite sample at index {i}"
            )));
        }

        if signal.len() < MIN_SAMPLES_FOR_FFT {
            return Ok(self.zero_crossing_estimate(signal, sampling_hz));
        }

        let (frequencies, magnitudes) = magnitude_spectrum(signal, sampling_hz);
        let peak_idx = peak_index(&magnitudes);
        let measured_frequency = frequencies[peak_idx];
        let measured_magnitude = magnitudes[peak_idx];

        let bandwidth = half_power_bandwidth(&frequencies, &magnitudes, peak_idx)
            .unwrap_or(self.settings.fallback_bandwidth_hz);
        let q_factor = self.clamp_q(measured_frequency / bandwidth);

        let mut result = SpectrumResult {
            frequencies,
            magnitudes,
            dominant_frequency: measured_frequency,
            bandwidth,
            q_factor,
            peak_magnitude: measured_magnitude,
            measured_frequency,
            measured_magnitude,
            sampling_frequency: sampling_hz,
            method: SpectrumMethod::Fft,
            theoretical: None,
            aligned: false,
        };

        if let Some(beam) = alignment {
            self.align_to_theory(&mut result, beam);
        }

        tracing::trace!(
            samples = signal.len(),
            dominant = result.dominant_frequency,
            measured = result.measured_frequency,
            bandwidth = result.bandwidth,
            q = result.q_factor,
            "Spectrum computed"
        );

        Ok(result)
    }

    /// Q-factor forced into `[q_min, q_max]`; NaN maps to `q_min`.
    ///
    /// Never panics, even for bounds that would fail config validation.
    pub fn clamp_q(&self, q: f64) -> f64 {
        if q.is_nan() {
            self.settings.q_min
        } else {
            q.min(self.settings.q_max).max(self.settings.q_min)
        }
    }

    /// Coarse estimate from sign changes: f = (crossings / 2) / elapsed.
    fn zero_crossing_estimate(&self, signal: &[f64], sampling_hz: f64) -> SpectrumResult {
        let crossings = statistics::zero_crossings(signal);
        let elapsed = (signal.len() - 1) as f64 / sampling_hz;
        let frequency = if elapsed > 0.0 {
            (crossings as f64 / 2.0) / elapsed
        } else {
            0.0
        };

        let mean = statistics::mean(signal);
        let centred: Vec<f64> = signal.iter().map(|x| x - mean).collect();
        let magnitude = statistics::peak_abs(&centred);

        let bandwidth = self.settings.fallback_bandwidth_hz;
        SpectrumResult {
            frequencies: vec![frequency],
            magnitudes: vec![magnitude],
            dominant_frequency: frequency,
            bandwidth,
            q_factor: self.clamp_q(frequency / bandwidth),
            peak_magnitude: magnitude,
            measured_frequency: frequency,
            measured_magnitude: magnitude,
            sampling_frequency: sampling_hz,
            method: SpectrumMethod::ZeroCrossing,
            theoretical: None,
            aligned: false,
        }
    }

    /// Reweight the spectrum so the bin nearest the beam-model frequency is
    /// dominant, with a boost that decays away from it.
    ///
    /// Skipped (but the prediction is still attached) when the prediction is
    /// zero or beyond Nyquist.
    fn align_to_theory(&self, result: &mut SpectrumResult, beam: &BeamParameters) {
        let theory = theoretical_frequency(beam);
        result.theoretical = Some(theory);

        let bin_width = result.bin_width();
        let nyquist = result.frequencies.last().copied().unwrap_or(0.0);
        if bin_width <= 0.0 || theory.natural_frequency <= 0.0 || theory.natural_frequency > nyquist
        {
            tracing::debug!(
                theoretical = theory.natural_frequency,
                nyquist,
                "Theoretical frequency outside spectrum, alignment skipped"
            );
            return;
        }

        let last = result.magnitudes.len() - 1;
        let target_idx = ((theory.natural_frequency / bin_width).round() as usize).clamp(1, last);

        let boost = self.settings.alignment_boost.max(1.0);
        let decay = self.settings.alignment_decay_bins;
        let target_level = result.measured_magnitude * boost;
        let base = result.magnitudes[target_idx];
        let gain = if base > 0.0 {
            (target_level / base).max(1.0)
        } else {
            1.0
        };

        let mut reweighted: Vec<f64> = result
            .magnitudes
            .iter()
            .enumerate()
            .map(|(k, &m)| {
                let distance = k.abs_diff(target_idx) as f64;
                m * (1.0 + (gain - 1.0) * (-distance / decay).exp())
            })
            .collect();

        let strongest_other = reweighted
            .iter()
            .enumerate()
            .filter(|(k, _)| *k != target_idx)
            .map(|(_, &m)| m)
            .fold(0.0_f64, f64::max);
        reweighted[target_idx] = reweighted[target_idx]
            .max(target_level)
            .max(strongest_other * boost);

        result.dominant_frequency = result.frequencies[target_idx];
        result.peak_magnitude = reweighted[target_idx];
        result.magnitudes = reweighted;
        result.aligned = true;
    }
}

// ============================================================================
// Spectrum primitives
// ============================================================================

/// Hann coefficient for sample `i` of `n`.
fn hann(i: usize, n: usize) -> f64 {
    if n < 2 {
        return 1.0;
    }
    0.5 * (1.0 - (2.0 * PI * i as f64 / (n - 1) as f64).cos())
}

/// One-sided magnitude spectrum of the mean-removed, Hann-windowed signal.
///
/// Returns `(frequencies, magnitudes)` with `N/2 + 1` bins where `N` is the
/// padded transform length.
pub fn magnitude_spectrum(signal: &[f64], sampling_hz: f64) -> (Vec<f64>, Vec<f64>) {
    let n = signal.len();
    let fft_size = n.next_power_of_two();
    let mean = statistics::mean(signal);

    let mut buffer: Vec<Complex<f64>> = vec![Complex::new(0.0, 0.0); fft_size];
    for (i, (slot, &x)) in buffer.iter_mut().zip(signal).enumerate() {
        *slot = Complex::new((x - mean) * hann(i, n), 0.0);
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);
    fft.process(&mut buffer);

    let half = fft_size / 2;
    let scale = if half > 0 { 1.0 / half as f64 } else { 1.0 };
    let resolution = sampling_hz / fft_size as f64;

    let frequencies = (0..=half).map(|k| k as f64 * resolution).collect();
    let magnitudes = buffer.iter().take(half + 1).map(|c| c.norm() * scale).collect();
    (frequencies, magnitudes)
}

/// First bin holding the maximum magnitude, DC excluded when possible.
pub fn peak_index(magnitudes: &[f64]) -> usize {
    let start = usize::from(magnitudes.len() > 1);
    let mut best = start;
    for (k, &m) in magnitudes.iter().enumerate().skip(start + 1) {
        if m > magnitudes[best] {
            best = k;
        }
    }
    best
}

/// Width between the half-power (peak/√2) points around `peak_idx`.
///
/// Scans outward from the peak; the crossing on each side is linearly
/// interpolated between the last in-band and first out-of-band bin.
/// Returns `None` when either side never drops below half power.
pub fn half_power_bandwidth(frequencies: &[f64], magnitudes: &[f64], peak_idx: usize) -> Option<f64> {
    let peak = *magnitudes.get(peak_idx)?;
    let threshold = peak / SQRT_2;

    let interpolate = |inside: usize, outside: usize| {
        let (m_in, m_out) = (magnitudes[inside], magnitudes[outside]);
        let (f_in, f_out) = (frequencies[inside], frequencies[outside]);
        let span = m_in - m_out;
        if span.abs() < f64::EPSILON {
            f_out
        } else {
            f_out + (threshold - m_out) / span * (f_in - f_out)
        }
    };

    let left = (0..peak_idx)
        .rev()
        .find(|&k| magnitudes[k] < threshold)
        .map(|k| interpolate(k + 1, k))?;
    let right = (peak_idx + 1..magnitudes.len())
        .find(|&k| magnitudes[k] < threshold)
        .map(|k| interpolate(k - 1, k))?;

    let width = right - left;
    (width > 0.0).then_some(width)
}

// ============================================================================
// Tests
// ============================================================================
