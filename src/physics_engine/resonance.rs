//! Resonance summary for a sealed session
//!
//! Runs the spectral analyzer over a session's full deltaZ history and
//! derives the mechanical properties folded back into the session record.

use serde::Serialize;
use std::f64::consts::PI;

use super::{theoretical_frequency, BeamParameters};
use crate::processing::{statistics, ProcessingError, SpectralAnalyzer};
use crate::types::{MechanicalProperties, Sample, SessionAnalysis, SpectrumResult};

/// Summary scalars plus the spectrum they were read from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResonanceReport {
    pub analysis: SessionAnalysis,
    pub spectrum: SpectrumResult,
}

/// Analyze a session's samples (timestamp order) into a [`ResonanceReport`].
///
/// The sampling rate is inferred from device timestamps and falls back to
/// the analyzer's `default_sampling_hz`. `beam` describes the rig; its test
/// mass is replaced by `test_mass`. When `align` is set the reported
/// frequency is reconciled against the beam model.
pub fn summarize_session(
    samples: &[Sample],
    test_mass: f64,
    beam: &BeamParameters,
    analyzer: &SpectralAnalyzer,
    align: bool,
) -> Result<ResonanceReport, ProcessingError> {
    if samples.is_empty() {
        return Err(ProcessingError::InsufficientData {
            needed: 1,
            available: 0,
        });
    }

    let delta_z: Vec<f64> = samples.iter().map(|s| s.delta_z).collect();
    let stamps: Vec<f64> = samples.iter().map(|s| s.timestamp).collect();
    let sampling_hz =
        statistics::estimate_sampling_rate(&stamps, analyzer.settings().default_sampling_hz);

    let rig = beam.with_test_mass(test_mass);
    let spectrum = analyzer.analyze(&delta_z, sampling_hz, align.then_some(&rig))?;

    let effective_mass = theoretical_frequency(&rig).effective_mass.max(0.0);
    let frequency = spectrum.dominant_frequency;
    let omega = 2.0 * PI * frequency;
    let stiffness = omega * omega * effective_mass;
    let q_factor = spectrum.q_factor;

    let properties = MechanicalProperties {
        natural_period: if frequency > 0.0 { 1.0 / frequency } else { 0.0 },
        stiffness,
        damping_coefficient: (stiffness * effective_mass).sqrt() / q_factor,
        q_factor,
        rms: statistics::rms(&delta_z),
        crest_factor: statistics::crest_factor(&delta_z),
        bandwidth: spectrum.bandwidth,
        resonance_magnification: q_factor,
    };

    Ok(ResonanceReport {
        analysis: SessionAnalysis {
            natural_frequency: frequency,
            peak_amplitude: statistics::peak_abs(&delta_z),
            properties,
            sample_count: samples.len(),
        },
        spectrum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Reading;

    fn sine_samples(freq: f64, fs: f64, n: usize, amplitude: f64) -> Vec<Sample> {
        (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                Reading {
                    timestamp: t * 1000.0,
                    delta_z: amplitude * (2.0 * PI * freq * t).sin(),
                    raw_acceleration: 9.81,
                    frequency: None,
                    amplitude: None,
                }
                .into_sample("s", "d")
            })
            .collect()
    }

    #[test]
    fn test_five_hz_scenario() {
        let samples = sine_samples(5.0, 100.0, 200, 1.0);
        let report = summarize_session(
            &samples,
            1.0,
            &BeamParameters::default(),
            &SpectralAnalyzer::default(),
            false,
        )
        .unwrap();

        let a = report.analysis;
        assert!((a.natural_frequency - 5.0).abs() < 1.0, "f = {}", a.natural_frequency);
        assert!((1.0..=100.0).contains(&a.properties.q_factor));
        assert!((a.peak_amplitude - 1.0).abs() < 0.01);
        assert!((a.properties.rms - 1.0 / 2.0_f64.sqrt()).abs() < 0.02);
        assert!((a.properties.natural_period * a.natural_frequency - 1.0).abs() < 1e-9);
        assert_eq!(a.properties.resonance_magnification, a.properties.q_factor);
        assert_eq!(a.sample_count, 200);
        assert!((report.spectrum.sampling_frequency - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_stiffness_uses_effective_mass() {
        let samples = sine_samples(5.0, 100.0, 256, 1.0);
        let beam = BeamParameters::default();
        let report =
            summarize_session(&samples, 0.5, &beam, &SpectralAnalyzer::default(), false).unwrap();

        let m_eff = theoretical_frequency(&beam.with_test_mass(0.5)).effective_mass;
        let f = report.analysis.natural_frequency;
        let expected = (2.0 * PI * f).powi(2) * m_eff;
        let props = report.analysis.properties;
        assert!((props.stiffness - expected).abs() < 1e-9);
        let damping = (props.stiffness * m_eff).sqrt() / props.q_factor;
        assert!((props.damping_coefficient - damping).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_timestamps_use_default_rate() {
        let mut samples = sine_samples(5.0, 100.0, 64, 1.0);
        for s in &mut samples {
            s.timestamp = 0.0;
        }
        let analyzer = SpectralAnalyzer::default();
        let report =
            summarize_session(&samples, 1.0, &BeamParameters::default(), &analyzer, false).unwrap();
        assert_eq!(
            report.spectrum.sampling_frequency,
            analyzer.settings().default_sampling_hz
        );
    }

    #[test]
    fn test_no_samples_is_insufficient() {
        let err = summarize_session(
            &[],
            1.0,
            &BeamParameters::default(),
            &SpectralAnalyzer::default(),
            false,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ProcessingError::InsufficientData {
                needed: 1,
                available: 0
            }
        );
    }

    #[test]
    fn test_alignment_keeps_measured_peak() {
        let samples = sine_samples(5.0, 100.0, 200, 1.0);
        let report = summarize_session(
            &samples,
            1.0,
            &BeamParameters::default(),
            &SpectralAnalyzer::default(),
            true,
        )
        .unwrap();
        assert!(report.spectrum.theoretical.is_some());
        assert!((report.spectrum.measured_frequency - 5.0).abs() < 1.0);
        assert_eq!(report.analysis.natural_frequency, report.spectrum.dominant_frequency);
    }
}
