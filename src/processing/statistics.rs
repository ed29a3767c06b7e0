//! Time-domain signal statistics

use statrs::statistics::Statistics;

/// Root mean square. 0 for an empty signal.
pub fn rms(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    signal.iter().quadratic_mean()
}

/// Largest absolute value. 0 for an empty signal.
pub fn peak_abs(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    signal.iter().abs_max()
}

/// Peak over RMS. 0 when the signal is silent.
pub fn crest_factor(signal: &[f64]) -> f64 {
    let rms = rms(signal);
    if rms > 0.0 {
        peak_abs(signal) / rms
    } else {
        0.0
    }
}

/// Arithmetic mean. 0 for an empty signal.
pub fn mean(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    signal.iter().mean()
}

/// Number of sign changes around the mean.
pub fn zero_crossings(signal: &[f64]) -> usize {
    let m = mean(signal);
    signal
        .windows(2)
        .filter(|w| {
            let (a, b) = (w[0] - m, w[1] - m);
            (a < 0.0 && b >= 0.0) || (a >= 0.0 && b < 0.0)
        })
        .count()
}

/// Sampling rate implied by device timestamps in milliseconds.
///
/// Uses the mean spacing over the whole run. Returns `fallback_hz` when
/// there are fewer than two timestamps or the span is not a positive,
/// finite number.
pub fn estimate_sampling_rate(timestamps_ms: &[f64], fallback_hz: f64) -> f64 {
    let (Some(first), Some(last)) = (timestamps_ms.first(), timestamps_ms.last()) else {
        return fallback_hz;
    };
    let span_ms = last - first;
    if timestamps_ms.len() < 2 || !span_ms.is_finite() || span_ms <= 0.0 {
        return fallback_hz;
    }
    (timestamps_ms.len() - 1) as f64 * 1000.0 / span_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_rms_of_sine_is_amplitude_over_sqrt2() {
        let signal: Vec<f64> = (0..1000)
            .map(|i| 2.0 * (2.0 * PI * 5.0 * i as f64 / 1000.0).sin())
            .collect();
        assert!((rms(&signal) - 2.0 / 2.0_f64.sqrt()).abs() < 1e-3);
        assert!((crest_factor(&signal) - 2.0_f64.sqrt()).abs() < 1e-2);
    }

    #[test]
    fn test_empty_and_silent_signals() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(peak_abs(&[]), 0.0);
        assert_eq!(crest_factor(&[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_peak_abs_uses_magnitude() {
        assert_eq!(peak_abs(&[0.5, -3.0, 2.0]), 3.0);
    }

    #[test]
    fn test_zero_crossings_of_square_wave() {
        let signal = [1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0, -1.0];
        assert_eq!(zero_crossings(&signal), 3);
    }

    #[test]
    fn test_sampling_rate_from_timestamps() {
        let stamps: Vec<f64> = (0..200).map(|i| i as f64 * 10.0).collect();
        assert!((estimate_sampling_rate(&stamps, 1.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_sampling_rate_fallbacks() {
        assert_eq!(estimate_sampling_rate(&[], 50.0), 50.0);
        assert_eq!(estimate_sampling_rate(&[5.0], 50.0), 50.0);
        assert_eq!(estimate_sampling_rate(&[5.0, 5.0, 5.0], 50.0), 50.0);
        assert_eq!(estimate_sampling_rate(&[10.0, 0.0], 50.0), 50.0);
    }
}
