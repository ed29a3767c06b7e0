//! Cantilever beam model
//!
//! Euler–Bernoulli cantilever with a lumped tip load. The beam's own mass
//! contributes one third of its weight to the effective oscillating mass
//! (Rayleigh approximation).
//!
//! ```text
//! I     = b·d³ / 12
//! k     = 3·E·I / L³
//! m_eff = test + tip + sensor + ρ·b·d·L / 3
//! f_n   = sqrt(k / m_eff) / 2π
//! ```

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::config::defaults;

/// Physical description of the rig under test.
///
/// SI units throughout. Defaults describe the stainless-steel strip the
/// rig ships with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamParameters {
    /// Mass under test clamped at the free end (kg)
    pub test_mass_kg: f64,
    /// Clamp hardware at the free end (kg)
    pub tip_mass_kg: f64,
    /// Accelerometer board (kg)
    pub sensor_mass_kg: f64,
    /// Young's modulus E (Pa)
    pub youngs_modulus_pa: f64,
    /// Cross-section breadth b (m)
    pub breadth_m: f64,
    /// Cross-section depth d (m)
    pub depth_m: f64,
    /// Free length L (m)
    pub length_m: f64,
    /// Material density ρ (kg/m³)
    pub density_kg_m3: f64,
}

impl Default for BeamParameters {
    fn default() -> Self {
        Self {
            test_mass_kg: 0.0,
            tip_mass_kg: defaults::BEAM_TIP_MASS_KG,
            sensor_mass_kg: defaults::BEAM_SENSOR_MASS_KG,
            youngs_modulus_pa: defaults::BEAM_YOUNGS_MODULUS_PA,
            breadth_m: defaults::BEAM_BREADTH_M,
            depth_m: defaults::BEAM_DEPTH_M,
            length_m: defaults::BEAM_LENGTH_M,
            density_kg_m3: defaults::BEAM_DENSITY_KG_M3,
        }
    }
}

impl BeamParameters {
    /// Same rig, different mass under test.
    pub fn with_test_mass(self, test_mass_kg: f64) -> Self {
        Self {
            test_mass_kg,
            ..self
        }
    }

    /// Second moment of area I = b·d³/12 (m⁴)
    pub fn second_moment_of_area(&self) -> f64 {
        self.breadth_m * self.depth_m.powi(3) / 12.0
    }

    /// Beam mass ρ·b·d·L (kg)
    pub fn beam_mass(&self) -> f64 {
        self.density_kg_m3 * self.breadth_m * self.depth_m * self.length_m
    }
}

/// Output of [`theoretical_frequency`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TheoreticalFrequency {
    /// f_n (Hz); 0 when the effective mass is not positive
    pub natural_frequency: f64,
    /// 1 / f_n (s); 0 when f_n is 0
    pub natural_period: f64,
    /// Tip stiffness k (N/m)
    pub stiffness: f64,
    /// Effective oscillating mass (kg)
    pub effective_mass: f64,
    /// Distributed beam mass (kg)
    pub beam_mass: f64,
}

/// Predict natural frequency and stiffness from beam geometry.
///
/// Pure and infallible: a non-positive effective mass yields `f_n = 0`.
/// A zero-length beam yields an infinite stiffness (IEEE semantics), which
/// callers are expected to have excluded via config validation.
pub fn theoretical_frequency(params: &BeamParameters) -> TheoreticalFrequency {
    let inertia = params.second_moment_of_area();
    let stiffness = 3.0 * params.youngs_modulus_pa * inertia / params.length_m.powi(3);
    let beam_mass = params.beam_mass();
    let effective_mass =
        params.test_mass_kg + params.tip_mass_kg + params.sensor_mass_kg + beam_mass / 3.0;

    let natural_frequency = if effective_mass > 0.0 {
        (stiffness / effective_mass).sqrt() / (2.0 * PI)
    } else {
        0.0
    };
    let natural_period = if natural_frequency > 0.0 {
        1.0 / natural_frequency
    } else {
        0.0
    };

    TheoreticalFrequency {
        natural_frequency,
        natural_period,
        stiffness,
        effective_mass,
        beam_mass,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hand_computed_beam() {
        let params = BeamParameters {
            test_mass_kg: 0.5,
            tip_mass_kg: 0.0,
            sensor_mass_kg: 0.0,
            youngs_modulus_pa: 200.0e9,
            breadth_m: 0.02,
            depth_m: 0.002,
            length_m: 0.2,
            density_kg_m3: 0.0,
        };
        let result = theoretical_frequency(&params);

        // I = 0.02 * 8e-9 / 12 = 1.3333e-11
        // k = 3 * 200e9 * 1.3333e-11 / 0.008 = 1000 N/m
        assert!((result.stiffness - 1000.0).abs() < 1e-6);
        assert!((result.effective_mass - 0.5).abs() < 1e-12);
        let expected = (1000.0_f64 / 0.5).sqrt() / (2.0 * PI);
        assert!((result.natural_frequency - expected).abs() < 1e-9);
        assert!((result.natural_period * result.natural_frequency - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_beam_mass_counts_one_third() {
        let params = BeamParameters::default();
        let result = theoretical_frequency(&params);
        let expected = params.tip_mass_kg + params.sensor_mass_kg + params.beam_mass() / 3.0;
        assert!((result.effective_mass - expected).abs() < 1e-12);
    }

    #[test]
    fn test_heavier_test_mass_lowers_frequency() {
        let light = theoretical_frequency(&BeamParameters::default().with_test_mass(0.1));
        let heavy = theoretical_frequency(&BeamParameters::default().with_test_mass(1.0));
        assert!(heavy.natural_frequency < light.natural_frequency);
        assert_eq!(heavy.stiffness, light.stiffness);
    }

    #[test]
    fn test_zero_effective_mass_returns_zero_frequency() {
        let params = BeamParameters {
            test_mass_kg: 0.0,
            tip_mass_kg: 0.0,
            sensor_mass_kg: 0.0,
            density_kg_m3: 0.0,
            ..BeamParameters::default()
        };
        let result = theoretical_frequency(&params);
        assert_eq!(result.natural_frequency, 0.0);
        assert_eq!(result.natural_period, 0.0);
    }

    #[test]
    fn test_negative_mass_returns_zero_frequency() {
        let params = BeamParameters::default().with_test_mass(-10.0);
        assert_eq!(theoretical_frequency(&params).natural_frequency, 0.0);
    }
}
