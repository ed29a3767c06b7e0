//! Physics Engine Module
//!
//! Deterministic calculations for the cantilever rig. All math here is
//! closed-form mechanics or spectral statistics.
//!
//! - `theoretical_frequency()` - beam-theory natural frequency and stiffness
//! - `summarize_session()` - measured resonance properties of a sealed session

pub mod beam;
pub mod resonance;

pub use beam::{theoretical_frequency, BeamParameters, TheoreticalFrequency};
pub use resonance::{summarize_session, ResonanceReport};
