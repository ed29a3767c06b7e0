//! Shared data structures for vibration acquisition and resonance analysis
//!
//! - `Sample` / `Reading`: accelerometer readings as received and stored
//! - `Session`: one test run with its recent-sample window and derived properties
//! - `SpectrumResult`: analyzer output, never persisted directly

mod sample;
mod session;
mod spectrum;

pub use sample::*;
pub use session::*;
pub use spectrum::*;
