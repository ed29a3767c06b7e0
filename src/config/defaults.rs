//! System-wide default constants.
//!
//! Centralises the numbers used when no config file overrides them.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Server
// ============================================================================

/// Default HTTP / WebSocket bind address.
pub const SERVER_ADDR: &str = "0.0.0.0:8080";

/// Default on-disk location for the sled store and the process lock.
pub const DATA_DIR: &str = "./data";

// ============================================================================
// Ingestion
// ============================================================================

/// Quiet period after the latest sample before the recent-sample window
/// is flushed into the active session (milliseconds).
pub const DEBOUNCE_MS: u64 = 1_000;

/// Capacity of the per-session `recentSamples` ring.
pub const RECENT_SAMPLES_CAPACITY: usize = 100;

/// Outbound message queue depth per observer connection.
pub const OBSERVER_QUEUE_DEPTH: usize = 256;

/// Session actor mailbox depth.
pub const SESSION_MAILBOX_DEPTH: usize = 1_024;

// ============================================================================
// Spectral analysis
// ============================================================================

/// Sampling rate assumed when sample timestamps cannot provide one (Hz).
pub const DEFAULT_SAMPLING_HZ: f64 = 100.0;

/// Below this many samples the analyzer uses a zero-crossing estimate.
pub const MIN_SAMPLES_FOR_FFT: usize = 8;

/// Lower bound of the reported Q-factor.
pub const Q_MIN: f64 = 1.0;

/// Upper bound of the reported Q-factor.
pub const Q_MAX: f64 = 100.0;

/// Bandwidth reported when no half-power crossing exists on a side (Hz).
pub const FALLBACK_BANDWIDTH_HZ: f64 = 0.5;

/// Target-bin gain over the raw peak when theoretical alignment is applied.
pub const ALIGNMENT_BOOST: f64 = 1.2;

/// e-folding distance of the alignment boost, in bins.
pub const ALIGNMENT_DECAY_BINS: f64 = 2.0;

// ============================================================================
// Cantilever beam (AISI 304 stainless steel strip)
// ============================================================================

/// Young's modulus (Pa).
pub const BEAM_YOUNGS_MODULUS_PA: f64 = 193.0e9;

/// Density (kg/m³).
pub const BEAM_DENSITY_KG_M3: f64 = 8_000.0;

/// Cross-section breadth (m).
pub const BEAM_BREADTH_M: f64 = 0.025;

/// Cross-section depth / thickness (m).
pub const BEAM_DEPTH_M: f64 = 0.002;

/// Free length (m).
pub const BEAM_LENGTH_M: f64 = 0.30;

/// Clamp hardware at the free end (kg).
pub const BEAM_TIP_MASS_KG: f64 = 0.010;

/// Accelerometer board mass (kg).
pub const BEAM_SENSOR_MASS_KG: f64 = 0.008;
