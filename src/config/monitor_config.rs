//! Monitor Configuration - server, storage, ingestion and analysis tunables
//!
//! Each struct implements `Default` with the values in [`super::defaults`],
//! so a missing file or a missing section behaves exactly like the built-ins.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;
use crate::physics_engine::BeamParameters;

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "RESONANCE_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "resonance.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a monitor deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// HTTP / WebSocket server
    #[serde(default)]
    pub server: ServerConfig,

    /// Persistence backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Sample ingestion and recent-window batching
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Spectral analyzer tuning
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Cantilever rig used by the theoretical frequency model
    #[serde(default)]
    pub beam: BeamParameters,
}

impl MonitorConfig {
    /// Load configuration using the standard search order:
    /// 1. explicit path (CLI flag)
    /// 2. `$RESONANCE_CONFIG`
    /// 3. `./resonance.toml`
    /// 4. Built-in defaults
    pub fn load(explicit: Option<&Path>) -> Self {
        if let Some(p) = explicit {
            match Self::load_from_file(p) {
                Ok(config) => {
                    info!(path = %p.display(), "Loaded config from --config");
                    return config;
                }
                Err(e) => {
                    warn!(path = %p.display(), error = %e, "Failed to load --config file, falling back");
                }
            }
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Read, parse and validate a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Write the configuration to `path`.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let text = self.to_toml()?;
        std::fs::write(path, text).map_err(|e| ConfigError::Io(path.to_path_buf(), e))
    }

    /// Check cross-field constraints. Every problem is reported, not just the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.server.addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!("server.addr '{}' is not a socket address", self.server.addr));
        }

        if self.ingest.debounce_ms == 0 {
            errors.push("ingest.debounce_ms must be > 0".to_string());
        }
        if self.ingest.recent_capacity == 0 {
            errors.push("ingest.recent_capacity must be > 0".to_string());
        }
        if self.ingest.observer_queue == 0 {
            errors.push("ingest.observer_queue must be > 0".to_string());
        }

        let a = &self.analysis;
        Self::check_positive(a.default_sampling_hz, "analysis.default_sampling_hz", &mut errors);
        Self::check_positive(a.fallback_bandwidth_hz, "analysis.fallback_bandwidth_hz", &mut errors);
        Self::check_positive(a.q_min, "analysis.q_min", &mut errors);
        Self::check_positive(a.q_max, "analysis.q_max", &mut errors);
        if !(a.q_max > a.q_min) {
            errors.push(format!(
                "analysis.q_max ({}) must be greater than analysis.q_min ({})",
                a.q_max, a.q_min
            ));
        }
        if !(a.alignment_boost >= 1.0) {
            errors.push(format!("analysis.alignment_boost ({}) must be >= 1", a.alignment_boost));
        }
        Self::check_positive(a.alignment_decay_bins, "analysis.alignment_decay_bins", &mut errors);

        let b = &self.beam;
        Self::check_positive(b.youngs_modulus_pa, "beam.youngs_modulus_pa", &mut errors);
        Self::check_positive(b.breadth_m, "beam.breadth_m", &mut errors);
        Self::check_positive(b.depth_m, "beam.depth_m", &mut errors);
        Self::check_positive(b.length_m, "beam.length_m", &mut errors);
        Self::check_non_negative(b.density_kg_m3, "beam.density_kg_m3", &mut errors);
        Self::check_non_negative(b.tip_mass_kg, "beam.tip_mass_kg", &mut errors);
        Self::check_non_negative(b.sensor_mass_kg, "beam.sensor_mass_kg", &mut errors);
        Self::check_non_negative(b.test_mass_kg, "beam.test_mass_kg", &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_positive(value: f64, name: &str, errors: &mut Vec<String>) {
        if !(value.is_finite() && value > 0.0) {
            errors.push(format!("{} ({}) must be a positive number", name, value));
        }
    }

    fn check_non_negative(value: f64, name: &str, errors: &mut Vec<String>) {
        if !(value.is_finite() && value >= 0.0) {
            errors.push(format!("{} ({}) must be a non-negative number", name, value));
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({path}): {err}", path = .0.display(), err = .1)]
    Io(PathBuf, std::io::Error),

    #[error("Config parse error ({path}): {err}", path = .0.display(), err = .1)]
    Parse(PathBuf, toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Sections
// ============================================================================

/// HTTP / WebSocket server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    ///
    /// Can be overridden by `RESONANCE_SERVER_ADDR` env var or `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

/// Which persistence gateway backs the session store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sled,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub backend: StorageBackend,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(defaults::DATA_DIR)
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: StorageBackend::default(),
        }
    }
}

/// Ingestion tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Debounce quiet period before the recent-sample flush (ms)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// `recentSamples` ring capacity per session
    #[serde(default = "default_recent_capacity")]
    pub recent_capacity: usize,

    /// Outbound queue depth per WebSocket connection
    #[serde(default = "default_observer_queue")]
    pub observer_queue: usize,
}

fn default_debounce_ms() -> u64 {
    defaults::DEBOUNCE_MS
}
fn default_recent_capacity() -> usize {
    defaults::RECENT_SAMPLES_CAPACITY
}
fn default_observer_queue() -> usize {
    defaults::OBSERVER_QUEUE_DEPTH
}

impl IngestConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            recent_capacity: default_recent_capacity(),
            observer_queue: default_observer_queue(),
        }
    }
}

/// Spectral analyzer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Sampling rate used when timestamps are unusable (Hz)
    #[serde(default = "default_sampling_hz")]
    pub default_sampling_hz: f64,

    #[serde(default = "default_q_min")]
    pub q_min: f64,

    #[serde(default = "default_q_max")]
    pub q_max: f64,

    /// Bandwidth used when a half-power crossing is missing (Hz)
    #[serde(default = "default_fallback_bandwidth_hz")]
    pub fallback_bandwidth_hz: f64,

    /// Reconcile the reported peak with the beam model
    #[serde(default)]
    pub theoretical_alignment: bool,

    /// Target-bin magnitude relative to the raw peak when aligning
    #[serde(default = "default_alignment_boost")]
    pub alignment_boost: f64,

    /// Boost decay distance in bins
    #[serde(default = "default_alignment_decay_bins")]
    pub alignment_decay_bins: f64,
}

fn default_sampling_hz() -> f64 {
    defaults::DEFAULT_SAMPLING_HZ
}
fn default_q_min() -> f64 {
    defaults::Q_MIN
}
fn default_q_max() -> f64 {
    defaults::Q_MAX
}
fn default_fallback_bandwidth_hz() -> f64 {
    defaults::FALLBACK_BANDWIDTH_HZ
}
fn default_alignment_boost() -> f64 {
    defaults::ALIGNMENT_BOOST
}
fn default_alignment_decay_bins() -> f64 {
    defaults::ALIGNMENT_DECAY_BINS
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_sampling_hz: default_sampling_hz(),
            q_min: default_q_min(),
            q_max: default_q_max(),
            fallback_bandwidth_hz: default_fallback_bandwidth_hz(),
            theoretical_alignment: false,
            alignment_boost: default_alignment_boost(),
            alignment_decay_bins: default_alignment_decay_bins(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(MonitorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: MonitorConfig = toml::from_str(
            r#"
            [ingest]
            debounce_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.ingest.debounce_ms, 250);
        assert_eq!(config.ingest.recent_capacity, defaults::RECENT_SAMPLES_CAPACITY);
        assert_eq!(config.server.addr, defaults::SERVER_ADDR);
        assert_eq!(config.storage.backend, StorageBackend::Sled);
    }

    #[test]
    fn test_validation_collects_every_error() {
        let mut config = MonitorConfig::default();
        config.ingest.debounce_ms = 0;
        config.analysis.q_max = 0.5;
        config.beam.length_m = -1.0;

        match config.validate() {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 3, "{errors:?}"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resonance.toml");

        let mut config = MonitorConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.analysis.theoretical_alignment = true;
        config.save_to_file(&path).unwrap();

        let loaded = MonitorConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.storage.backend, StorageBackend::Memory);
        assert!(loaded.analysis.theoretical_alignment);
    }
}
