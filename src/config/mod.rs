//! Monitor Configuration Module
//!
//! Provides the server, storage, ingestion, analysis and beam configuration
//! loaded from a TOML file.
//!
//! ## Loading Order
//!
//! 1. `--config` CLI flag (path to TOML file)
//! 2. `RESONANCE_CONFIG` environment variable
//! 3. `resonance.toml` in the current working directory
//! 4. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! config::init(MonitorConfig::load(None));
//! let debounce = config::get().ingest.debounce();
//! ```

mod monitor_config;
pub mod defaults;

pub use monitor_config::*;

use std::sync::OnceLock;

/// Global configuration, initialized once at startup.
static MONITOR_CONFIG: OnceLock<MonitorConfig> = OnceLock::new();

/// Initialize the global configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: MonitorConfig) {
    if MONITOR_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get a reference to the global configuration.
///
/// Falls back to the built-in defaults when `init()` has not been called,
/// so library users and tests do not need a startup step.
pub fn get() -> &'static MonitorConfig {
    MONITOR_CONFIG.get_or_init(MonitorConfig::default)
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    MONITOR_CONFIG.get().is_some()
}
