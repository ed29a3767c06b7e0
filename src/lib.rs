//! Resonance Monitor: cantilever vibration acquisition and resonance analysis
//!
//! Sensing devices stream accelerometer readings over a WebSocket; the
//! server attributes them to the active test session, fans them out to
//! observers, and derives the structure's natural frequency, quality factor,
//! stiffness and damping when the session is stopped.
//!
//! ## Architecture
//!
//! - **Acquisition**: device registry and reading ingestion
//! - **Session**: single actor owning the active session and its debounced buffer
//! - **Broadcast**: per-connection outbound queues for observers
//! - **Processing / Physics Engine**: spectral analysis and mechanical properties
//! - **Storage**: persistence gateway over sled or memory

pub mod acquisition;
pub mod api;
pub mod broadcast;
pub mod config;
pub mod physics_engine;
pub mod processing;
pub mod session;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::MonitorConfig;

// Re-export commonly used types
pub use types::{
    MechanicalProperties, Reading, RecentSample, Sample, Session, SessionAnalysis,
    SessionSummary, SpectrumMethod, SpectrumResult,
};

// Re-export the core services
pub use api::{create_app, MonitorState};
pub use session::{SessionActor, SessionError, SessionHandle};
pub use storage::{open_gateway, PersistenceError, PersistenceGateway};
