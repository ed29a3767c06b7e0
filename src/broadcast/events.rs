//! Outbound WebSocket events
//!
//! Serialized as `{"type": "<snake_case>", ...camelCase fields}`.

use serde::{Deserialize, Serialize};

use crate::types::{Sample, Session, SessionAnalysis, SessionSummary};

/// Connection state reported in `device_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Connected,
    Disconnected,
}

/// Resonance scalars shared by `frequency_data` and `session_data`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencySummary {
    pub frequency: f64,
    pub amplitude: f64,
    pub q_factor: f64,
    pub natural_period: f64,
    pub stiffness: f64,
    pub rms: f64,
    pub crest_factor: f64,
    pub bandwidth: f64,
}

impl FrequencySummary {
    pub fn from_analysis(analysis: &SessionAnalysis) -> Self {
        let p = &analysis.properties;
        Self {
            frequency: analysis.natural_frequency,
            amplitude: analysis.peak_amplitude,
            q_factor: p.q_factor,
            natural_period: p.natural_period,
            stiffness: p.stiffness,
            rms: p.rms,
            crest_factor: p.crest_factor,
            bandwidth: p.bandwidth,
        }
    }

    /// Summary of a session whose analysis has completed.
    pub fn from_session(session: &Session) -> Option<Self> {
        if !session.frequency_analysis_complete {
            return None;
        }
        let p = session.mechanical_properties?;
        Some(Self {
            frequency: session.natural_frequency?,
            amplitude: session.peak_amplitude.unwrap_or(0.0),
            q_factor: p.q_factor,
            natural_period: p.natural_period,
            stiffness: p.stiffness,
            rms: p.rms,
            crest_factor: p.crest_factor,
            bandwidth: p.bandwidth,
        })
    }
}

/// Every event the core sends to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OutboundEvent {
    SessionStatus {
        is_active: bool,
        session: Option<SessionSummary>,
    },
    DeviceStatus {
        device_id: String,
        status: DeviceState,
    },
    DeviceList {
        devices: Vec<String>,
    },
    TestStarted {
        session_id: String,
        session_name: String,
        test_mass: f64,
    },
    TestStopped {
        session_id: String,
    },
    SessionsList {
        sessions: Vec<SessionSummary>,
    },
    SessionData {
        session_id: String,
        data: Vec<Sample>,
        frequency_data: Option<FrequencySummary>,
    },
    VibrationData {
        session_id: String,
        device_id: String,
        timestamp: f64,
        delta_z: f64,
        frequency: Option<f64>,
        amplitude: Option<f64>,
        raw_acceleration: f64,
        is_active: bool,
    },
    FrequencyData {
        session_id: String,
        #[serde(flatten)]
        summary: FrequencySummary,
    },
    SessionDeleted {
        session_id: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        error: Option<String>,
    },
    Error {
        message: String,
    },
}

impl OutboundEvent {
    pub fn session_status(active: Option<&Session>) -> Self {
        Self::SessionStatus {
            is_active: active.is_some(),
            session: active.map(Session::summary),
        }
    }

    pub fn vibration(sample: &Sample) -> Self {
        Self::VibrationData {
            session_id: sample.session_id.clone(),
            device_id: sample.device_id.clone(),
            timestamp: sample.timestamp,
            delta_z: sample.delta_z,
            frequency: sample.frequency,
            amplitude: sample.amplitude,
            raw_acceleration: sample.raw_acceleration,
            is_active: true,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Wire name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStatus { .. } => "session_status",
            Self::DeviceStatus { .. } => "device_status",
            Self::DeviceList { .. } => "device_list",
            Self::TestStarted { .. } => "test_started",
            Self::TestStopped { .. } => "test_stopped",
            Self::SessionsList { .. } => "sessions_list",
            Self::SessionData { .. } => "session_data",
            Self::VibrationData { .. } => "vibration_data",
            Self::FrequencyData { .. } => "frequency_data",
            Self::SessionDeleted { .. } => "session_deleted",
            Self::Error { .. } => "error",
        }
    }
}
