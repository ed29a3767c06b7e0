//! Test session records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::RecentSample;

// ============================================================================
// Session
// ============================================================================

/// One measurement run on the rig.
///
/// At most one session is active process-wide; the session actor is the
/// only writer of `is_active`, `end_time` and the analysis fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// Unique across the store
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// Mass under test (kg)
    pub test_mass: f64,
    /// Bounded window of the latest samples, oldest first
    #[serde(default)]
    pub recent_samples: VecDeque<RecentSample>,
    pub natural_frequency: Option<f64>,
    pub peak_amplitude: Option<f64>,
    #[serde(default)]
    pub frequency_analysis_complete: bool,
    pub mechanical_properties: Option<MechanicalProperties>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A fresh, active session.
    pub fn start(name: impl Into<String>, test_mass: f64) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            start_time: now,
            end_time: None,
            is_active: true,
            test_mass,
            recent_samples: VecDeque::new(),
            natural_frequency: None,
            peak_amplitude: None,
            frequency_analysis_complete: false,
            mechanical_properties: None,
            created_at: now,
        }
    }

    /// Append a batch to `recent_samples`, evicting the oldest entries so
    /// at most `capacity` remain.
    pub fn append_recent<I>(&mut self, batch: I, capacity: usize)
    where
        I: IntoIterator<Item = RecentSample>,
    {
        self.recent_samples.extend(batch);
        let excess = self.recent_samples.len().saturating_sub(capacity);
        self.recent_samples.drain(..excess);
    }

    /// Mark the session ended.
    pub fn seal(&mut self) {
        self.is_active = false;
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
    }

    /// Fold an analysis result into the record.
    pub fn apply_analysis(&mut self, analysis: &SessionAnalysis) {
        self.natural_frequency = Some(analysis.natural_frequency);
        self.peak_amplitude = Some(analysis.peak_amplitude);
        self.mechanical_properties = Some(analysis.properties);
        self.frequency_analysis_complete = true;
    }

    /// List view without the embedded sample window.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            is_active: self.is_active,
            test_mass: self.test_mass,
            natural_frequency: self.natural_frequency,
            peak_amplitude: self.peak_amplitude,
            frequency_analysis_complete: self.frequency_analysis_complete,
            mechanical_properties: self.mechanical_properties,
        }
    }
}

/// Session without `recent_samples`, used for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub test_mass: f64,
    pub natural_frequency: Option<f64>,
    pub peak_amplitude: Option<f64>,
    pub frequency_analysis_complete: bool,
    pub mechanical_properties: Option<MechanicalProperties>,
}

// ============================================================================
// Derived resonance properties
// ============================================================================

/// Resonance characteristics derived when a session is sealed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MechanicalProperties {
    /// 1 / f_n (s)
    pub natural_period: f64,
    /// k = (2π f_n)² m_eff (N/m)
    pub stiffness: f64,
    /// Viscous damping c = sqrt(k m_eff) / Q (N·s/m)
    pub damping_coefficient: f64,
    pub q_factor: f64,
    /// RMS of deltaZ
    pub rms: f64,
    /// Peak |deltaZ| over RMS
    pub crest_factor: f64,
    /// Half-power bandwidth (Hz)
    pub bandwidth: f64,
    /// Dynamic amplification at resonance (≈ Q)
    pub resonance_magnification: f64,
}

/// Everything the summary step writes back to a sealed session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAnalysis {
    pub natural_frequency: f64,
    pub peak_amplitude: f64,
    pub properties: MechanicalProperties,
    /// Number of samples the analysis ran over
    pub sample_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recent(i: usize) -> RecentSample {
        RecentSample {
            session_id: "s".to_string(),
            device_id: "d".to_string(),
            timestamp: i as f64,
            delta_z: i as f64,
            raw_acceleration: 0.0,
            frequency: None,
            amplitude: None,
        }
    }

    #[test]
    fn test_new_session_is_active() {
        let session = Session::start("Test A", 1.0);
        assert!(session.is_active);
        assert!(session.end_time.is_none());
        assert!(!session.frequency_analysis_complete);
        assert!(!session.id.is_empty());
    }

    #[test]
    fn test_ring_keeps_most_recent_in_order() {
        let mut session = Session::start("ring", 0.0);
        session.append_recent((0..60).map(recent), 100);
        session.append_recent((60..250).map(recent), 100);

        assert_eq!(session.recent_samples.len(), 100);
        let stamps: Vec<f64> = session.recent_samples.iter().map(|r| r.timestamp).collect();
        let expected: Vec<f64> = (150..250).map(|i| i as f64).collect();
        assert_eq!(stamps, expected);
    }

    #[test]
    fn test_ring_under_capacity_keeps_everything() {
        let mut session = Session::start("ring", 0.0);
        session.append_recent((0..10).map(recent), 100);
        assert_eq!(session.recent_samples.len(), 10);
        assert_eq!(session.recent_samples.front().map(|r| r.timestamp), Some(0.0));
    }

    #[test]
    fn test_seal_keeps_first_end_time() {
        let mut session = Session::start("seal", 0.0);
        session.seal();
        let first = session.end_time;
        session.seal();
        assert!(!session.is_active);
        assert_eq!(session.end_time, first);
    }
}
