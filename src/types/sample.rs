//! Raw accelerometer samples and their recent-window projection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Sample
// ============================================================================

/// One accelerometer reading, tagged with the session it was recorded in.
///
/// Immutable once created. Owned by ingestion until the persistence gateway
/// accepts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub session_id: String,
    pub device_id: String,
    /// Device clock, milliseconds
    pub timestamp: f64,
    /// Z-axis deviation from rest (the analysed signal)
    pub delta_z: f64,
    /// Raw Z-axis acceleration
    pub raw_acceleration: f64,
    /// Per-sample frequency estimate from the device, if it sends one
    pub frequency: Option<f64>,
    /// Per-sample amplitude estimate from the device, if it sends one
    pub amplitude: Option<f64>,
    /// Server receive time
    pub received_at: DateTime<Utc>,
}

impl Sample {
    /// The slice of this sample kept in a session's `recentSamples` window.
    pub fn projection(&self) -> RecentSample {
        RecentSample {
            session_id: self.session_id.clone(),
            device_id: self.device_id.clone(),
            timestamp: self.timestamp,
            delta_z: self.delta_z,
            raw_acceleration: self.raw_acceleration,
            frequency: self.frequency,
            amplitude: self.amplitude,
        }
    }
}

/// A device reading before it is attributed to a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub timestamp: f64,
    pub delta_z: f64,
    pub raw_acceleration: f64,
    pub frequency: Option<f64>,
    pub amplitude: Option<f64>,
}

impl Reading {
    /// Attribute the reading to a session.
    pub fn into_sample(self, session_id: &str, device_id: &str) -> Sample {
        Sample {
            session_id: session_id.to_string(),
            device_id: device_id.to_string(),
            timestamp: self.timestamp,
            delta_z: self.delta_z,
            raw_acceleration: self.raw_acceleration,
            frequency: self.frequency,
            amplitude: self.amplitude,
            received_at: Utc::now(),
        }
    }
}

// ============================================================================
// Recent-window projection
// ============================================================================

/// Compact copy of a sample embedded in `Session::recent_samples`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentSample {
    pub session_id: String,
    pub device_id: String,
    pub timestamp: f64,
    pub delta_z: f64,
    pub raw_acceleration: f64,
    pub frequency: Option<f64>,
    pub amplitude: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_attribution() {
        let reading = Reading {
            timestamp: 1_250.0,
            delta_z: 0.12,
            raw_acceleration: 9.93,
            frequency: Some(4.9),
            amplitude: None,
        };
        let sample = reading.into_sample("s-1", "esp32-a");
        assert_eq!(sample.session_id, "s-1");
        assert_eq!(sample.device_id, "esp32-a");
        assert_eq!(sample.timestamp, 1_250.0);

        let recent = sample.projection();
        assert_eq!(recent.delta_z, 0.12);
        assert_eq!(recent.frequency, Some(4.9));
        assert_eq!(recent.amplitude, None);
    }

    #[test]
    fn test_sample_wire_names_are_camel_case() {
        let sample = Reading {
            timestamp: 1.0,
            delta_z: 0.5,
            raw_acceleration: 9.8,
            frequency: None,
            amplitude: None,
        }
        .into_sample("s", "d");
        let json = serde_json::to_value(&sample).unwrap();
        assert!(json.get("deltaZ").is_some());
        assert!(json.get("rawAcceleration").is_some());
        assert!(json.get("receivedAt").is_some());
    }
}
