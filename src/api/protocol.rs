//! Inbound WebSocket messages
//!
//! Frames are decoded once at the boundary into [`InboundMessage`] and
//! matched exhaustively; nothing downstream looks at the raw `type` string.

use serde::{Deserialize, Serialize};

use crate::types::Reading;

/// Everything a device or observer may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum InboundMessage {
    /// A sensing device announcing itself on this connection
    DeviceConnected { device_id: String },

    /// One accelerometer reading
    FftResult {
        device_id: String,
        timestamp: f64,
        delta_z: f64,
        #[serde(default)]
        frequency: Option<f64>,
        #[serde(default)]
        amplitude: Option<f64>,
        #[serde(rename = "raw_acceleration", alias = "rawAcceleration", default)]
        raw_acceleration: f64,
    },

    GetDeviceList,

    GetSessions,

    GetSessionData { session_id: String },

    StartTest { session_name: String, test_mass: f64 },

    StopTest,

    DeleteSession { session_id: String },
}

impl InboundMessage {
    /// The reading carried by an `fft_result`, with its device id.
    pub fn reading(&self) -> Option<(&str, Reading)> {
        match self {
            Self::FftResult {
                device_id,
                timestamp,
                delta_z,
                frequency,
                amplitude,
                raw_acceleration,
            } => Some((
                device_id.as_str(),
                Reading {
                    timestamp: *timestamp,
                    delta_z: *delta_z,
                    raw_acceleration: *raw_acceleration,
                    frequency: *frequency,
                    amplitude: *amplitude,
                },
            )),
            _ => None,
        }
    }
}

/// A frame that could not be turned into an [`InboundMessage`].
///
/// Answered with an `error` event; the connection stays open.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("binary frames are not supported")]
    Binary,
}

pub fn decode(text: &str) -> Result<InboundMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_device_reading() {
        let msg = decode(
            r#"{"type":"fft_result","deviceId":"esp32-a","timestamp":1200,"deltaZ":0.25,
                "frequency":5.1,"amplitude":0.3,"raw_acceleration":10.05}"#,
        )
        .unwrap();

        let (device, reading) = msg.reading().unwrap();
        assert_eq!(device, "esp32-a");
        assert_eq!(reading.timestamp, 1200.0);
        assert_eq!(reading.delta_z, 0.25);
        assert_eq!(reading.raw_acceleration, 10.05);
        assert_eq!(reading.frequency, Some(5.1));
    }

    #[test]
    fn test_optional_reading_fields_default() {
        let msg = decode(r#"{"type":"fft_result","deviceId":"d","timestamp":1,"deltaZ":0.1}"#).unwrap();
        let (_, reading) = msg.reading().unwrap();
        assert_eq!(reading.frequency, None);
        assert_eq!(reading.raw_acceleration, 0.0);
    }

    #[test]
    fn test_decode_observer_requests() {
        assert_eq!(
            decode(r#"{"type":"get_device_list"}"#).unwrap(),
            InboundMessage::GetDeviceList
        );
        assert_eq!(
            decode(r#"{"type":"start_test","sessionName":"Test A","testMass":1.5}"#).unwrap(),
            InboundMessage::StartTest {
                session_name: "Test A".to_string(),
                test_mass: 1.5
            }
        );
        assert_eq!(
            decode(r#"{"type":"delete_session","sessionId":"abc"}"#).unwrap(),
            InboundMessage::DeleteSession {
                session_id: "abc".to_string()
            }
        );
        assert!(decode(r#"{"type":"stop_test","extra":true}"#).is_ok());
    }

    #[test]
    fn test_malformed_frames_rejected() {
        for bad in [
            "not json",
            r#"{"type":"self_destruct"}"#,
            r#"{"type":"start_test","sessionName":"x"}"#,
            r#"{"deviceId":"no type"}"#,
        ] {
            assert!(matches!(decode(bad), Err(ProtocolError::Malformed(_))), "{bad}");
        }
    }
}
