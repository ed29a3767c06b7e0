//! Device Registry - which sensing devices are connected right now
//!
//! Ephemeral: rebuilt from nothing on restart, devices re-announce after
//! reconnecting.

use dashmap::DashMap;

use crate::broadcast::{ConnectionId, DeviceState, ObserverSet, OutboundEvent};

#[derive(Clone)]
pub struct DeviceRegistry {
    devices: std::sync::Arc<DashMap<String, ConnectionId>>,
    observers: ObserverSet,
}

impl DeviceRegistry {
    pub fn new(observers: ObserverSet) -> Self {
        Self {
            devices: std::sync::Arc::new(DashMap::new()),
            observers,
        }
    }

    /// Register (or re-register) `device_id` on `connection` and announce it.
    pub fn device_connected(&self, device_id: &str, connection: ConnectionId) {
        let previous = self.devices.insert(device_id.to_string(), connection);
        tracing::info!(
            device_id,
            connection,
            reconnect = previous.is_some(),
            "Device connected"
        );
        self.observers.broadcast(&OutboundEvent::DeviceStatus {
            device_id: device_id.to_string(),
            status: DeviceState::Connected,
        });
    }

    /// Forget every device registered on `connection` and announce each.
    ///
    /// A connection that never registered, or whose device has since
    /// re-registered elsewhere, is a no-op.
    pub fn device_disconnected(&self, connection: ConnectionId) -> Vec<String> {
        let owned: Vec<String> = self
            .devices
            .iter()
            .filter(|entry| *entry.value() == connection)
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = Vec::with_capacity(owned.len());
        for device_id in owned {
            if self
                .devices
                .remove_if(&device_id, |_, conn| *conn == connection)
                .is_some()
            {
                tracing::info!(device_id = %device_id, connection, "Device disconnected");
                self.observers.broadcast(&OutboundEvent::DeviceStatus {
                    device_id: device_id.clone(),
                    status: DeviceState::Disconnected,
                });
                removed.push(device_id);
            }
        }
        removed
    }

    /// Snapshot of connected device ids, sorted.
    pub fn list_connected(&self) -> Vec<String> {
        let mut devices: Vec<String> = self.devices.iter().map(|e| e.key().clone()).collect();
        devices.sort();
        devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_watcher() -> (DeviceRegistry, tokio::sync::mpsc::Receiver<crate::broadcast::Frame>) {
        let observers = ObserverSet::new(16);
        let (id, tx, rx) = observers.open_connection();
        observers.insert(id, tx);
        (DeviceRegistry::new(observers), rx)
    }

    #[tokio::test]
    async fn test_connect_and_disconnect_announced() {
        let (registry, mut rx) = registry_with_watcher();
        registry.device_connected("esp32-a", 10);
        assert_eq!(registry.list_connected(), vec!["esp32-a"]);

        let removed = registry.device_disconnected(10);
        assert_eq!(removed, vec!["esp32-a"]);
        assert!(registry.is_empty());

        let connected: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(connected["type"], "device_status");
        assert_eq!(connected["status"], "connected");
        let gone: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(gone["status"], "disconnected");
        assert_eq!(gone["deviceId"], "esp32-a");
    }

    #[test]
    fn test_unregistered_disconnect_is_noop() {
        let registry = DeviceRegistry::new(ObserverSet::new(4));
        registry.device_connected("esp32-a", 1);
        assert!(registry.device_disconnected(99).is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reconnect_survives_stale_disconnect() {
        let registry = DeviceRegistry::new(ObserverSet::new(4));
        registry.device_connected("esp32-a", 1);
        // Device comes back on a new connection before the old one closes
        registry.device_connected("esp32-a", 2);
        assert!(registry.device_disconnected(1).is_empty());
        assert_eq!(registry.list_connected(), vec!["esp32-a"]);
    }
}
