//! Sample ingestion
//!
//! The hot path for device readings:
//! 1. No active session → drop silently
//! 2. Persist the standalone record on the blocking pool (not awaited)
//! 3. Queue the projection for the debounced recent-sample window without
//!    waiting on the session mailbox
//! 4. Broadcast `vibration_data` to observers
//!
//! A failed sample write is counted and logged; it never reaches the device.

use std::sync::Arc;

use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;

use super::IngestStats;
use crate::broadcast::{ObserverSet, OutboundEvent};
use crate::session::SessionHandle;
use crate::storage::PersistenceGateway;
use crate::types::Reading;

/// What happened to one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted,
    DroppedIdle,
}

#[derive(Clone)]
pub struct Ingestor {
    sessions: SessionHandle,
    gateway: Arc<dyn PersistenceGateway>,
    observers: ObserverSet,
    stats: Arc<IngestStats>,
}

impl Ingestor {
    pub fn new(
        sessions: SessionHandle,
        gateway: Arc<dyn PersistenceGateway>,
        observers: ObserverSet,
        stats: Arc<IngestStats>,
    ) -> Self {
        Self {
            sessions,
            gateway,
            observers,
            stats,
        }
    }

    /// Ingest one reading from `device_id`.
    pub async fn ingest(&self, device_id: &str, reading: Reading) -> IngestOutcome {
        let Some(active) = self.sessions.active() else {
            self.stats.record_dropped_idle();
            tracing::trace!(device_id, "No active session, sample dropped");
            return IngestOutcome::DroppedIdle;
        };

        let sample = reading.into_sample(&active.id, device_id);
        let projection = sample.projection();
        let event = OutboundEvent::vibration(&sample);

        let Some(token) = track_write(&active.writes) else {
            // The session left the active state after we read it
            self.stats.record_dropped_idle();
            tracing::trace!(device_id, "Session closed during ingest, sample dropped");
            return IngestOutcome::DroppedIdle;
        };

        let gateway = Arc::clone(&self.gateway);
        let stats = Arc::clone(&self.stats);
        tokio::task::spawn_blocking(move || {
            let _token = token;
            if let Err(e) = gateway.create_sample(&sample) {
                stats.record_write_failure();
                tracing::warn!(
                    session_id = %sample.session_id,
                    timestamp = sample.timestamp,
                    error = %e,
                    "Sample write failed"
                );
            }
        });
        self.stats.record_accepted();

        if !self.sessions.try_buffer(projection) {
            self.stats.record_projection_dropped();
            tracing::debug!(device_id, "Session mailbox full, recent-sample projection dropped");
        }

        self.observers.broadcast(&event);
        IngestOutcome::Accepted
    }
}

/// Register a pending write on `writes`, or `None` once it is closed.
///
/// The token is taken before the closed check, so a stop or delete that
/// closes the tracker afterwards waits for the write.
fn track_write(writes: &TaskTracker) -> Option<TaskTrackerToken> {
    let token = writes.token();
    if writes.is_closed() {
        None
    } else {
        Some(token)
    }
}
