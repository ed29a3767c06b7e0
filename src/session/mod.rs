//! Session state machine
//!
//! A single actor owns the current session (`NoSession → Active → Sealed`)
//! and the debounced recent-sample buffer. Everything else talks to it
//! through a cloneable [`SessionHandle`].

mod actor;
mod coalescer;

pub use actor::{SessionActor, SessionHandle};
pub use coalescer::CoalescingBuffer;

use tokio_util::task::TaskTracker;

use crate::processing::ProcessingError;
use crate::storage::PersistenceError;

/// Identity of the active session, published to ingestion.
///
/// `writes` tracks the standalone sample writes issued for this session; it
/// is closed when the session leaves the active state so the summary step
/// can wait for them to land.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub id: String,
    pub name: String,
    pub test_mass: f64,
    pub writes: TaskTracker,
}

/// Session lifecycle errors, reported to the requesting client.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("session '{0}' is already active")]
    Conflict(String),

    #[error("no active session")]
    NoActiveSession,

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("a session named '{0}' already exists")]
    DuplicateName(String),

    #[error("storage failure: {0}")]
    Persistence(PersistenceError),

    #[error("analysis failed: {0}")]
    Analysis(#[from] ProcessingError),

    #[error("session service unavailable")]
    Unavailable,
}

impl From<PersistenceError> for SessionError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound(id) => SessionError::NotFound(id),
            PersistenceError::DuplicateName(name) => SessionError::DuplicateName(name),
            other => SessionError::Persistence(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_errors_map_to_session_errors() {
        assert!(matches!(
            SessionError::from(PersistenceError::DuplicateName("a".into())),
            SessionError::DuplicateName(n) if n == "a"
        ));
        assert!(matches!(
            SessionError::from(PersistenceError::NotFound("x".into())),
            SessionError::NotFound(_)
        ));
        assert!(matches!(
            SessionError::from(PersistenceError::Storage("disk".into())),
            SessionError::Persistence(_)
        ));
    }
}
