//! PersistenceGateway trait: pluggable storage backend
//!
//! The session actor and ingestion talk to storage only through this trait:
//! - `InMemoryStore`: tests and `--in-memory` runs
//! - `SledStore`: durable default (see `sled_store`)

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::{Sample, Session};

/// Trait for pluggable persistence backends
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across async tasks. Calls are synchronous; async callers run them on the
/// blocking pool.
pub trait PersistenceGateway: Send + Sync {
    /// Insert a new session. Fails with `DuplicateName` if the name is taken.
    fn create_session(&self, session: &Session) -> Result<(), PersistenceError>;

    /// Fetch a session by id
    fn find_session(&self, id: &str) -> Result<Option<Session>, PersistenceError>;

    /// Overwrite an existing session. Fails with `NotFound` if absent.
    fn update_session(&self, session: &Session) -> Result<(), PersistenceError>;

    /// Remove a session record (samples are removed separately).
    /// Fails with `NotFound` if absent.
    fn delete_session(&self, id: &str) -> Result<(), PersistenceError>;

    /// All sessions, newest `created_at` first
    fn list_sessions(&self) -> Result<Vec<Session>, PersistenceError>;

    /// The `limit` most recently created sessions
    fn list_recent_sessions(&self, limit: usize) -> Result<Vec<Session>, PersistenceError> {
        let mut sessions = self.list_sessions()?;
        sessions.truncate(limit);
        Ok(sessions)
    }

    /// Append one standalone sample record
    fn create_sample(&self, sample: &Sample) -> Result<(), PersistenceError>;

    /// All samples of a session in ascending timestamp order
    fn list_samples_by_session(&self, session_id: &str) -> Result<Vec<Sample>, PersistenceError>;

    /// Remove all samples of a session, returning how many were removed
    fn delete_samples_by_session(&self, session_id: &str) -> Result<usize, PersistenceError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Persistence errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PersistenceError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("a session named '{0}' already exists")]
    DuplicateName(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sled::Error> for PersistenceError {
    fn from(err: sled::Error) -> Self {
        PersistenceError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// In-memory persistence for testing and `--in-memory` runs
///
/// Thread-safe via `RwLock`. Not durable: data is lost on restart.
#[derive(Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<String, Session>>,
    /// Per-session samples, kept sorted by timestamp (arrival order on ties)
    samples: RwLock<HashMap<String, Vec<Sample>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions_read(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn sessions_write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn samples_write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<Sample>>> {
        self.samples.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PersistenceGateway for InMemoryStore {
    fn create_session(&self, session: &Session) -> Result<(), PersistenceError> {
        let mut store = self.sessions_write();
        if store.values().any(|s| s.name == session.name) {
            return Err(PersistenceError::DuplicateName(session.name.clone()));
        }
        store.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn find_session(&self, id: &str) -> Result<Option<Session>, PersistenceError> {
        Ok(self.sessions_read().get(id).cloned())
    }

    fn update_session(&self, session: &Session) -> Result<(), PersistenceError> {
        match self.sessions_write().get_mut(&session.id) {
            Some(existing) => {
                *existing = session.clone();
                Ok(())
            }
            None => Err(PersistenceError::NotFound(session.id.clone())),
        }
    }

    fn delete_session(&self, id: &str) -> Result<(), PersistenceError> {
        self.sessions_write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }

    fn list_sessions(&self) -> Result<Vec<Session>, PersistenceError> {
        let mut sessions: Vec<Session> = self.sessions_read().values().cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    fn create_sample(&self, sample: &Sample) -> Result<(), PersistenceError> {
        let mut store = self.samples_write();
        let series = store.entry(sample.session_id.clone()).or_default();
        let at = series.partition_point(|s| s.timestamp <= sample.timestamp);
        series.insert(at, sample.clone());
        Ok(())
    }

    fn list_samples_by_session(&self, session_id: &str) -> Result<Vec<Sample>, PersistenceError> {
        let store = self.samples.read().unwrap_or_else(PoisonError::into_inner);
        Ok(store.get(session_id).cloned().unwrap_or_default())
    }

    fn delete_samples_by_session(&self, session_id: &str) -> Result<usize, PersistenceError> {
        Ok(self
            .samples_write()
            .remove(session_id)
            .map_or(0, |series| series.len()))
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Reading;

    fn sample(session_id: &str, timestamp: f64) -> Sample {
        Reading {
            timestamp,
            delta_z: timestamp / 10.0,
            raw_acceleration: 9.81,
            frequency: None,
            amplitude: None,
        }
        .into_sample(session_id, "esp32")
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let store = InMemoryStore::new();
        store.create_session(&Session::start("Test A", 1.0)).unwrap();
        let err = store
            .create_session(&Session::start("Test A", 2.0))
            .unwrap_err();
        assert_eq!(err, PersistenceError::DuplicateName("Test A".to_string()));
    }

    #[test]
    fn test_samples_listed_in_timestamp_order() {
        let store = InMemoryStore::new();
        for ts in [30.0, 10.0, 20.0, 10.0] {
            store.create_sample(&sample("s1", ts)).unwrap();
        }
        store.create_sample(&sample("s2", 5.0)).unwrap();

        let stamps: Vec<f64> = store
            .list_samples_by_session("s1")
            .unwrap()
            .iter()
            .map(|s| s.timestamp)
            .collect();
        assert_eq!(stamps, vec![10.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_delete_cascade_counts() {
        let store = InMemoryStore::new();
        for ts in 0..5 {
            store.create_sample(&sample("s1", ts as f64)).unwrap();
        }
        assert_eq!(store.delete_samples_by_session("s1").unwrap(), 5);
        assert!(store.list_samples_by_session("s1").unwrap().is_empty());
        assert_eq!(store.delete_samples_by_session("s1").unwrap(), 0);
    }

    #[test]
    fn test_update_and_delete_unknown_session() {
        let store = InMemoryStore::new();
        let ghost = Session::start("ghost", 0.0);
        assert!(matches!(
            store.update_session(&ghost),
            Err(PersistenceError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_session(&ghost.id),
            Err(PersistenceError::NotFound(_))
        ));
    }

    #[test]
    fn test_trait_object_lists_newest_first() {
        let store: Box<dyn PersistenceGateway> = Box::new(InMemoryStore::new());
        assert_eq!(store.backend_name(), "InMemory");

        let mut first = Session::start("first", 0.0);
        first.created_at -= chrono::Duration::seconds(10);
        let second = Session::start("second", 0.0);
        store.create_session(&first).unwrap();
        store.create_session(&second).unwrap();

        let names: Vec<String> = store.list_sessions().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["second", "first"]);
        assert_eq!(store.list_recent_sessions(1).unwrap()[0].name, "second");
    }
}
