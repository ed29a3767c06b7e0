//! Sled-backed session and sample storage
//!
//! Three trees:
//! - `sessions`: session id → JSON `Session`
//! - `session_names`: name → session id (unique-name index)
//! - `samples`: `session_id ‖ 0x00 ‖ timestamp ‖ seq` → JSON `Sample`
//!
//! Sample keys sort by timestamp within a session, so a prefix scan yields
//! samples in timestamp order. The trailing sequence number (from
//! `Db::generate_id`) keeps samples with equal timestamps distinct and in
//! arrival order.

use std::path::Path;

use super::persistence::{PersistenceError, PersistenceGateway};
use crate::types::{Sample, Session};

const SESSIONS_TREE: &str = "sessions";
const SESSION_NAMES_TREE: &str = "session_names";
const SAMPLES_TREE: &str = "samples";

/// Durable persistence gateway
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
    sessions: sled::Tree,
    names: sled::Tree,
    samples: sled::Tree,
}

impl SledStore {
    /// Open or create the store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        tracing::info!(path = %path.display(), "Session store opened");
        Self::from_db(db)
    }

    /// Throwaway store removed when dropped
    pub fn temporary() -> Result<Self, PersistenceError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, PersistenceError> {
        Ok(Self {
            sessions: db.open_tree(SESSIONS_TREE)?,
            names: db.open_tree(SESSION_NAMES_TREE)?,
            samples: db.open_tree(SAMPLES_TREE)?,
            db,
        })
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), PersistenceError> {
        self.db.flush()?;
        Ok(())
    }

    /// Number of stored sample records across all sessions
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn sample_prefix(session_id: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(session_id.len() + 1);
        prefix.extend_from_slice(session_id.as_bytes());
        prefix.push(0);
        prefix
    }

    fn sample_key(session_id: &str, timestamp: f64, seq: u64) -> Vec<u8> {
        let mut key = Self::sample_prefix(session_id);
        key.extend_from_slice(&ordered_f64(timestamp).to_be_bytes());
        key.extend_from_slice(&seq.to_be_bytes());
        key
    }
}

/// Map an f64 to a u64 whose big-endian bytes sort like the float.
fn ordered_f64(value: f64) -> u64 {
    let bits = value.to_bits();
    if bits >> 63 == 1 {
        !bits
    } else {
        bits | (1 << 63)
    }
}

impl PersistenceGateway for SledStore {
    fn create_session(&self, session: &Session) -> Result<(), PersistenceError> {
        let claimed = self.names.compare_and_swap(
            session.name.as_bytes(),
            None as Option<&[u8]>,
            Some(session.id.as_bytes()),
        )?;
        if claimed.is_err() {
            return Err(PersistenceError::DuplicateName(session.name.clone()));
        }

        let value = serde_json::to_vec(session)?;
        if let Err(e) = self.sessions.insert(session.id.as_bytes(), value) {
            let _ = self.names.remove(session.name.as_bytes());
            return Err(e.into());
        }
        Ok(())
    }

    fn find_session(&self, id: &str) -> Result<Option<Session>, PersistenceError> {
        match self.sessions.get(id.as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn update_session(&self, session: &Session) -> Result<(), PersistenceError> {
        if !self.sessions.contains_key(session.id.as_bytes())? {
            return Err(PersistenceError::NotFound(session.id.clone()));
        }
        let value = serde_json::to_vec(session)?;
        self.sessions.insert(session.id.as_bytes(), value)?;
        Ok(())
    }

    fn delete_session(&self, id: &str) -> Result<(), PersistenceError> {
        let Some(value) = self.sessions.remove(id.as_bytes())? else {
            return Err(PersistenceError::NotFound(id.to_string()));
        };
        match serde_json::from_slice::<Session>(&value) {
            Ok(session) => {
                // Only release the name if it still points at this session
                let _ = self.names.compare_and_swap(
                    session.name.as_bytes(),
                    Some(id.as_bytes()),
                    None as Option<&[u8]>,
                )?;
            }
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "Deleted session record was unreadable; name index left as is");
            }
        }
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<Session>, PersistenceError> {
        let mut sessions = Vec::with_capacity(self.sessions.len());
        for item in self.sessions.iter() {
            let (key, value) = item?;
            match serde_json::from_slice::<Session>(&value) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    tracing::warn!(
                        key = %String::from_utf8_lossy(&key),
                        error = %e,
                        "Skipping unreadable session record"
                    );
                }
            }
        }
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    fn create_sample(&self, sample: &Sample) -> Result<(), PersistenceError> {
        let seq = self.db.generate_id()?;
        let key = Self::sample_key(&sample.session_id, sample.timestamp, seq);
        let value = serde_json::to_vec(sample)?;
        self.samples.insert(key, value)?;
        Ok(())
    }

    fn list_samples_by_session(&self, session_id: &str) -> Result<Vec<Sample>, PersistenceError> {
        let mut samples = Vec::new();
        for item in self.samples.scan_prefix(Self::sample_prefix(session_id)) {
            let (_key, value) = item?;
            match serde_json::from_slice::<Sample>(&value) {
                Ok(sample) => samples.push(sample),
                Err(e) => tracing::warn!(session_id, error = %e, "Skipping unreadable sample"),
            }
        }
        Ok(samples)
    }

    fn delete_samples_by_session(&self, session_id: &str) -> Result<usize, PersistenceError> {
        let mut batch = sled::Batch::default();
        let mut count = 0;
        for key in self.samples.scan_prefix(Self::sample_prefix(session_id)).keys() {
            batch.remove(key?);
            count += 1;
        }
        self.samples.apply_batch(batch)?;
        Ok(count)
    }

    fn backend_name(&self) -> &'static str {
        "Sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Reading;

    fn sample(session_id: &str, timestamp: f64) -> Sample {
        Reading {
            timestamp,
            delta_z: 0.1,
            raw_acceleration: 9.81,
            frequency: None,
            amplitude: None,
        }
        .into_sample(session_id, "esp32")
    }

    #[test]
    fn test_ordered_f64_preserves_order() {
        let values = [-1e9, -2.5, -0.0, 0.0, 1e-12, 3.0, 1e15];
        for pair in values.windows(2) {
            assert!(ordered_f64(pair[0]) <= ordered_f64(pair[1]), "{pair:?}");
        }
    }

    #[test]
    fn test_session_round_trip_and_name_index() {
        let store = SledStore::temporary().unwrap();
        let session = Session::start("Test A", 1.0);
        store.create_session(&session).unwrap();

        let found = store.find_session(&session.id).unwrap().unwrap();
        assert_eq!(found, session);

        assert!(matches!(
            store.create_session(&Session::start("Test A", 2.0)),
            Err(PersistenceError::DuplicateName(_))
        ));

        // Deleting frees the name
        store.delete_session(&session.id).unwrap();
        store.create_session(&Session::start("Test A", 3.0)).unwrap();
    }

    #[test]
    fn test_samples_sorted_and_isolated_by_session() {
        let store = SledStore::temporary().unwrap();
        for ts in [300.0, 100.0, 200.0, 100.0] {
            store.create_sample(&sample("a", ts)).unwrap();
        }
        // "ab" must not leak into the "a" prefix scan
        store.create_sample(&sample("ab", 50.0)).unwrap();

        let stamps: Vec<f64> = store
            .list_samples_by_session("a")
            .unwrap()
            .iter()
            .map(|s| s.timestamp)
            .collect();
        assert_eq!(stamps, vec![100.0, 100.0, 200.0, 300.0]);
        assert_eq!(store.list_samples_by_session("ab").unwrap().len(), 1);
    }

    #[test]
    fn test_delete_samples_cascade() {
        let store = SledStore::temporary().unwrap();
        for ts in 0..10 {
            store.create_sample(&sample("a", ts as f64)).unwrap();
        }
        store.create_sample(&sample("b", 1.0)).unwrap();

        assert_eq!(store.delete_samples_by_session("a").unwrap(), 10);
        assert!(store.list_samples_by_session("a").unwrap().is_empty());
        assert_eq!(store.sample_count(), 1);
    }

    #[test]
    fn test_reopen_is_durable() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::start("durable", 0.5);
        {
            let store = SledStore::open(dir.path()).unwrap();
            store.create_session(&session).unwrap();
            store.create_sample(&sample(&session.id, 1.0)).unwrap();
            store.flush().unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.list_sessions().unwrap().len(), 1);
        assert_eq!(store.list_samples_by_session(&session.id).unwrap().len(), 1);
    }
}
