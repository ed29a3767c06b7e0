//! Session and sample storage
//!
//! Everything above this module sees storage only as a
//! [`PersistenceGateway`] trait object.

pub mod lockfile;
pub mod persistence;
pub mod sled_store;

pub use lockfile::ProcessLock;
pub use persistence::{InMemoryStore, PersistenceError, PersistenceGateway};
pub use sled_store::SledStore;

use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};

/// Open the backend selected in `[storage]`.
pub fn open_gateway(config: &StorageConfig) -> Result<Arc<dyn PersistenceGateway>, PersistenceError> {
    let gateway: Arc<dyn PersistenceGateway> = match config.backend {
        StorageBackend::Sled => Arc::new(SledStore::open(config.data_dir.join("sessions.db"))?),
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
    };
    tracing::info!(backend = gateway.backend_name(), "Persistence gateway ready");
    Ok(gateway)
}

/// Run a gateway call on the blocking pool.
///
/// Gateway methods are synchronous (sled I/O); async callers go through here
/// so a slow disk never stalls a runtime worker.
pub async fn blocking<T, F>(gateway: &Arc<dyn PersistenceGateway>, op: F) -> Result<T, PersistenceError>
where
    F: FnOnce(&dyn PersistenceGateway) -> Result<T, PersistenceError> + Send + 'static,
    T: Send + 'static,
{
    let gateway = Arc::clone(gateway);
    tokio::task::spawn_blocking(move || op(gateway.as_ref()))
        .await
        .map_err(|e| PersistenceError::Storage(format!("storage task failed: {e}")))?
}
