//! Session Actor - single writer for the active session
//!
//! Owns the `NoSession → Active → Sealed` state machine and the debounced
//! recent-sample buffer. Commands are processed one at a time, so the
//! "is a session active" check and the write that follows can never
//! interleave with another transition.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::{ActiveSession, CoalescingBuffer, SessionError};
use crate::acquisition::{IngestStats, StatsSnapshot};
use crate::broadcast::{FrequencySummary, ObserverSet, OutboundEvent};
use crate::config::defaults::SESSION_MAILBOX_DEPTH;
use crate::config::MonitorConfig;
use crate::physics_engine::{summarize_session, BeamParameters, ResonanceReport};
use crate::processing::SpectralAnalyzer;
use crate::storage::{self, PersistenceError, PersistenceGateway};
use crate::types::{RecentSample, Sample, Session};

// ============================================================================
// Commands
// ============================================================================

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum SessionCommand {
    Start {
        name: String,
        test_mass: f64,
        reply: Reply<Session>,
    },
    Stop {
        reply: Reply<Session>,
    },
    Delete {
        session_id: String,
        reply: Reply<usize>,
    },
    /// Projection for the recent-sample window
    Buffer(RecentSample),
    /// In-memory copy of the active session
    Current {
        reply: Reply<Option<Session>>,
    },
    /// Posted back by the summary task of a sealed session
    ApplyAnalysis {
        session_id: String,
        outcome: Result<ResonanceReport, SessionError>,
    },
}

/// Analysis settings shared by the actor and read-only queries.
#[derive(Clone)]
struct AnalysisContext {
    analyzer: SpectralAnalyzer,
    beam: BeamParameters,
    align: bool,
}

impl AnalysisContext {
    fn from_config(config: &MonitorConfig) -> Self {
        Self {
            analyzer: SpectralAnalyzer::new(config.analysis.clone()),
            beam: config.beam,
            align: config.analysis.theoretical_alignment,
        }
    }

    fn summarize(&self, samples: &[Sample], test_mass: f64) -> Result<ResonanceReport, SessionError> {
        Ok(summarize_session(
            samples,
            test_mass,
            &self.beam,
            &self.analyzer,
            self.align,
        )?)
    }
}

// ============================================================================
// Actor Handle
// ============================================================================

/// Handle to interact with [`SessionActor`]
///
/// Transitions go through the actor mailbox; queries read the persistence
/// gateway directly and never touch actor state.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    active: watch::Receiver<Option<ActiveSession>>,
    gateway: Arc<dyn PersistenceGateway>,
    stats: Arc<IngestStats>,
    analysis: AnalysisContext,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| SessionError::Unavailable)?;
        response.await.map_err(|_| SessionError::Unavailable)?
    }

    /// Start a new active session
    pub async fn start(&self, name: impl Into<String>, test_mass: f64) -> Result<Session, SessionError> {
        let name = name.into();
        self.request(|reply| SessionCommand::Start {
            name,
            test_mass,
            reply,
        })
        .await
    }

    /// Seal the active session; its resonance summary follows asynchronously
    pub async fn stop(&self) -> Result<Session, SessionError> {
        self.request(|reply| SessionCommand::Stop { reply }).await
    }

    /// Delete a session and its samples, returning the number of samples removed
    pub async fn delete(&self, session_id: impl Into<String>) -> Result<usize, SessionError> {
        let session_id = session_id.into();
        self.request(|reply| SessionCommand::Delete { session_id, reply })
            .await
    }

    /// Queue a projection for the recent-sample window
    pub async fn buffer(&self, sample: RecentSample) -> Result<(), SessionError> {
        self.tx
            .send(SessionCommand::Buffer(sample))
            .await
            .map_err(|_| SessionError::Unavailable)
    }

    /// Queue a projection without waiting on the mailbox.
    ///
    /// Returns `false` when the mailbox is full or the actor is gone; the
    /// projection is dropped in that case.
    pub fn try_buffer(&self, sample: RecentSample) -> bool {
        self.tx.try_send(SessionCommand::Buffer(sample)).is_ok()
    }

    /// The active session as the actor holds it, including unflushed state
    pub async fn current(&self) -> Result<Option<Session>, SessionError> {
        self.request(|reply| SessionCommand::Current { reply }).await
    }

    /// Identity of the active session, without entering the mailbox
    pub fn active(&self) -> Option<ActiveSession> {
        self.active.borrow().clone()
    }

    /// Watch for active-session changes
    pub fn subscribe_active(&self) -> watch::Receiver<Option<ActiveSession>> {
        self.active.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// All sessions, newest first
    pub async fn list_sessions(&self) -> Result<Vec<Session>, SessionError> {
        Ok(storage::blocking(&self.gateway, |g| g.list_sessions()).await?)
    }

    /// The `limit` newest sessions
    pub async fn recent_sessions(&self, limit: usize) -> Result<Vec<Session>, SessionError> {
        Ok(storage::blocking(&self.gateway, move |g| g.list_recent_sessions(limit)).await?)
    }

    pub async fn find_session(&self, session_id: &str) -> Result<Session, SessionError> {
        let id = session_id.to_string();
        storage::blocking(&self.gateway, move |g| g.find_session(&id))
            .await?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// A session and its samples in timestamp order
    pub async fn session_data(&self, session_id: &str) -> Result<(Session, Vec<Sample>), SessionError> {
        let id = session_id.to_string();
        let found = storage::blocking(&self.gateway, move |g| {
            let Some(session) = g.find_session(&id)? else {
                return Ok(None);
            };
            let samples = g.list_samples_by_session(&id)?;
            Ok(Some((session, samples)))
        })
        .await?;
        found.ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Recompute the spectrum of a session from its stored samples
    pub async fn session_spectrum(&self, session_id: &str) -> Result<ResonanceReport, SessionError> {
        let (session, samples) = self.session_data(session_id).await?;
        let analysis = self.analysis.clone();
        tokio::task::spawn_blocking(move || analysis.summarize(&samples, session.test_mass))
            .await
            .map_err(|e| {
                SessionError::Persistence(PersistenceError::Storage(format!(
                    "spectrum task failed: {e}"
                )))
            })?
    }
}

// ============================================================================
// Session Actor
// ============================================================================

/// Session Actor - the only writer of session lifecycle and recent-window state
pub struct SessionActor {
    rx: mpsc::Receiver<SessionCommand>,
    /// For summary tasks to post results back without keeping the actor alive
    mailbox: mpsc::WeakSender<SessionCommand>,
    active_tx: watch::Sender<Option<ActiveSession>>,
    gateway: Arc<dyn PersistenceGateway>,
    observers: ObserverSet,
    stats: Arc<IngestStats>,
    analysis: AnalysisContext,
    cancel: CancellationToken,
    /// Active session, including flushed recent samples
    active: Option<Session>,
    /// Sample writes issued for the active session
    writes: TaskTracker,
    buffer: CoalescingBuffer,
    recent_capacity: usize,
}

impl SessionActor {
    /// Create new session actor and handle
    pub fn new(
        config: &MonitorConfig,
        gateway: Arc<dyn PersistenceGateway>,
        observers: ObserverSet,
        stats: Arc<IngestStats>,
        cancel: CancellationToken,
    ) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::channel(SESSION_MAILBOX_DEPTH);
        let (active_tx, active_rx) = watch::channel(None);
        let analysis = AnalysisContext::from_config(config);

        let handle = SessionHandle {
            tx: tx.clone(),
            active: active_rx,
            gateway: Arc::clone(&gateway),
            stats: Arc::clone(&stats),
            analysis: analysis.clone(),
        };

        let actor = Self {
            rx,
            mailbox: tx.downgrade(),
            active_tx,
            gateway,
            observers,
            stats,
            analysis,
            cancel,
            active: None,
            writes: TaskTracker::new(),
            buffer: CoalescingBuffer::new(config.ingest.debounce()),
            recent_capacity: config.ingest.recent_capacity,
        };

        (actor, handle)
    }

    /// Run the actor loop until cancelled or every handle is dropped
    pub async fn run(mut self) {
        info!(backend = self.gateway.backend_name(), "SessionActor starting");
        self.recover_interrupted().await;

        let cancel = self.cancel.clone();
        loop {
            let deadline = self.buffer.deadline();
            tokio::select! {
                _ = cancel.cancelled() => break,
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },
                _ = flush_due(deadline) => self.flush_recent().await,
            }
        }

        self.flush_recent().await;
        self.writes.close();
        self.writes.wait().await;
        info!("SessionActor stopped");
    }

    async fn handle(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Start {
                name,
                test_mass,
                reply,
            } => {
                let result = self.start(name, test_mass).await;
                let _ = reply.send(result);
            }
            SessionCommand::Stop { reply } => {
                let result = self.stop().await;
                let _ = reply.send(result);
            }
            SessionCommand::Delete { session_id, reply } => {
                let result = self.delete(session_id).await;
                let _ = reply.send(result);
            }
            SessionCommand::Buffer(sample) => self.buffer_recent(sample),
            SessionCommand::Current { reply } => {
                let _ = reply.send(Ok(self.active.clone()));
            }
            SessionCommand::ApplyAnalysis {
                session_id,
                outcome,
            } => self.apply_analysis(session_id, outcome).await,
        }
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    async fn start(&mut self, name: String, test_mass: f64) -> Result<Session, SessionError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(SessionError::Validation(
                "session name must not be empty".to_string(),
            ));
        }
        if !(test_mass.is_finite() && test_mass >= 0.0) {
            return Err(SessionError::Validation(format!(
                "test mass must be a non-negative number, got {test_mass}"
            )));
        }
        if let Some(active) = &self.active {
            return Err(SessionError::Conflict(active.name.clone()));
        }

        let session = Session::start(name, test_mass);
        let record = session.clone();
        storage::blocking(&self.gateway, move |g| g.create_session(&record)).await?;

        self.buffer.clear();
        self.writes = TaskTracker::new();
        self.active = Some(session.clone());
        self.publish_active();

        info!(
            session_id = %session.id,
            name = %session.name,
            test_mass = session.test_mass,
            "Session started"
        );
        self.observers.broadcast(&OutboundEvent::TestStarted {
            session_id: session.id.clone(),
            session_name: session.name.clone(),
            test_mass: session.test_mass,
        });

        Ok(session)
    }

    async fn stop(&mut self) -> Result<Session, SessionError> {
        let Some(active) = self.active.take() else {
            return Err(SessionError::NoActiveSession);
        };
        // Ingestion stops attributing samples from here on
        self.publish_active();

        let mut sealed = active.clone();
        sealed.append_recent(self.buffer.take(), self.recent_capacity);
        sealed.seal();

        let record = sealed.clone();
        if let Err(e) = storage::blocking(&self.gateway, move |g| g.update_session(&record)).await {
            error!(
                session_id = %active.id,
                error = %e,
                "Failed to persist sealed session, it stays active"
            );
            self.active = Some(active);
            self.publish_active();
            return Err(e.into());
        }

        let writes = std::mem::replace(&mut self.writes, TaskTracker::new());
        writes.close();

        info!(
            session_id = %sealed.id,
            recent = sealed.recent_samples.len(),
            "Session stopped"
        );
        self.observers.broadcast(&OutboundEvent::TestStopped {
            session_id: sealed.id.clone(),
        });

        self.spawn_summary(&sealed, writes);
        Ok(sealed)
    }

    async fn delete(&mut self, session_id: String) -> Result<usize, SessionError> {
        let previous = match self.active.take() {
            Some(active) if active.id == session_id => {
                self.publish_active();
                // Let in-flight sample writes land so the cascade sees them
                let writes = std::mem::replace(&mut self.writes, TaskTracker::new());
                writes.close();
                writes.wait().await;
                Some(active)
            }
            other => {
                self.active = other;
                None
            }
        };

        // Samples first, so a failure leaves the session record in place
        let id = session_id.clone();
        let removed = match storage::blocking(&self.gateway, move |g| {
            let removed = g.delete_samples_by_session(&id)?;
            g.delete_session(&id)?;
            Ok(removed)
        })
        .await
        {
            Ok(removed) => removed,
            Err(e) => {
                if let Some(active) = previous {
                    error!(
                        session_id = %active.id,
                        error = %e,
                        "Failed to delete the active session, it stays active"
                    );
                    self.active = Some(active);
                    self.publish_active();
                }
                return Err(e.into());
            }
        };

        if previous.is_some() {
            self.buffer.clear();
            info!(session_id = %session_id, "Deleted the active session, no session is active now");
        }

        info!(session_id = %session_id, samples = removed, "Session deleted");
        self.observers.broadcast(&OutboundEvent::SessionDeleted {
            session_id,
            success: true,
            error: None,
        });
        Ok(removed)
    }

    // ------------------------------------------------------------------------
    // Recent-sample window
    // ------------------------------------------------------------------------

    fn buffer_recent(&mut self, sample: RecentSample) {
        match &self.active {
            Some(active) if active.id == sample.session_id => self.buffer.push(sample),
            _ => debug!(
                session_id = %sample.session_id,
                "Discarding projection for a session that is no longer active"
            ),
        }
    }

    /// Append the pending batch to the active session's window and persist it.
    ///
    /// On failure the batch is dropped; standalone sample records are
    /// unaffected.
    async fn flush_recent(&mut self) {
        let batch = self.buffer.take();
        if batch.is_empty() {
            return;
        }
        let Some(active) = &self.active else {
            return;
        };

        let count = batch.len();
        let mut updated = active.clone();
        updated.append_recent(batch, self.recent_capacity);

        let record = updated.clone();
        match storage::blocking(&self.gateway, move |g| g.update_session(&record)).await {
            Ok(()) => {
                self.stats.record_flush();
                debug!(
                    session_id = %updated.id,
                    count,
                    window = updated.recent_samples.len(),
                    "Recent samples flushed"
                );
                self.active = Some(updated);
            }
            Err(e) => {
                self.stats.record_flush_failure();
                error!(count, error = %e, "Recent-sample flush failed, batch discarded");
            }
        }
    }

    // ------------------------------------------------------------------------
    // Resonance summary
    // ------------------------------------------------------------------------

    /// Compute the summary off the actor once `writes` has drained.
    fn spawn_summary(&self, session: &Session, writes: TaskTracker) {
        let session_id = session.id.clone();
        let test_mass = session.test_mass;
        let gateway = Arc::clone(&self.gateway);
        let analysis = self.analysis.clone();
        let mailbox = self.mailbox.clone();

        tokio::spawn(async move {
            writes.wait().await;

            let id = session_id.clone();
            let outcome = tokio::task::spawn_blocking(move || -> Result<ResonanceReport, SessionError> {
                let samples = gateway.list_samples_by_session(&id)?;
                analysis.summarize(&samples, test_mass)
            })
            .await
            .unwrap_or_else(|e| {
                Err(SessionError::Persistence(PersistenceError::Storage(format!(
                    "summary task failed: {e}"
                ))))
            });

            match mailbox.upgrade() {
                Some(tx) => {
                    let _ = tx
                        .send(SessionCommand::ApplyAnalysis {
                            session_id,
                            outcome,
                        })
                        .await;
                }
                None => debug!(session_id = %session_id, "Session actor gone, summary discarded"),
            }
        });
    }

    async fn apply_analysis(
        &mut self,
        session_id: String,
        outcome: Result<ResonanceReport, SessionError>,
    ) {
        let report = match outcome {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    error = %e,
                    "Resonance analysis unavailable, session left incomplete"
                );
                return;
            }
        };

        let analysis = report.analysis;
        let id = session_id.clone();
        let applied = storage::blocking(&self.gateway, move |g| {
            let Some(mut session) = g.find_session(&id)? else {
                return Ok(false);
            };
            session.apply_analysis(&analysis);
            g.update_session(&session)?;
            Ok(true)
        })
        .await;

        match applied {
            Ok(true) => {
                info!(
                    session_id = %session_id,
                    frequency = analysis.natural_frequency,
                    q = analysis.properties.q_factor,
                    samples = analysis.sample_count,
                    "Resonance summary stored"
                );
                self.observers.broadcast(&OutboundEvent::FrequencyData {
                    session_id,
                    summary: FrequencySummary::from_analysis(&analysis),
                });
            }
            Ok(false) => debug!(session_id = %session_id, "Session deleted before its summary completed"),
            Err(e) => error!(session_id = %session_id, error = %e, "Failed to store resonance summary"),
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn publish_active(&self) {
        let published = self.active.as_ref().map(|s| ActiveSession {
            id: s.id.clone(),
            name: s.name.clone(),
            test_mass: s.test_mass,
            writes: self.writes.clone(),
        });
        self.active_tx.send_replace(published);
    }

    /// Seal sessions a previous run left active and summarize them.
    async fn recover_interrupted(&mut self) {
        let recovered = storage::blocking(&self.gateway, |g| {
            let mut sealed = Vec::new();
            for mut session in g.list_sessions()?.into_iter().filter(|s| s.is_active) {
                session.seal();
                g.update_session(&session)?;
                sealed.push(session);
            }
            Ok(sealed)
        })
        .await;

        match recovered {
            Ok(sealed) => {
                for session in &sealed {
                    warn!(
                        session_id = %session.id,
                        name = %session.name,
                        "Sealed session left active by a previous run"
                    );
                    let writes = TaskTracker::new();
                    writes.close();
                    self.spawn_summary(session, writes);
                }
            }
            Err(e) => error!(error = %e, "Failed to recover interrupted sessions"),
        }
    }
}

/// Resolves at the flush deadline; never resolves when nothing is pending.
async fn flush_due(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    fn spawn_actor(config: MonitorConfig) -> (SessionHandle, Arc<InMemoryStore>, CancellationToken) {
        let store = Arc::new(InMemoryStore::new());
        let gateway: Arc<dyn PersistenceGateway> = store.clone();
        let cancel = CancellationToken::new();
        let (actor, handle) = SessionActor::new(
            &config,
            gateway,
            ObserverSet::new(64),
            Arc::new(IngestStats::default()),
            cancel.clone(),
        );
        tokio::spawn(actor.run());
        (handle, store, cancel)
    }

    fn quick_config() -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.ingest.debounce_ms = 50;
        config
    }

    fn projection(session_id: &str, ts: f64) -> RecentSample {
        RecentSample {
            session_id: session_id.to_string(),
            device_id: "esp32".to_string(),
            timestamp: ts,
            delta_z: 0.1,
            raw_acceleration: 9.8,
            frequency: None,
            amplitude: None,
        }
    }

    #[tokio::test]
    async fn test_start_rejects_second_active_session() {
        let (handle, _store, _cancel) = spawn_actor(quick_config());
        handle.start("Test A", 1.0).await.unwrap();

        let err = handle.start("Test B", 1.0).await.unwrap_err();
        assert!(matches!(err, SessionError::Conflict(name) if name == "Test A"));
    }

    #[tokio::test]
    async fn test_start_validates_input() {
        let (handle, _store, _cancel) = spawn_actor(quick_config());
        assert!(matches!(
            handle.start("   ", 1.0).await,
            Err(SessionError::Validation(_))
        ));
        assert!(matches!(
            handle.start("neg", -1.0).await,
            Err(SessionError::Validation(_))
        ));
        assert!(handle.active().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_after_stop() {
        let (handle, _store, _cancel) = spawn_actor(quick_config());
        handle.start("Test A", 1.0).await.unwrap();
        handle.stop().await.unwrap();
        assert!(matches!(
            handle.start("Test A", 1.0).await,
            Err(SessionError::DuplicateName(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_without_session() {
        let (handle, _store, _cancel) = spawn_actor(quick_config());
        assert!(matches!(
            handle.stop().await,
            Err(SessionError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn test_stop_drains_buffer_into_window() {
        let mut config = quick_config();
        config.ingest.debounce_ms = 60_000;
        let (handle, store, _cancel) = spawn_actor(config);

        let session = handle.start("drain", 0.5).await.unwrap();
        for ts in 0..5 {
            handle.buffer(projection(&session.id, ts as f64)).await.unwrap();
        }
        let sealed = handle.stop().await.unwrap();

        assert!(!sealed.is_active);
        assert!(sealed.end_time.is_some());
        assert_eq!(sealed.recent_samples.len(), 5);
        let stored = store.find_session(&session.id).unwrap().unwrap();
        assert_eq!(stored.recent_samples.len(), 5);
        assert!(handle.active().is_none());
    }

    #[tokio::test]
    async fn test_projection_for_other_session_discarded() {
        let (handle, _store, _cancel) = spawn_actor(quick_config());
        let session = handle.start("only", 0.5).await.unwrap();
        handle.buffer(projection("someone-else", 1.0)).await.unwrap();
        handle.buffer(projection(&session.id, 2.0)).await.unwrap();

        let sealed = handle.stop().await.unwrap();
        assert_eq!(sealed.recent_samples.len(), 1);
        assert_eq!(sealed.recent_samples[0].timestamp, 2.0);
    }

    #[tokio::test]
    async fn test_delete_active_session_returns_to_idle() {
        let (handle, store, _cancel) = spawn_actor(quick_config());
        let session = handle.start("doomed", 0.5).await.unwrap();
        assert!(handle.active().is_some());

        handle.delete(&session.id).await.unwrap();
        assert!(handle.active().is_none());
        assert!(store.find_session(&session.id).unwrap().is_none());

        // A new session can start immediately
        handle.start("next", 0.5).await.unwrap();
    }

    /// Store whose next `delete_session` fails.
    struct FailingDelete {
        inner: InMemoryStore,
        fail_next: std::sync::atomic::AtomicBool,
    }

    impl PersistenceGateway for FailingDelete {
        fn create_session(&self, session: &Session) -> Result<(), PersistenceError> {
            self.inner.create_session(session)
        }
        fn find_session(&self, id: &str) -> Result<Option<Session>, PersistenceError> {
            self.inner.find_session(id)
        }
        fn update_session(&self, session: &Session) -> Result<(), PersistenceError> {
            self.inner.update_session(session)
        }
        fn delete_session(&self, id: &str) -> Result<(), PersistenceError> {
            if self.fail_next.swap(false, std::sync::atomic::Ordering::SeqCst) {
                return Err(PersistenceError::Storage("disk".to_string()));
            }
            self.inner.delete_session(id)
        }
        fn list_sessions(&self) -> Result<Vec<Session>, PersistenceError> {
            self.inner.list_sessions()
        }
        fn create_sample(&self, sample: &Sample) -> Result<(), PersistenceError> {
            self.inner.create_sample(sample)
        }
        fn list_samples_by_session(&self, session_id: &str) -> Result<Vec<Sample>, PersistenceError> {
            self.inner.list_samples_by_session(session_id)
        }
        fn delete_samples_by_session(&self, session_id: &str) -> Result<usize, PersistenceError> {
            self.inner.delete_samples_by_session(session_id)
        }
        fn backend_name(&self) -> &'static str {
            "FailingDelete"
        }
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_session_active() {
        let store = Arc::new(FailingDelete {
            inner: InMemoryStore::new(),
            fail_next: std::sync::atomic::AtomicBool::new(true),
        });
        let gateway: Arc<dyn PersistenceGateway> = store.clone();
        let (actor, handle) = SessionActor::new(
            &quick_config(),
            gateway,
            ObserverSet::new(8),
            Arc::new(IngestStats::default()),
            CancellationToken::new(),
        );
        tokio::spawn(actor.run());

        let session = handle.start("A", 1.0).await.unwrap();
        assert!(matches!(
            handle.delete(&session.id).await,
            Err(SessionError::Persistence(_))
        ));
        assert_eq!(handle.active().map(|a| a.id), Some(session.id.clone()));
        assert!(matches!(
            handle.start("B", 1.0).await,
            Err(SessionError::Conflict(name)) if name == "A"
        ));

        let active: Vec<_> = store
            .list_sessions()
            .unwrap()
            .into_iter()
            .filter(|s| s.is_active)
            .map(|s| s.name)
            .collect();
        assert_eq!(active, vec!["A".to_string()]);

        // Retry succeeds
        assert_eq!(handle.delete(&session.id).await.unwrap(), 0);
        assert!(handle.active().is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_session() {
        let (handle, _store, _cancel) = spawn_actor(quick_config());
        assert!(matches!(
            handle.delete("nope").await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_interrupted_session_sealed_on_startup() {
        let store = Arc::new(InMemoryStore::new());
        let orphan = Session::start("crashed", 1.0);
        store.create_session(&orphan).unwrap();

        let gateway: Arc<dyn PersistenceGateway> = store.clone();
        let (actor, handle) = SessionActor::new(
            &quick_config(),
            gateway,
            ObserverSet::new(8),
            Arc::new(IngestStats::default()),
            CancellationToken::new(),
        );
        tokio::spawn(actor.run());

        // Start is processed after recovery, so it must succeed
        handle.start("fresh", 1.0).await.unwrap();
        let recovered = store.find_session(&orphan.id).unwrap().unwrap();
        assert!(!recovered.is_active);
        assert!(recovered.end_time.is_some());
    }

    #[tokio::test]
    async fn test_handle_unavailable_after_cancel() {
        let (handle, _store, cancel) = spawn_actor(quick_config());
        cancel.cancel();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(matches!(
            handle.start("late", 1.0).await,
            Err(SessionError::Unavailable)
        ));
    }
}
