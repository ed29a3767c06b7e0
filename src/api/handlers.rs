//! Read-only REST handlers for collaborators (reports, exports, dashboards)
//!
//! Nothing here mutates session state; transitions only happen over the
//! WebSocket through the session actor.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::acquisition::{DeviceRegistry, IngestStats, Ingestor, StatsSnapshot};
use crate::broadcast::ObserverSet;
use crate::config::MonitorConfig;
use crate::session::{SessionActor, SessionHandle};
use crate::storage::PersistenceGateway;
use crate::types::{Session, SessionSummary};

/// Default and ceiling for `/sessions/recent?limit=`
const RECENT_DEFAULT_LIMIT: usize = 10;
const RECENT_MAX_LIMIT: usize = 100;

// ============================================================================
// Shared state
// ============================================================================

/// Everything a request handler or WebSocket connection needs.
#[derive(Clone)]
pub struct MonitorState {
    pub sessions: SessionHandle,
    pub ingestor: Ingestor,
    pub devices: DeviceRegistry,
    pub observers: ObserverSet,
    pub backend: &'static str,
    pub started_at: DateTime<Utc>,
}

impl MonitorState {
    /// Wire the core components around `gateway`.
    ///
    /// The returned actor must be spawned for session transitions to be
    /// processed.
    pub fn assemble(
        config: &MonitorConfig,
        gateway: Arc<dyn PersistenceGateway>,
        cancel: CancellationToken,
    ) -> (Self, SessionActor) {
        let observers = ObserverSet::new(config.ingest.observer_queue);
        let stats = Arc::new(IngestStats::default());
        let (actor, sessions) = SessionActor::new(
            config,
            Arc::clone(&gateway),
            observers.clone(),
            Arc::clone(&stats),
            cancel,
        );
        let ingestor = Ingestor::new(
            sessions.clone(),
            Arc::clone(&gateway),
            observers.clone(),
            stats,
        );

        let state = Self {
            sessions,
            ingestor,
            devices: DeviceRegistry::new(observers.clone()),
            observers,
            backend: gateway.backend_name(),
            started_at: Utc::now(),
        };
        (state, actor)
    }
}

// ============================================================================
// Health / status
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
    pub uptime_secs: i64,
}

pub async fn get_health(State(state): State<MonitorState>) -> Response {
    ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.backend.to_string(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub active_session: Option<SessionSummary>,
    pub observers: usize,
    pub devices: Vec<String>,
    pub ingest: StatsSnapshot,
}

pub async fn get_status(State(state): State<MonitorState>) -> Response {
    let active_session = match state.sessions.current().await {
        Ok(active) => active.as_ref().map(Session::summary),
        Err(e) => return ApiErrorResponse::from_session_error(&e),
    };
    ApiResponse::ok(StatusResponse {
        active_session,
        observers: state.observers.len(),
        devices: state.devices.list_connected(),
        ingest: state.sessions.stats(),
    })
}

pub async fn get_devices(State(state): State<MonitorState>) -> Response {
    ApiResponse::ok(state.devices.list_connected())
}

// ============================================================================
// Sessions
// ============================================================================

pub async fn list_sessions(State(state): State<MonitorState>) -> Response {
    match state.sessions.list_sessions().await {
        Ok(sessions) => ApiResponse::ok(summaries(&sessions)),
        Err(e) => ApiErrorResponse::from_session_error(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

pub async fn recent_sessions(
    State(state): State<MonitorState>,
    Query(query): Query<RecentQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(RECENT_DEFAULT_LIMIT);
    if limit == 0 || limit > RECENT_MAX_LIMIT {
        return ApiErrorResponse::bad_request(format!(
            "limit must be between 1 and {RECENT_MAX_LIMIT}"
        ));
    }
    match state.sessions.recent_sessions(limit).await {
        Ok(sessions) => ApiResponse::ok(summaries(&sessions)),
        Err(e) => ApiErrorResponse::from_session_error(&e),
    }
}

pub async fn get_session(
    State(state): State<MonitorState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.sessions.find_session(&session_id).await {
        Ok(session) => ApiResponse::ok(session),
        Err(e) => ApiErrorResponse::from_session_error(&e),
    }
}

pub async fn get_session_samples(
    State(state): State<MonitorState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.sessions.session_data(&session_id).await {
        Ok((_, samples)) => ApiResponse::ok(samples),
        Err(e) => ApiErrorResponse::from_session_error(&e),
    }
}

pub async fn get_session_spectrum(
    State(state): State<MonitorState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.sessions.session_spectrum(&session_id).await {
        Ok(report) => ApiResponse::ok(report),
        Err(e) => ApiErrorResponse::from_session_error(&e),
    }
}

fn summaries(sessions: &[Session]) -> Vec<SessionSummary> {
    sessions.iter().map(Session::summary).collect()
}
