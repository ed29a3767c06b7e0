//! API route definitions
//!
//! - /api/v1/health - liveness and backend
//! - /api/v1/status - active session, observers, devices, ingestion counters
//! - /api/v1/devices - connected device ids
//! - /api/v1/sessions[/recent|/:id[/samples|/spectrum]] - session history

use axum::{routing::get, Router};

use super::handlers::{self, MonitorState};

/// Read-only REST routes
pub fn api_routes(state: MonitorState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/status", get(handlers::get_status))
        .route("/devices", get(handlers::get_devices))
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/recent", get(handlers::recent_sessions))
        .route("/sessions/:id", get(handlers::get_session))
        .route("/sessions/:id/samples", get(handlers::get_session_samples))
        .route("/sessions/:id/spectrum", get(handlers::get_session_spectrum))
        .with_state(state)
}
