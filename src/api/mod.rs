//! HTTP surface using Axum
//!
//! - `GET /ws`: the WebSocket endpoint for devices and observers
//! - `/api/v1/*`: read-only REST for collaborators

pub mod envelope;
pub mod handlers;
pub mod protocol;
mod routes;
pub mod ws;

pub use handlers::MonitorState;

use axum::http::{header, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Env var listing allowed cross-origin callers (comma-separated)
pub const CORS_ENV_VAR: &str = "RESONANCE_CORS_ORIGINS";

/// Build a CORS layer that is restrictive by default (same-origin only).
///
/// Set `RESONANCE_CORS_ORIGINS` to a comma-separated list of allowed origins
/// for a dashboard served from elsewhere (e.g. `http://localhost:5173`).
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    match std::env::var(CORS_ENV_VAR) {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Create the complete application router.
pub fn create_app(state: MonitorState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state.clone())
        .nest("/api/v1", routes::api_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}
