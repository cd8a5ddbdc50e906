//! HTTP endpoints
//!
//! Thin router around the WebSocket endpoint plus health and diagnostics.

use axum::{
    extract::State,
    http::{HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::connection::ws_handler;
use crate::metrics::metrics_handler;
use crate::session::SessionSnapshot;
use crate::state::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.read();
    let cors_layer = build_cors_layer(&config.server.cors_origins, config.server.cors_enabled);
    drop(config);

    Router::new()
        // Streaming endpoint
        .route("/ws", get(ws_handler))
        // Health check
        .route("/health", get(health_check))
        // Diagnostics
        .route("/stats", get(stats))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build the CORS layer from configured origins
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        return CorsLayer::permissive();
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!(origin, "invalid CORS origin, skipping");
                None
            })
        })
        .collect();

    if parsed.is_empty() {
        return CorsLayer::new()
            .allow_methods([Method::GET])
            .allow_headers(Any)
            .allow_origin(Any);
    }

    CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any)
        .allow_origin(parsed)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    active_sessions: usize,
    capacity: usize,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_sessions: state.sessions.count(),
        capacity: state.sessions.capacity(),
    })
}

#[derive(Serialize)]
struct StatsResponse {
    engine: String,
    sessions: Vec<SessionSnapshot>,
}

async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        engine: state.engine.name().await,
        sessions: state.sessions.snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PassthroughEngine;
    use livescribe_config::Settings;

    #[tokio::test]
    async fn test_health_reports_capacity() {
        let state = AppState::new(Settings::default(), Box::new(PassthroughEngine::default()));
        let response = health_check(State(state)).await;
        assert_eq!(response.0.status, "ok");
        assert_eq!(response.0.capacity, 4);
        assert_eq!(response.0.active_sessions, 0);
    }

    #[tokio::test]
    async fn test_stats_lists_admitted_sessions() {
        let state = AppState::new(Settings::default(), Box::new(PassthroughEngine::default()));
        state.sessions.admit("client-1").unwrap();

        let response = stats(State(state)).await;
        assert_eq!(response.0.engine, "passthrough");
        assert_eq!(response.0.sessions.len(), 1);
        assert_eq!(response.0.sessions[0].uid, "client-1");
    }

    #[test]
    fn test_router_builds() {
        let state = AppState::new(Settings::default(), Box::new(PassthroughEngine::default()));
        let _router = create_router(state);
    }
}
