//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::game::simulator::TickStatsSnapshot;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(state.config.client_origin.as_deref()))
        .with_state(state)
}

/// CORS for the given comma-separated origins, or any origin when unset
fn cors_layer(client_origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    match client_origin {
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
                .collect();
            cors.allow_origin(allowed)
        }
        None => cors.allow_origin(Any),
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    entities: usize,
    connections: usize,
    history_entries: usize,
    /// `ticks`, `last_tick_micros`, `commands_applied`, `commands_stale`
    #[serde(flatten)]
    tick: TickStatsSnapshot,
    messages_sent: u64,
    messages_dropped: u64,
    viewers_evicted: u64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let fan_out = state.registry.stats();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        entities: state.registry.entity_count(),
        connections: state.registry.connection_count(),
        history_entries: state.registry.with_world(|w| w.history_entries()),
        tick: state.simulator.stats(),
        messages_sent: fan_out.sent(),
        messages_dropped: fan_out.dropped(),
        viewers_evicted: fan_out.evicted(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SimulationConfig};

    fn state() -> AppState {
        AppState::new(Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "info".to_string(),
            client_origin: Some("http://localhost:3000, http://example.test".to_string()),
            outbound_capacity: 8,
            input_rate_limit: 10,
            simulation: SimulationConfig::default(),
        })
    }

    #[tokio::test]
    async fn test_health_reports_world_counts() {
        let state = state();
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        state.registry.connect(tx);
        state.simulator.tick();

        let Json(body) = health_handler(State(state)).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.entities, 1);
        assert_eq!(body.connections, 1);
        assert_eq!(body.tick.ticks, 1);
        assert_eq!(body.history_entries, 1);
        assert_eq!(body.messages_sent, 1);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["ticks"], 1);
        assert_eq!(json["commands_applied"], 0);
        assert_eq!(json["viewers_evicted"], 0);
    }

    #[test]
    fn test_router_builds_with_and_without_origins() {
        let _ = build_router(state());
        let _ = cors_layer(None);
    }
}
