//! Scripted stand-in for the simulation backend.
//!
//! Serves the same JSON surface as the real backend from a seeded, in-process
//! Markov-chain simulation, so the monitor can be exercised end to end
//! without a language-model backend.

pub mod handlers;
pub mod roster;
pub mod simulation;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, CorsLayer};

pub use simulation::StubSimulation;

/// Construct the Axum router for the stub backend.
///
/// CORS allows any origin unless `TRADEWATCH_CORS_ORIGINS` holds a
/// comma-separated list of allowed origins.
pub fn router(sim: Arc<StubSimulation>) -> Router {
    Router::new()
        .route("/api/agents", get(handlers::agents_handler))
        .route("/api/agent/{id}", get(handlers::agent_detail_handler))
        .route("/api/simulation/start", post(handlers::start_handler))
        .route("/api/simulation/stop", post(handlers::stop_handler))
        .route("/api/simulation/status", get(handlers::status_handler))
        .route("/api/events", get(handlers::events_handler))
        .route("/api/leaderboard", get(handlers::leaderboard_handler))
        .route("/api/network", get(handlers::network_handler))
        .layer(build_cors_layer())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(sim)
}

fn build_cors_layer() -> CorsLayer {
    use axum::http::{HeaderName, HeaderValue, Method};

    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([HeaderName::from_static("content-type")])
        .max_age(std::time::Duration::from_secs(3600));

    match std::env::var("TRADEWATCH_CORS_ORIGINS") {
        Ok(val) if !val.trim().is_empty() && val != "*" => {
            let origins: Vec<HeaderValue> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            base.allow_origin(origins)
        }
        _ => base.allow_origin(AllowOrigin::any()),
    }
}
