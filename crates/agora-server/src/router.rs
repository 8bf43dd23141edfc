//! Axum router construction for the brain API.
//!
//! Assembles every route into a single [`Router`] with open CORS (the world
//! front-end is served from another origin) and per-request tracing.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router for the brain server.
///
/// The router includes:
/// - `POST /agents/{id}/brain/decide` -- one decision cycle
/// - `POST /agents/{id}/brain/action-complete` -- action completion report
/// - `POST /agents/simulation/start|stop|reset` -- lifecycle
/// - `GET /agents/simulation/state` -- render state
/// - `GET /agents` -- configured agents
/// - `GET /agents/brains/state` -- memory summary
/// - `GET /agents/{id}/conversation` -- conversation log
/// - `POST /agents/{id}/reset` -- clear one conversation log
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Decision cycle
        .route("/agents/{id}/brain/decide", post(handlers::decide))
        .route(
            "/agents/{id}/brain/action-complete",
            post(handlers::action_complete),
        )
        // Lifecycle
        .route("/agents/simulation/start", post(handlers::start_simulation))
        .route("/agents/simulation/stop", post(handlers::stop_simulation))
        .route("/agents/simulation/reset", post(handlers::reset_simulation))
        // Read views
        .route("/agents/simulation/state", get(handlers::simulation_state))
        .route("/agents", get(handlers::list_agents))
        .route("/agents/brains/state", get(handlers::brains_state))
        .route("/agents/{id}/conversation", get(handlers::conversation))
        .route("/agents/{id}/reset", post(handlers::reset_conversation))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
