//! REST endpoint handlers for the brain API.
//!
//! Every handler resolves the coordination service first (500 when it is
//! missing), then the agent (404), then the request body (400).
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/agents/{id}/brain/decide` | Run a decision cycle |
//! | `POST` | `/agents/{id}/brain/action-complete` | Report a finished action |
//! | `POST` | `/agents/simulation/start` | Activate the brains |
//! | `POST` | `/agents/simulation/stop` | Deactivate the brains |
//! | `POST` | `/agents/simulation/reset` | Reset brains and conversations |
//! | `GET` | `/agents/simulation/state` | Per-agent render state |
//! | `GET` | `/agents` | Registered agents keyed by id |
//! | `GET` | `/agents/brains/state` | Per-brain memory summary |
//! | `GET` | `/agents/{id}/conversation` | Conversation log of one agent |
//! | `POST` | `/agents/{id}/reset` | Clear one agent's conversation log |

use std::sync::Arc;

use agora_types::{Position, SensorySnapshot};
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Read a request body as JSON. An empty body reads as `null`.
fn body_json(body: &Bytes) -> Result<Value, ApiError> {
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))
}

async fn require_agent(state: &AppState, agent_id: &str) -> Result<(), ApiError> {
    if state.coordination()?.has_agent(agent_id).await {
        Ok(())
    } else {
        Err(ApiError::NotFound(agent_id.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// POST /agents/{id}/brain/decide
// ---------------------------------------------------------------------------

/// Run one decision cycle on the posted `sensory_data`.
pub async fn decide(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    require_agent(&state, &agent_id).await?;

    let mut payload = body_json(&body)?;
    let sensory_data = payload
        .get_mut("sensory_data")
        .map(Value::take)
        .filter(|v| !v.is_null())
        .ok_or_else(|| ApiError::BadRequest("sensory_data is required".to_owned()))?;
    let snapshot: SensorySnapshot = serde_json::from_value(sensory_data)
        .map_err(|e| ApiError::BadRequest(format!("invalid sensory_data: {e}")))?;

    let decision = state.coordination()?.decide(&agent_id, snapshot).await?;

    Ok(Json(serde_json::json!({
        "agent_id": agent_id,
        "decision": decision,
    })))
}

// ---------------------------------------------------------------------------
// POST /agents/{id}/brain/action-complete
// ---------------------------------------------------------------------------

/// Record that the world finished executing an agent's action.
///
/// `result.final_position` is optional; a malformed one is ignored.
pub async fn action_complete(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    require_agent(&state, &agent_id).await?;

    let payload = body_json(&body)?;
    let action_type = payload
        .get("action_type")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::BadRequest("action_type is required".to_owned()))?;

    let final_position = payload
        .get("result")
        .and_then(|r| r.get("final_position"))
        .filter(|v| !v.is_null())
        .and_then(|v| match serde_json::from_value::<Position>(v.clone()) {
            Ok(position) => Some(position),
            Err(e) => {
                warn!(agent_id, error = %e, "ignoring malformed final_position");
                None
            }
        });

    state
        .coordination()?
        .report_action_completion(&agent_id, action_type, final_position)
        .await?;

    Ok(Json(serde_json::json!({
        "message": "Action completion recorded",
        "agent_id": agent_id,
    })))
}

// ---------------------------------------------------------------------------
// POST /agents/simulation/{start,stop,reset}
// ---------------------------------------------------------------------------

/// Activate the brains.
pub async fn start_simulation(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let coordination = state.coordination()?;
    let message = if coordination.activate().await {
        "Brains activated"
    } else {
        "Brains already active"
    };
    Ok(Json(serde_json::json!({
        "message": message,
        "simulation_running": coordination.is_active().await,
    })))
}

/// Deactivate the brains.
pub async fn stop_simulation(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let coordination = state.coordination()?;
    coordination.deactivate().await;
    Ok(Json(serde_json::json!({
        "message": "Brains deactivated",
        "simulation_running": coordination.is_active().await,
    })))
}

/// Deactivate and return every brain to its starting state.
pub async fn reset_simulation(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let coordination = state.coordination()?;
    coordination.reset().await;
    debug!("simulation reset requested");
    Ok(Json(serde_json::json!({
        "message": "Simulation reset",
        "simulation_running": coordination.is_active().await,
    })))
}

// ---------------------------------------------------------------------------
// Read views
// ---------------------------------------------------------------------------

/// Per-agent position, action and utterance plus the active flag.
pub async fn simulation_state(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.coordination()?.simulation_state().await))
}

/// Every registered agent's profile and system prompt, keyed by agent id.
pub async fn list_agents(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.coordination()?.agents().await))
}

/// Memory counts for every brain plus the active flag.
pub async fn brains_state(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.coordination()?.brain_state().await))
}

/// Every message one agent sent or received, oldest first.
pub async fn conversation(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state.coordination()?.conversation(&agent_id).await?;
    Ok(Json(serde_json::json!({
        "agent_id": agent_id,
        "count": entries.len(),
        "conversation": entries,
    })))
}

// ---------------------------------------------------------------------------
// POST /agents/{id}/reset
// ---------------------------------------------------------------------------

/// Clear one agent's conversation log, leaving its memory and every other
/// log alone.
pub async fn reset_conversation(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_agent(&state, &agent_id).await?;
    state.coordination()?.reset_conversation(&agent_id).await?;
    Ok(Json(serde_json::json!({
        "message": "Conversation reset successfully",
        "agent_id": agent_id,
    })))
}
