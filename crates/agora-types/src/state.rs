//! Read-only state views returned by the coordination service.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::position::Position;

/// What the world needs to know about one agent to render it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentStateView {
    /// Agent identifier (e.g. `agent1`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Authoritative position held by the brain.
    pub position: Position,
    /// Action in progress (`"idle"` when none).
    pub current_action: String,
    /// Utterance being displayed, if any.
    pub current_utterance: Option<String>,
}

/// Simulation-wide state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationState {
    /// Every registered agent, ordered by id.
    pub agents: Vec<AgentStateView>,
    /// Whether the brains are currently active.
    pub simulation_running: bool,
}

/// Memory summary for one brain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BrainStateView {
    /// Agent identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Personality description.
    pub personality: String,
    /// Items currently held in the action channel.
    pub action_memory_count: u32,
    /// Items currently held in the observation channel.
    pub observation_memory_count: u32,
}

/// Coordination-wide brain summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BrainState {
    /// Per-brain summaries keyed by agent id.
    pub brains: BTreeMap<String, BrainStateView>,
    /// Whether the brains are currently active.
    pub brains_active: bool,
    /// When the summary was taken.
    pub timestamp: DateTime<Utc>,
}
