//! Shared type definitions for the Agora agent brains.
//!
//! This crate is the single source of truth for the types that cross the
//! boundary between the brains and the world front-end. Types flow
//! downstream to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`position`] -- Points on the X-Z movement plane and world bounds
//! - [`perception`] -- Sensory snapshot delivered with each decision request
//! - [`decision`] -- Decisions and their flat wire payload
//! - [`memory`] -- Items held in a brain's action and observation channels
//! - [`conversation`] -- Agent-to-agent conversation log entries
//! - [`state`] -- Read-only state views for the world and operators

pub mod conversation;
pub mod decision;
pub mod memory;
pub mod perception;
pub mod position;
pub mod state;

// Re-export all public types at crate root for convenience.
pub use conversation::ConversationEntry;
pub use decision::{
    ActionKind, AgentTarget, Decision, DecisionPayload, DecisionShapeError, DecisionTarget,
};
pub use memory::{ActionMemoryItem, ObservationMemoryItem};
pub use perception::{NearbyAgent, SensorySnapshot, WorldObject};
pub use position::{Position, WORLD_BOUND};
pub use state::{AgentStateView, BrainState, BrainStateView, SimulationState};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the front-end.

    #[test]
    fn export_bindings() {
        // ts-rs generates TypeScript bindings when types with
        // #[ts(export)] are used. The files are written to the `bindings/`
        // directory relative to the crate root.
        use ts_rs::TS;

        let _ = crate::position::Position::export_all();
        let _ = crate::perception::SensorySnapshot::export_all();
        let _ = crate::perception::NearbyAgent::export_all();
        let _ = crate::perception::WorldObject::export_all();
        let _ = crate::decision::ActionKind::export_all();
        let _ = crate::decision::AgentTarget::export_all();
        let _ = crate::decision::DecisionTarget::export_all();
        let _ = crate::decision::DecisionPayload::export_all();
        let _ = crate::conversation::ConversationEntry::export_all();
        let _ = crate::state::AgentStateView::export_all();
        let _ = crate::state::SimulationState::export_all();
        let _ = crate::state::BrainStateView::export_all();
        let _ = crate::state::BrainState::export_all();
    }
}
