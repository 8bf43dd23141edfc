//! Memory item types stored in a brain's two memory channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::ConversationEntry;
use crate::decision::Decision;
use crate::perception::SensorySnapshot;

/// A decision the agent made, stamped with when it was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMemoryItem {
    /// The validated decision.
    pub decision: Decision,
    /// Simulation clock (seconds) when the decision was made.
    pub simulation_time: f64,
    /// Wall-clock time when the decision was recorded.
    pub timestamp: DateTime<Utc>,
}

/// What the agent perceived during one past decision cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationMemoryItem {
    /// The raw snapshot the cycle reasoned over.
    pub snapshot: SensorySnapshot,
    /// Messages that arrived during that cycle.
    #[serde(default)]
    pub heard: Vec<ConversationEntry>,
}

impl ObservationMemoryItem {
    /// Simulation clock of the underlying snapshot.
    pub const fn simulation_time(&self) -> f64 {
        self.snapshot.simulation_time
    }
}
