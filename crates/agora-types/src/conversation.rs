//! Agent-to-agent conversation log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One message exchanged between two agents.
///
/// The same entry is appended to the speaker's and the recipient's logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ConversationEntry {
    /// Display name of the agent who spoke.
    pub speaker: String,
    /// Display name of the agent spoken to.
    pub recipient: String,
    /// What was said.
    pub message: String,
    /// Simulation clock (seconds) when the message was sent.
    pub simulation_time: f64,
    /// Wall-clock time when the message was sent.
    pub timestamp: DateTime<Utc>,
}
