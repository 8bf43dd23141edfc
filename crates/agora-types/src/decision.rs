//! Decisions: the single structured action a brain emits per cycle.
//!
//! [`Decision`] is the typed, always-valid form used inside the brain.
//! On the wire every decision has the flat shape
//! `{"action": ..., "target": ..., "utterance": ...}` with explicit nulls,
//! which is what [`DecisionPayload`] models. Conversion from the payload is
//! strict; repairing sloppy model output is the validator's job, not serde's.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::position::Position;

/// Action vocabulary understood by the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ActionKind {
    /// Walk to a target position.
    Move,
    /// Speak to another agent (or everyone nearby). `text` is accepted as an alias.
    #[serde(alias = "text")]
    Say,
    /// Do nothing for a while.
    Idle,
    /// Look around without acting.
    Observe,
}

impl ActionKind {
    /// Wire name of the action.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Say => "say",
            Self::Idle => "idle",
            Self::Observe => "observe",
        }
    }

    /// Parse a loosely-written action name.
    ///
    /// Case-insensitive; accepts the `text` alias for [`ActionKind::Say`]
    /// and the older tool names `move_to` / `say_to`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "move" | "move_to" => Some(Self::Move),
            "say" | "text" | "say_to" => Some(Self::Say),
            "idle" => Some(Self::Idle),
            "observe" => Some(Self::Observe),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Addressee of a `say` decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentTarget {
    /// Display name of the agent being addressed.
    pub agent: String,
}

/// A validated decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "DecisionPayload", try_from = "DecisionPayload")]
pub enum Decision {
    /// Walk to `target`.
    Move {
        /// Destination, already clamped into the world.
        target: Position,
    },
    /// Say `utterance` to `target`, or to everyone nearby when `target` is `None`.
    Say {
        /// Addressee, if any.
        target: Option<AgentTarget>,
        /// What to say (non-empty, length-capped).
        utterance: String,
    },
    /// Rest in place.
    Idle,
    /// Look around.
    Observe,
}

impl Decision {
    /// The action kind of this decision.
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Move { .. } => ActionKind::Move,
            Self::Say { .. } => ActionKind::Say,
            Self::Idle => ActionKind::Idle,
            Self::Observe => ActionKind::Observe,
        }
    }

    /// The utterance, for `say` decisions.
    pub fn utterance(&self) -> Option<&str> {
        match self {
            Self::Say { utterance, .. } => Some(utterance),
            _ => None,
        }
    }

    /// The decision's target in wire form.
    pub fn target(&self) -> Option<DecisionTarget> {
        match self {
            Self::Move { target } => Some(DecisionTarget::Position(*target)),
            Self::Say { target, .. } => target.clone().map(DecisionTarget::Agent),
            Self::Idle | Self::Observe => None,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Move { target } => write!(f, "move -> {target}"),
            Self::Say {
                target: Some(t),
                utterance,
            } => write!(f, "say -> {}: {utterance:?}", t.agent),
            Self::Say { target: None, utterance } => write!(f, "say: {utterance:?}"),
            Self::Idle => f.write_str("idle"),
            Self::Observe => f.write_str("observe"),
        }
    }
}

/// Target of a decision in wire form: a position for `move`, an agent for `say`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export, export_to = "bindings/")]
pub enum DecisionTarget {
    /// Destination of a `move`.
    Position(Position),
    /// Addressee of a `say`.
    Agent(AgentTarget),
}

/// Flat wire representation of a [`Decision`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DecisionPayload {
    /// The chosen action.
    pub action: ActionKind,
    /// Action-dependent target, or null.
    pub target: Option<DecisionTarget>,
    /// Spoken text for `say`, otherwise null.
    pub utterance: Option<String>,
}

impl From<Decision> for DecisionPayload {
    fn from(decision: Decision) -> Self {
        let target = decision.target();
        let action = decision.kind();
        let utterance = match decision {
            Decision::Say { utterance, .. } => Some(utterance),
            _ => None,
        };
        Self {
            action,
            target,
            utterance,
        }
    }
}

/// A payload whose target or utterance does not fit its action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid decision shape: {0}")]
pub struct DecisionShapeError(pub String);

impl TryFrom<DecisionPayload> for Decision {
    type Error = DecisionShapeError;

    fn try_from(payload: DecisionPayload) -> Result<Self, Self::Error> {
        match payload.action {
            ActionKind::Move => match payload.target {
                Some(DecisionTarget::Position(target)) => Ok(Self::Move { target }),
                _ => Err(DecisionShapeError("move requires a position target".to_owned())),
            },
            ActionKind::Say => {
                let target = match payload.target {
                    Some(DecisionTarget::Agent(t)) => Some(t),
                    None => None,
                    Some(DecisionTarget::Position(_)) => {
                        return Err(DecisionShapeError(
                            "say target must name an agent".to_owned(),
                        ));
                    }
                };
                match payload.utterance {
                    Some(utterance) if !utterance.trim().is_empty() => {
                        Ok(Self::Say { target, utterance })
                    }
                    _ => Err(DecisionShapeError("say requires an utterance".to_owned())),
                }
            }
            ActionKind::Idle => Ok(Self::Idle),
            ActionKind::Observe => Ok(Self::Observe),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_serializes_with_explicit_nulls() {
        let json = serde_json::to_value(Decision::Idle).unwrap_or_default();
        assert_eq!(
            json,
            serde_json::json!({"action": "idle", "target": null, "utterance": null})
        );
    }

    #[test]
    fn move_serializes_position_target() {
        let json = serde_json::to_value(Decision::Move {
            target: Position::new(1.0, -2.0),
        })
        .unwrap_or_default();
        assert_eq!(json["action"], "move");
        assert_eq!(json["target"]["x"], 1.0);
        assert_eq!(json["target"]["z"], -2.0);
        assert!(json["utterance"].is_null());
    }

    #[test]
    fn say_serializes_agent_target() {
        let json = serde_json::to_value(Decision::Say {
            target: Some(AgentTarget {
                agent: "Bob".to_owned(),
            }),
            utterance: "Hi Bob".to_owned(),
        })
        .unwrap_or_default();
        assert_eq!(json["action"], "say");
        assert_eq!(json["target"]["agent"], "Bob");
        assert_eq!(json["utterance"], "Hi Bob");
    }

    #[test]
    fn text_alias_deserializes_as_say() {
        let decision: Result<Decision, _> = serde_json::from_value(serde_json::json!({
            "action": "text",
            "target": {"agent": "Alice"},
            "utterance": "hello"
        }));
        assert!(matches!(decision, Ok(Decision::Say { .. })));
    }

    #[test]
    fn strict_conversion_rejects_mismatched_target() {
        let decision: Result<Decision, _> = serde_json::from_value(serde_json::json!({
            "action": "move",
            "target": {"agent": "Alice"},
            "utterance": null
        }));
        assert!(decision.is_err());
    }

    #[test]
    fn parse_is_lenient() {
        assert_eq!(ActionKind::parse(" MOVE "), Some(ActionKind::Move));
        assert_eq!(ActionKind::parse("say_to"), Some(ActionKind::Say));
        assert_eq!(ActionKind::parse("text"), Some(ActionKind::Say));
        assert_eq!(ActionKind::parse("dance"), None);
    }
}
