//! Rule-based decisions for when the model cannot be used.
//!
//! Any failed model call (unreachable endpoint, error status, timeout,
//! unparseable output) lands here so the caller still gets a decision.
//! The rules only look at the current snapshot:
//!
//! - a visible world object: walk to the nearest one;
//! - otherwise a visible peer: greet the nearest one or wander, 50/50;
//! - otherwise wander.
//!
//! The output is a raw decision object that still goes through the
//! validator like model output does.

use agora_types::{Position, SensorySnapshot};
use rand::Rng;
use serde_json::{Value, json};

use crate::validation::DecisionValidator;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// What an agent says to a peer when the model is unavailable.
pub const FALLBACK_GREETING: &str = "Hello there! How's your coin hunting going?";

/// Probability of greeting (rather than wandering) when a peer is in sight.
const GREETING_PROBABILITY: f64 = 0.5;

// ---------------------------------------------------------------------------
// Decision source tagging
// ---------------------------------------------------------------------------

/// Indicates where a raw decision came from, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// The model called one of the declared tools.
    ToolCall,
    /// The model answered with JSON text.
    Content,
    /// The rule-based fallback produced it.
    Fallback,
}

impl DecisionSource {
    /// Human-readable label for logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToolCall => "tool_call",
            Self::Content => "content",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Produce a raw decision from the snapshot alone.
pub fn fallback_decision<R: Rng + ?Sized>(
    snapshot: &SensorySnapshot,
    validator: &DecisionValidator,
    rng: &mut R,
) -> Value {
    if let Some(object) = snapshot.nearest_object() {
        return move_to(object.position);
    }

    if let Some(peer) = snapshot.nearest_agent()
        && rng.random_bool(GREETING_PROBABILITY)
    {
        return json!({
            "action": "say",
            "target": {"agent": peer.name},
            "utterance": FALLBACK_GREETING,
        });
    }

    move_to(validator.jittered(snapshot.position, rng))
}

fn move_to(target: Position) -> Value {
    json!({
        "action": "move",
        "target": {"x": target.x, "z": target.z},
        "utterance": null,
    })
}

#[cfg(test)]
mod tests {
    use agora_types::{NearbyAgent, WorldObject};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn validator() -> DecisionValidator {
        DecisionValidator::new(4.0, 200, 2.0)
    }

    fn peer(name: &str, distance: f64) -> NearbyAgent {
        NearbyAgent {
            name: name.to_owned(),
            position: Position::new(distance, 0.0),
            distance,
            current_utterance: None,
        }
    }

    #[test]
    fn walks_to_nearest_object() {
        let mut snapshot = SensorySnapshot::at(Position::new(0.0, 0.0), 3.0);
        snapshot.world_objects = vec![
            WorldObject {
                name: "Coin".to_owned(),
                position: Position::new(3.0, 3.0),
                distance: 4.2,
            },
            WorldObject {
                name: "Coin".to_owned(),
                position: Position::new(-1.0, 0.5),
                distance: 1.1,
            },
        ];
        snapshot.nearby_agents = vec![peer("Bob", 1.0)];
        let mut rng = StdRng::seed_from_u64(1);
        let raw = fallback_decision(&snapshot, &validator(), &mut rng);
        assert_eq!(raw["action"], "move");
        assert_eq!(raw["target"]["x"], -1.0);
        assert_eq!(raw["target"]["z"], 0.5);
    }

    #[test]
    fn peer_in_sight_greets_or_wanders() {
        let mut snapshot = SensorySnapshot::at(Position::new(0.0, 0.0), 3.0);
        snapshot.nearby_agents = vec![peer("Bob", 2.5), peer("Carol", 1.5)];
        let mut rng = StdRng::seed_from_u64(99);
        let mut greeted = 0_u32;
        let mut wandered = 0_u32;
        for _ in 0..200 {
            let raw = fallback_decision(&snapshot, &validator(), &mut rng);
            match raw["action"].as_str() {
                Some("say") => {
                    assert_eq!(raw["target"]["agent"], "Carol");
                    assert_eq!(raw["utterance"], FALLBACK_GREETING);
                    greeted = greeted.saturating_add(1);
                }
                Some("move") => wandered = wandered.saturating_add(1),
                other => panic!("unexpected action {other:?}"),
            }
        }
        assert!(greeted > 0 && wandered > 0);
    }

    #[test]
    fn alone_wanders_within_bounds() {
        let snapshot = SensorySnapshot::at(Position::new(3.5, -3.5), 0.0);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let raw = fallback_decision(&snapshot, &validator(), &mut rng);
            assert_eq!(raw["action"], "move");
            let x = raw["target"]["x"].as_f64().unwrap_or(f64::NAN);
            let z = raw["target"]["z"].as_f64().unwrap_or(f64::NAN);
            assert!(Position::new(x, z).within(4.0));
            assert!((x - 3.5).abs() <= 2.0);
        }
    }

    #[test]
    fn source_labels() {
        assert_eq!(DecisionSource::ToolCall.as_str(), "tool_call");
        assert_eq!(DecisionSource::Content.to_string(), "content");
        assert_eq!(DecisionSource::Fallback.as_str(), "fallback");
    }
}
