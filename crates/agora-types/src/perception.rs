//! Sensory snapshot delivered by the world for each decision request.
//!
//! The snapshot is the **only** information a brain receives about the
//! world during a cycle. It is produced by the front-end simulator, so its
//! wire keys are camelCase. Everything except the agent's own position
//! defaults when absent.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::position::Position;

/// Point-in-time observation payload a brain reasons over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct SensorySnapshot {
    /// Where the agent stands according to the world.
    pub position: Position,
    /// Simulation clock in seconds.
    #[serde(default)]
    pub simulation_time: f64,
    /// Other agents within sight.
    #[serde(default)]
    pub nearby_agents: Vec<NearbyAgent>,
    /// Points of interest within sight (coins and the like).
    #[serde(default)]
    pub world_objects: Vec<WorldObject>,
    /// Whether every coin in the world has been picked up.
    #[serde(default)]
    pub all_coins_collected: bool,
    /// Number of coins collected so far.
    #[serde(default)]
    pub coins_collected: u32,
}

impl SensorySnapshot {
    /// A bare snapshot at `position` with nothing in sight.
    pub const fn at(position: Position, simulation_time: f64) -> Self {
        Self {
            position,
            simulation_time,
            nearby_agents: Vec::new(),
            world_objects: Vec::new(),
            all_coins_collected: false,
            coins_collected: 0,
        }
    }

    /// The closest visible world object, if any.
    pub fn nearest_object(&self) -> Option<&WorldObject> {
        self.world_objects
            .iter()
            .filter(|o| o.distance.is_finite())
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// The closest visible agent, if any.
    pub fn nearest_agent(&self) -> Option<&NearbyAgent> {
        self.nearby_agents
            .iter()
            .filter(|a| a.distance.is_finite())
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

/// Another agent as seen in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct NearbyAgent {
    /// Display name of the other agent.
    pub name: String,
    /// Where the other agent stands.
    pub position: Position,
    /// Distance from the observing agent.
    #[serde(default)]
    pub distance: f64,
    /// What the other agent is currently saying, if anything.
    #[serde(default)]
    pub current_utterance: Option<String>,
}

/// A visible point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct WorldObject {
    /// Object label (e.g. `"Coin"`).
    pub name: String,
    /// Where the object lies.
    pub position: Position,
    /// Distance from the observing agent.
    #[serde(default)]
    pub distance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_front_end_payload() {
        let json = serde_json::json!({
            "position": {"x": -2.0, "y": 0.6, "z": 1.0},
            "simulationTime": 12.5,
            "nearbyAgents": [
                {
                    "name": "Bob",
                    "position": {"x": 2.0, "z": 1.0},
                    "distance": 4.0,
                    "currentUtterance": "hi"
                }
            ],
            "worldObjects": [
                {"name": "Coin", "position": {"x": 0.0, "z": 0.0}, "distance": 2.2}
            ],
            "allCoinsCollected": false,
            "coinsCollected": 3
        });
        let snapshot: SensorySnapshot = serde_json::from_value(json)
            .unwrap_or_else(|_| SensorySnapshot::at(Position::default(), 0.0));
        assert_eq!(snapshot.coins_collected, 3);
        assert_eq!(snapshot.nearby_agents.len(), 1);
        assert_eq!(
            snapshot.nearby_agents.first().and_then(|a| a.current_utterance.as_deref()),
            Some("hi")
        );
    }

    #[test]
    fn only_position_is_required() {
        let snapshot: Result<SensorySnapshot, _> =
            serde_json::from_value(serde_json::json!({"position": {"x": 0, "z": 0}}));
        assert!(snapshot.is_ok());

        let missing: Result<SensorySnapshot, _> =
            serde_json::from_value(serde_json::json!({"simulationTime": 3}));
        assert!(missing.is_err());
    }

    #[test]
    fn nearest_object_picks_smallest_distance() {
        let mut snapshot = SensorySnapshot::at(Position::default(), 0.0);
        snapshot.world_objects = vec![
            WorldObject {
                name: "Far".to_owned(),
                position: Position::new(3.0, 3.0),
                distance: 4.2,
            },
            WorldObject {
                name: "Near".to_owned(),
                position: Position::new(1.0, 0.0),
                distance: 1.0,
            },
        ];
        assert_eq!(snapshot.nearest_object().map(|o| o.name.as_str()), Some("Near"));
        assert!(snapshot.nearest_agent().is_none());
    }
}
