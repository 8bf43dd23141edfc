//! Repair of raw model output into a well-formed [`Decision`].
//!
//! The validator never fails. Whatever the model produced (or whatever the
//! fallback synthesized) comes out as a decision the world can execute:
//!
//! 1. Unknown or missing `action` becomes `idle`.
//! 2. `move` targets are parsed leniently (numbers or numeric strings) and
//!    clamped per axis; an unusable target becomes the current position
//!    plus a bounded random offset.
//! 3. `say` / `text` get a default utterance when blank and are truncated
//!    when too long; the addressee is kept only if it names an agent.
//! 4. Every other field is dropped.

use agora_types::{ActionKind, AgentTarget, Decision, Position, WORLD_BOUND};
use rand::Rng;
use serde_json::Value;
use tracing::debug;

use crate::config::BrainConfig;

/// Utterance used when a `say` decision arrives without one.
pub const DEFAULT_UTTERANCE: &str = "Hello there!";

const ELLIPSIS: &str = "...";

/// Smallest utterance cap that can still hold the truncation marker.
pub const MIN_UTTERANCE_CHARS: usize = ELLIPSIS.len();

/// Sanitizer for raw decision objects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionValidator {
    bound: f64,
    max_utterance_chars: usize,
    move_jitter: f64,
}

impl DecisionValidator {
    /// Create a validator with explicit limits.
    ///
    /// A non-positive or non-finite `bound` falls back to [`WORLD_BOUND`];
    /// `max_utterance_chars` is raised to fit at least the truncation marker.
    pub const fn new(bound: f64, max_utterance_chars: usize, move_jitter: f64) -> Self {
        let bound = if bound.is_finite() && bound > 0.0 {
            bound
        } else {
            WORLD_BOUND
        };
        let max_utterance_chars = if max_utterance_chars < MIN_UTTERANCE_CHARS {
            MIN_UTTERANCE_CHARS
        } else {
            max_utterance_chars
        };
        Self {
            bound,
            max_utterance_chars,
            move_jitter,
        }
    }

    /// Create a validator from the brain section of the configuration.
    pub const fn from_config(config: &BrainConfig) -> Self {
        Self::new(
            config.world_bound,
            config.max_utterance_chars,
            config.move_jitter,
        )
    }

    /// Half-width of the world used for clamping.
    pub const fn bound(&self) -> f64 {
        self.bound
    }

    /// Turn any JSON value into a valid decision.
    ///
    /// `current` is the agent's position, used to synthesize a move target
    /// when the model's target is unusable.
    pub fn validate<R: Rng + ?Sized>(
        &self,
        raw: &Value,
        current: Position,
        rng: &mut R,
    ) -> Decision {
        let action = raw
            .get("action")
            .and_then(Value::as_str)
            .and_then(ActionKind::parse);

        match action {
            Some(ActionKind::Move) => {
                let target = raw
                    .get("target")
                    .and_then(parse_position)
                    .unwrap_or_else(|| {
                        debug!(raw = %raw, "move without a usable target, jittering");
                        self.jittered(current, rng)
                    });
                Decision::Move {
                    target: target.clamped(self.bound),
                }
            }
            Some(ActionKind::Say) => Decision::Say {
                target: raw.get("target").and_then(parse_agent_target),
                utterance: self
                    .sanitize_utterance(raw.get("utterance").and_then(Value::as_str)),
            },
            Some(ActionKind::Idle) => Decision::Idle,
            Some(ActionKind::Observe) => Decision::Observe,
            None => {
                debug!(raw = %raw, "unrecognized action, defaulting to idle");
                Decision::Idle
            }
        }
    }

    /// A point within `move_jitter` of `from` on each axis, clamped into the world.
    pub fn jittered<R: Rng + ?Sized>(&self, from: Position, rng: &mut R) -> Position {
        let from = from.clamped(self.bound);
        let jitter = if self.move_jitter.is_finite() && self.move_jitter > 0.0 {
            self.move_jitter
        } else {
            return from;
        };
        Position::new(
            from.x + rng.random_range(-jitter..=jitter),
            from.z + rng.random_range(-jitter..=jitter),
        )
        .clamped(self.bound)
    }

    /// Default blank utterances and cap long ones at `max_utterance_chars`.
    pub fn sanitize_utterance(&self, raw: Option<&str>) -> String {
        let text = match raw.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return DEFAULT_UTTERANCE.to_owned(),
        };
        if text.chars().count() <= self.max_utterance_chars {
            return text.to_owned();
        }
        let keep = self.max_utterance_chars.saturating_sub(ELLIPSIS.len());
        let mut truncated: String = text.chars().take(keep).collect();
        truncated.push_str(ELLIPSIS);
        truncated
    }
}

/// Parse `{x, z}` where each axis is a finite number or numeric string.
fn parse_position(value: &Value) -> Option<Position> {
    let x = value.get("x").and_then(parse_axis)?;
    let z = value.get("z").and_then(parse_axis)?;
    Some(Position::new(x, z))
}

fn parse_axis(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Accept `{agent: name}` or a bare name; anything else means "everyone nearby".
fn parse_agent_target(value: &Value) -> Option<AgentTarget> {
    let name = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("agent").and_then(Value::as_str)?,
        _ => return None,
    };
    let name = name.trim();
    (!name.is_empty()).then(|| AgentTarget {
        agent: name.to_owned(),
    })
}
