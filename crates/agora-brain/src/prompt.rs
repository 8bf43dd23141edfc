//! Prompt rendering via `minijinja`.
//!
//! Two prompts are produced per agent:
//!
//! - the **system prompt**, rendered once per brain from its profile, the
//!   peer roster and the configured environment / response-format text;
//! - the **user prompt**, rendered every decision cycle from the agent's
//!   position, the current snapshot, the newly arrived messages and both
//!   memory channels.
//!
//! Every line is formatted here in Rust; the templates only lay out the
//! sections. Built-in templates are used unless a templates directory
//! supplies `user.j2` and/or `system.j2`. Rendering is deterministic: wall
//! clock timestamps are never part of a prompt.

use std::path::Path;

use agora_types::{
    ActionMemoryItem, ConversationEntry, Decision, ObservationMemoryItem, Position, SensorySnapshot,
};
use minijinja::{AutoEscape, Environment, context};
use serde::Serialize;

use crate::config::{AgentProfile, PromptConfig};
use crate::error::PromptError;
use crate::memory::MemoryStore;

const USER_TEMPLATE_NAME: &str = "user.j2";
const SYSTEM_TEMPLATE_NAME: &str = "system.j2";

const USER_TEMPLATE: &str = r"Current State:
- Position: {{ position }}
- Simulation time: {{ simulation_time }}s

Current Observations:
{% for line in observations %}
- {{ line }}
{% else %}
- Nothing and nobody is in sight.
{% endfor %}
- {{ coin_status }}

Incoming Messages:
{% for line in incoming %}
- {{ line }}
{% else %}
- No new messages.
{% endfor %}

Past Actions (what I decided to do):
{% for line in past_actions %}
- {{ line }}
{% else %}
- No actions yet.
{% endfor %}

Past Observations (what I saw before):
{% for line in past_observations %}
- {{ line }}
{% else %}
- No earlier observations.
{% endfor %}";

const SYSTEM_TEMPLATE: &str = r#"PERSONALITY: You are {{ name }}, {{ personality }}. Act consistently with this personality in all your actions and communications.

OTHER AGENTS IN THE WORLD:
{% for peer in peers %}
- {{ peer.name }}: {{ peer.personality }}. You can text {{ peer.name }} anytime using the 'text' action with target {"agent": "{{ peer.name }}"}.
{% else %}
- Nobody else lives here.
{% endfor %}

{{ environment_context }}

{{ response_format }}"#;

/// Everything the user prompt is rendered from.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    /// The brain's authoritative position.
    pub position: Position,
    /// This cycle's snapshot.
    pub snapshot: &'a SensorySnapshot,
    /// Both memory channels.
    pub memory: &'a MemoryStore,
    /// Messages that arrived since the previous cycle.
    pub incoming: &'a [ConversationEntry],
}

/// Renders system and user prompts.
pub struct PromptComposer {
    env: Environment<'static>,
}

impl std::fmt::Debug for PromptComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptComposer").finish_non_exhaustive()
    }
}

impl PromptComposer {
    /// Create a composer with the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Template`] if a built-in template fails to compile.
    pub fn new() -> Result<Self, PromptError> {
        Self::build(USER_TEMPLATE.to_owned(), SYSTEM_TEMPLATE.to_owned())
    }

    /// Create a composer, taking `user.j2` and `system.j2` from `dir` when
    /// present and the built-in template otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Io`] if a present template cannot be read, or
    /// [`PromptError::Template`] if a template fails to compile.
    pub fn from_dir(dir: &Path) -> Result<Self, PromptError> {
        let user = load_template(dir, USER_TEMPLATE_NAME)?
            .unwrap_or_else(|| USER_TEMPLATE.to_owned());
        let system =
            load_template(dir, SYSTEM_TEMPLATE_NAME)?.unwrap_or_else(|| SYSTEM_TEMPLATE.to_owned());
        Self::build(user, system)
    }

    /// Create a composer honoring `prompt.templates_dir`.
    ///
    /// # Errors
    ///
    /// See [`PromptComposer::from_dir`].
    pub fn from_config(config: &PromptConfig) -> Result<Self, PromptError> {
        match config.templates_dir.as_deref() {
            Some(dir) => Self::from_dir(Path::new(dir)),
            None => Self::new(),
        }
    }

    fn build(user: String, system: String) -> Result<Self, PromptError> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.add_template_owned(USER_TEMPLATE_NAME, user)?;
        env.add_template_owned(SYSTEM_TEMPLATE_NAME, system)?;
        Ok(Self { env })
    }

    /// Render the per-cycle user prompt.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Template`] if rendering fails.
    pub fn compose_user_prompt(&self, ctx: &PromptContext<'_>) -> Result<String, PromptError> {
        let (observations, coin_status) = describe_snapshot(ctx.snapshot);
        let rendered = self.env.get_template(USER_TEMPLATE_NAME)?.render(context! {
            position => ctx.position.to_string(),
            simulation_time => whole_seconds(ctx.snapshot.simulation_time),
            observations => observations,
            coin_status => coin_status,
            incoming => ctx.incoming.iter().map(describe_message).collect::<Vec<_>>(),
            past_actions => ctx.memory.recent_actions().map(describe_action).collect::<Vec<_>>(),
            past_observations => ctx
                .memory
                .recent_observations()
                .map(describe_observation)
                .collect::<Vec<_>>(),
        })?;
        Ok(rendered)
    }

    /// Render the system prompt for `profile`, listing every other agent in
    /// `roster`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Template`] if rendering fails.
    pub fn system_prompt(
        &self,
        profile: &AgentProfile,
        roster: &[AgentProfile],
        config: &PromptConfig,
    ) -> Result<String, PromptError> {
        let peers: Vec<PeerLine<'_>> = roster
            .iter()
            .filter(|p| p.id != profile.id)
            .map(|p| PeerLine {
                name: &p.name,
                personality: &p.personality,
            })
            .collect();
        let rendered = self.env.get_template(SYSTEM_TEMPLATE_NAME)?.render(context! {
            name => &profile.name,
            personality => &profile.personality,
            peers => peers,
            environment_context => &config.environment_context,
            response_format => &config.response_format,
        })?;
        Ok(rendered)
    }
}

#[derive(Serialize)]
struct PeerLine<'a> {
    name: &'a str,
    personality: &'a str,
}

/// Read `dir/name`, or `None` if it does not exist.
fn load_template(dir: &Path, name: &str) -> Result<Option<String>, PromptError> {
    let path = dir.join(name);
    if !path.exists() {
        return Ok(None);
    }
    std::fs::read_to_string(&path)
        .map(Some)
        .map_err(|source| PromptError::Io {
            path: path.display().to_string(),
            source,
        })
}

// ---------------------------------------------------------------------------
// Line formatting
// ---------------------------------------------------------------------------

fn whole_seconds(time: f64) -> String {
    format!("{:.0}", time.max(0.0).floor())
}

/// Present-tense lines for what is in sight, plus the coin progress line.
fn describe_snapshot(snapshot: &SensorySnapshot) -> (Vec<String>, String) {
    let mut lines = Vec::with_capacity(
        snapshot
            .nearby_agents
            .len()
            .saturating_add(snapshot.world_objects.len()),
    );
    for agent in &snapshot.nearby_agents {
        let mut line = format!(
            "{} is {:.1} units away at {}",
            agent.name, agent.distance, agent.position
        );
        if let Some(utterance) = agent.current_utterance.as_deref().filter(|u| !u.is_empty()) {
            line.push_str(&format!(", saying \"{utterance}\""));
        }
        lines.push(line);
    }
    for object in &snapshot.world_objects {
        lines.push(format!(
            "A {} is {:.1} units away at {}",
            object.name, object.distance, object.position
        ));
    }

    let coin_status = if snapshot.all_coins_collected {
        "All coins have been collected.".to_owned()
    } else {
        format!("Coins collected so far: {}.", snapshot.coins_collected)
    };
    (lines, coin_status)
}

fn describe_message(entry: &ConversationEntry) -> String {
    format!(
        "[{}s] {} said to {}: \"{}\"",
        whole_seconds(entry.simulation_time),
        entry.speaker,
        entry.recipient,
        entry.message
    )
}

/// Past-tense line for one remembered decision.
fn describe_action(item: &ActionMemoryItem) -> String {
    let what = match &item.decision {
        Decision::Move { target } => format!("I moved toward {target}"),
        Decision::Say {
            target: Some(target),
            utterance,
        } => format!("I said to {}: \"{utterance}\"", target.agent),
        Decision::Say {
            target: None,
            utterance,
        } => format!("I said to everyone nearby: \"{utterance}\""),
        Decision::Idle => "I stayed idle".to_owned(),
        Decision::Observe => "I looked around".to_owned(),
    };
    format!("[{}s] {what}", whole_seconds(item.simulation_time))
}

/// Past-tense line for one remembered snapshot.
fn describe_observation(item: &ObservationMemoryItem) -> String {
    let snapshot = &item.snapshot;
    let mut seen: Vec<String> = snapshot
        .nearby_agents
        .iter()
        .map(|a| format!("{} {:.1} units away", a.name, a.distance))
        .collect();
    seen.extend(
        snapshot
            .world_objects
            .iter()
            .map(|o| format!("a {} {:.1} units away", o.name, o.distance)),
    );

    let mut line = format!(
        "[{}s] I was at {} and saw ",
        whole_seconds(item.simulation_time()),
        snapshot.position
    );
    if seen.is_empty() {
        line.push_str("nothing nearby");
    } else {
        line.push_str(&seen.join(", "));
    }
    for entry in &item.heard {
        line.push_str(&format!("; {} told me \"{}\"", entry.speaker, entry.message));
    }
    line
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use agora_types::{AgentTarget, NearbyAgent, WorldObject};
    use chrono::Utc;

    use super::*;

    fn profile(id: &str, name: &str, personality: &str) -> AgentProfile {
        AgentProfile {
            id: id.to_owned(),
            name: name.to_owned(),
            personality: personality.to_owned(),
            color: "gray".to_owned(),
            position: Position::default(),
        }
    }

    fn busy_snapshot() -> SensorySnapshot {
        let mut snapshot = SensorySnapshot::at(Position::new(-2.0, 1.0), 12.7);
        snapshot.nearby_agents = vec![NearbyAgent {
            name: "Bob".to_owned(),
            position: Position::new(2.0, 1.0),
            distance: 4.0,
            current_utterance: Some("Over here!".to_owned()),
        }];
        snapshot.world_objects = vec![WorldObject {
            name: "Coin".to_owned(),
            position: Position::new(0.0, 0.0),
            distance: 2.236,
        }];
        snapshot.coins_collected = 2;
        snapshot
    }

    fn message(text: &str) -> ConversationEntry {
        ConversationEntry {
            speaker: "Bob".to_owned(),
            recipient: "Alice".to_owned(),
            message: text.to_owned(),
            simulation_time: 11.0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn sections_render_in_order() {
        let composer = PromptComposer::new().unwrap();
        let snapshot = busy_snapshot();
        let mut memory = MemoryStore::new(10);
        memory.add_action(
            Decision::Say {
                target: Some(AgentTarget { agent: "Bob".to_owned() }),
                utterance: "Hi Bob".to_owned(),
            },
            5.0,
        );
        memory.add_observation(
            SensorySnapshot::at(Position::new(-2.0, 1.0), 5.0),
            vec![message("Hey")],
        );
        let incoming = [message("Want to team up?")];

        let prompt = composer
            .compose_user_prompt(&PromptContext {
                position: Position::new(-2.0, 1.0),
                snapshot: &snapshot,
                memory: &memory,
                incoming: &incoming,
            })
            .unwrap();

        let headers = [
            "Current State:",
            "Current Observations:",
            "Incoming Messages:",
            "Past Actions (what I decided to do):",
            "Past Observations (what I saw before):",
        ];
        let offsets: Vec<usize> = headers.iter().map(|h| prompt.find(h).unwrap()).collect();
        assert!(offsets.windows(2).all(|w| w.first() < w.get(1)));

        assert!(prompt.contains("- Position: (-2.0, 1.0)"));
        assert!(prompt.contains("- Simulation time: 12s"));
        assert!(prompt.contains("Bob is 4.0 units away at (2.0, 1.0), saying \"Over here!\""));
        assert!(prompt.contains("A Coin is 2.2 units away"));
        assert!(prompt.contains("Coins collected so far: 2."));
        assert!(prompt.contains("[11s] Bob said to Alice: \"Want to team up?\""));
        assert!(prompt.contains("[5s] I said to Bob: \"Hi Bob\""));
        assert!(prompt.contains(
            "[5s] I was at (-2.0, 1.0) and saw nothing nearby; Bob told me \"Hey\""
        ));
    }

    #[test]
    fn empty_sections_use_placeholders() {
        let composer = PromptComposer::new().unwrap();
        let snapshot = SensorySnapshot::at(Position::default(), 0.0);
        let memory = MemoryStore::new(5);
        let prompt = composer
            .compose_user_prompt(&PromptContext {
                position: Position::default(),
                snapshot: &snapshot,
                memory: &memory,
                incoming: &[],
            })
            .unwrap();
        assert!(prompt.contains("- Nothing and nobody is in sight."));
        assert!(prompt.contains("- No new messages."));
        assert!(prompt.contains("- No actions yet."));
        assert!(prompt.contains("- No earlier observations."));
    }

    #[test]
    fn rendering_is_deterministic() {
        let composer = PromptComposer::new().unwrap();
        let snapshot = busy_snapshot();
        let mut memory = MemoryStore::new(10);
        memory.add_action(Decision::Idle, 1.0);
        let ctx = PromptContext {
            position: Position::new(-2.0, 1.0),
            snapshot: &snapshot,
            memory: &memory,
            incoming: &[],
        };
        let first = composer.compose_user_prompt(&ctx).unwrap();
        // Wall-clock timestamps differ between these items; prompts must not.
        let mut later = memory.clone();
        later.clear();
        later.add_action(Decision::Idle, 1.0);
        let second = composer
            .compose_user_prompt(&PromptContext { memory: &later, ..ctx })
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn system_prompt_lists_other_agents_only() {
        let composer = PromptComposer::new().unwrap();
        let roster = vec![
            profile("agent1", "Alice", "Creative and artistic"),
            profile("agent2", "Bob", "Logical and analytical"),
        ];
        let prompt = composer
            .system_prompt(roster.first().unwrap(), &roster, &PromptConfig::default())
            .unwrap();
        assert!(prompt.starts_with(
            "PERSONALITY: You are Alice, Creative and artistic. \
             Act consistently with this personality"
        ));
        assert!(prompt.contains("OTHER AGENTS IN THE WORLD:"));
        assert!(prompt.contains(
            "- Bob: Logical and analytical. You can text Bob anytime using the 'text' action \
             with target {\"agent\": \"Bob\"}."
        ));
        assert!(!prompt.contains("- Alice:"));
        assert!(prompt.contains("ENVIRONMENT:"));
        assert!(prompt.contains("RESPONSE FORMAT:"));
    }

    #[test]
    fn templates_dir_overrides_user_template() {
        let unique = format!(
            "agora_test_templates_{}_{:?}",
            std::process::id(),
            std::thread::current().id(),
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).ok();
        std::fs::write(dir.join("user.j2"), "Where: {{ position }} at {{ simulation_time }}s").ok();

        let composer = PromptComposer::from_dir(&dir).unwrap();
        let snapshot = SensorySnapshot::at(Position::new(1.0, 2.0), 3.9);
        let memory = MemoryStore::new(1);
        let prompt = composer
            .compose_user_prompt(&PromptContext {
                position: Position::new(1.0, 2.0),
                snapshot: &snapshot,
                memory: &memory,
                incoming: &[],
            })
            .unwrap();
        assert_eq!(prompt, "Where: (1.0, 2.0) at 3s");

        // system.j2 was not supplied, so the built-in one is used.
        let alice = profile("a", "Alice", "calm");
        let system = composer
            .system_prompt(&alice, &[alice.clone()], &PromptConfig::default())
            .unwrap();
        assert!(system.contains("Nobody else lives here."));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn broken_override_is_rejected() {
        let unique = format!("agora_broken_templates_{}", std::process::id());
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).ok();
        std::fs::write(dir.join("system.j2"), "{% for %}").ok();

        assert!(matches!(
            PromptComposer::from_dir(&dir),
            Err(PromptError::Template(_))
        ));

        std::fs::remove_dir_all(&dir).ok();
    }
}
