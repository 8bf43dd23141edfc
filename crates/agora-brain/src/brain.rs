//! The per-agent brain and its decision cycle.
//!
//! A cycle is split in two so the brain's state is not held while the model
//! is thinking:
//!
//! 1. [`AgentBrain::prepare`] syncs the position from the snapshot and
//!    renders the user prompt;
//! 2. the caller obtains a [`ClientDecision`] without holding the brain;
//! 3. [`AgentBrain::commit`] validates it and records it in memory.
//!
//! Between cycles the brain cools down: a request that arrives within the
//! decision interval gets the previous decision back without a model call.

use std::time::{Duration, Instant};

use agora_types::{
    ActionKind, AgentStateView, BrainStateView, ConversationEntry, Decision, DecisionTarget,
    Position, SensorySnapshot,
};
use tracing::{error, info};

use crate::config::{AgentProfile, BrainConfig};
use crate::conversation::Inbox;
use crate::llm::{ClientDecision, DecisionRequest};
use crate::memory::MemoryStore;
use crate::prompt::{PromptComposer, PromptContext};
use crate::validation::DecisionValidator;

/// State of one agent's decision making.
#[derive(Debug, Clone)]
pub struct AgentBrain {
    profile: AgentProfile,
    system_prompt: String,
    bound: f64,
    position: Position,
    memory: MemoryStore,
    last_decision: Decision,
    current_action: Option<ActionKind>,
    current_target: Option<DecisionTarget>,
    current_utterance: Option<String>,
    utterance_end_time: f64,
    utterance_display_secs: f64,
    last_decision_at: Option<Instant>,
    decision_interval: Duration,
    conversation_cursor: usize,
}

/// A cycle that has been prepared but not yet committed.
#[derive(Debug, Clone)]
pub struct PendingCycle {
    agent_id: String,
    system_prompt: String,
    user_prompt: Option<String>,
    snapshot: SensorySnapshot,
    heard: Vec<ConversationEntry>,
    cursor: usize,
}

impl PendingCycle {
    /// The model request for this cycle, or `None` if the prompt could not
    /// be rendered (the caller should use the fallback).
    pub fn request(&self) -> Option<DecisionRequest<'_>> {
        self.user_prompt.as_deref().map(|user_prompt| DecisionRequest {
            agent_id: &self.agent_id,
            system_prompt: &self.system_prompt,
            user_prompt,
            snapshot: &self.snapshot,
        })
    }

    /// The snapshot this cycle reasons over.
    pub const fn snapshot(&self) -> &SensorySnapshot {
        &self.snapshot
    }
}

impl AgentBrain {
    /// Create a brain at the profile's starting position.
    pub fn new(profile: AgentProfile, system_prompt: String, config: &BrainConfig) -> Self {
        let position = profile.position.clamped(config.world_bound);
        Self {
            profile,
            system_prompt,
            bound: config.world_bound,
            position,
            memory: MemoryStore::new(config.memory_capacity),
            last_decision: Decision::Idle,
            current_action: None,
            current_target: None,
            current_utterance: None,
            utterance_end_time: 0.0,
            utterance_display_secs: config.utterance_display_secs,
            last_decision_at: None,
            decision_interval: Duration::from_millis(config.decision_interval_ms),
            conversation_cursor: 0,
        }
    }

    /// The agent's static profile.
    pub const fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    /// The rendered system prompt.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Authoritative position.
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Both memory channels.
    pub const fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Action in progress, if any.
    pub const fn current_action(&self) -> Option<ActionKind> {
        self.current_action
    }

    /// Target of the action in progress, if any.
    pub const fn current_target(&self) -> Option<&DecisionTarget> {
        self.current_target.as_ref()
    }

    /// Utterance being displayed, if any.
    pub fn current_utterance(&self) -> Option<&str> {
        self.current_utterance.as_deref()
    }

    /// Simulation time at which the current utterance stops being shown.
    pub const fn utterance_end_time(&self) -> f64 {
        self.utterance_end_time
    }

    /// How far into its conversation log the agent has read.
    pub const fn conversation_cursor(&self) -> usize {
        self.conversation_cursor
    }

    /// The previous decision if the brain is still cooling down at `now`.
    pub fn cooldown_decision(&self, now: Instant) -> Option<Decision> {
        let at = self.last_decision_at?;
        (now.saturating_duration_since(at) < self.decision_interval)
            .then(|| self.last_decision.clone())
    }

    /// Start a decision cycle: adopt the snapshot's position and render the
    /// user prompt.
    pub fn prepare(
        &mut self,
        snapshot: SensorySnapshot,
        inbox: Inbox,
        composer: &PromptComposer,
    ) -> PendingCycle {
        self.position = snapshot.position.clamped(self.bound);

        let user_prompt = match composer.compose_user_prompt(&PromptContext {
            position: self.position,
            snapshot: &snapshot,
            memory: &self.memory,
            incoming: &inbox.entries,
        }) {
            Ok(prompt) => Some(prompt),
            Err(e) => {
                error!(agent_id = %self.profile.id, error = %e, "failed to render prompt");
                None
            }
        };

        PendingCycle {
            agent_id: self.profile.id.clone(),
            system_prompt: self.system_prompt.clone(),
            user_prompt,
            snapshot,
            heard: inbox.entries,
            cursor: inbox.cursor,
        }
    }

    /// Finish a decision cycle: validate the raw decision, remember it and
    /// what was observed, and start the cooldown.
    pub fn commit(
        &mut self,
        pending: PendingCycle,
        client_decision: &ClientDecision,
        validator: &DecisionValidator,
        now: Instant,
    ) -> Decision {
        let decision = validator.validate(&client_decision.raw, self.position, &mut rand::rng());
        let simulation_time = pending.snapshot.simulation_time;

        self.memory.add_action(decision.clone(), simulation_time);
        self.memory.add_observation(pending.snapshot, pending.heard);
        self.conversation_cursor = pending.cursor;
        self.last_decision_at = Some(now);
        self.last_decision = decision.clone();
        self.current_action = Some(decision.kind());
        self.current_target = decision.target();
        if let Some(utterance) = decision.utterance() {
            self.current_utterance = Some(utterance.to_owned());
            self.utterance_end_time = simulation_time + self.utterance_display_secs;
        }

        info!(
            agent_id = %self.profile.id,
            action = decision.kind().as_str(),
            source = client_decision.source.as_str(),
            decision = %decision,
            "decision made"
        );
        decision
    }

    /// Apply an action-completion report from the world.
    pub fn report_completion(&mut self, action_type: &str, final_position: Option<Position>) {
        if let Some(position) = final_position {
            self.position = position.clamped(self.bound);
        }
        self.current_action = None;
        self.current_target = None;
        if ActionKind::parse(action_type) == Some(ActionKind::Say) {
            self.current_utterance = None;
            self.utterance_end_time = 0.0;
        }
    }

    /// Return to the configured starting state.
    pub fn reset(&mut self) {
        self.position = self.profile.position.clamped(self.bound);
        self.memory.clear();
        self.last_decision = Decision::Idle;
        self.current_action = None;
        self.current_target = None;
        self.current_utterance = None;
        self.utterance_end_time = 0.0;
        self.last_decision_at = None;
        self.conversation_cursor = 0;
    }

    /// Forget how far into the conversation log the agent has read.
    pub const fn rewind_conversation(&mut self) {
        self.conversation_cursor = 0;
    }

    /// What the world needs to render this agent.
    pub fn state_view(&self) -> AgentStateView {
        AgentStateView {
            id: self.profile.id.clone(),
            name: self.profile.name.clone(),
            position: self.position,
            current_action: self
                .current_action
                .unwrap_or(ActionKind::Idle)
                .as_str()
                .to_owned(),
            current_utterance: self.current_utterance.clone(),
        }
    }

    /// Memory summary for operators.
    pub fn brain_view(&self) -> BrainStateView {
        BrainStateView {
            id: self.profile.id.clone(),
            name: self.profile.name.clone(),
            personality: self.profile.personality.clone(),
            action_memory_count: u32::try_from(self.memory.action_count()).unwrap_or(u32::MAX),
            observation_memory_count: u32::try_from(self.memory.observation_count())
                .unwrap_or(u32::MAX),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use agora_types::AgentTarget;
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::fallback::DecisionSource;

    fn config() -> BrainConfig {
        BrainConfig {
            decision_interval_ms: 1_000,
            memory_capacity: 3,
            ..BrainConfig::default()
        }
    }

    fn brain() -> AgentBrain {
        let profile = AgentProfile {
            id: "agent1".to_owned(),
            name: "Alice".to_owned(),
            personality: "Creative and artistic".to_owned(),
            color: "red".to_owned(),
            position: Position::new(-2.0, 1.0),
        };
        AgentBrain::new(profile, "PERSONALITY: ...".to_owned(), &config())
    }

    fn raw(value: serde_json::Value) -> ClientDecision {
        ClientDecision {
            raw: value,
            source: DecisionSource::ToolCall,
        }
    }

    fn run_cycle(
        brain: &mut AgentBrain,
        snapshot: SensorySnapshot,
        inbox: Inbox,
        model: &ClientDecision,
        now: Instant,
    ) -> Decision {
        let composer = PromptComposer::new().unwrap();
        let validator = DecisionValidator::from_config(&config());
        let pending = brain.prepare(snapshot, inbox, &composer);
        assert!(pending.request().is_some());
        brain.commit(pending, model, &validator, now)
    }

    #[test]
    fn commit_records_memory_and_cooldown() {
        let mut brain = brain();
        let now = Instant::now();
        let decision = run_cycle(
            &mut brain,
            SensorySnapshot::at(Position::new(-1.0, 1.0), 4.0),
            Inbox::default(),
            &raw(json!({"action": "move", "target": {"x": 9, "z": 0}})),
            now,
        );
        assert_eq!(decision, Decision::Move { target: Position::new(4.0, 0.0) });
        assert_eq!(brain.position(), Position::new(-1.0, 1.0));
        assert_eq!(brain.memory().action_count(), 1);
        assert_eq!(brain.memory().observation_count(), 1);
        assert_eq!(brain.current_action(), Some(ActionKind::Move));

        assert_eq!(brain.cooldown_decision(now + Duration::from_millis(500)), Some(decision));
        assert_eq!(brain.cooldown_decision(now + Duration::from_millis(1_500)), None);
    }

    #[test]
    fn say_sets_utterance_until_completion_report() {
        let mut brain = brain();
        let decision = run_cycle(
            &mut brain,
            SensorySnapshot::at(Position::new(-2.0, 1.0), 10.0),
            Inbox::default(),
            &raw(json!({"action": "text", "target": {"agent": "Bob"}, "utterance": "Hi Bob"})),
            Instant::now(),
        );
        assert_eq!(
            decision,
            Decision::Say {
                target: Some(AgentTarget { agent: "Bob".to_owned() }),
                utterance: "Hi Bob".to_owned()
            }
        );
        assert_eq!(brain.current_utterance(), Some("Hi Bob"));
        assert!((brain.utterance_end_time() - 15.0).abs() < f64::EPSILON);
        assert_eq!(brain.state_view().current_utterance.as_deref(), Some("Hi Bob"));

        brain.report_completion("say", Some(Position::new(1.0, 7.0)));
        assert!(brain.current_utterance().is_none());
        assert!(brain.utterance_end_time().abs() < f64::EPSILON);
        assert!(brain.current_action().is_none());
        assert_eq!(brain.position(), Position::new(1.0, 4.0));
    }

    #[test]
    fn non_say_completion_keeps_utterance() {
        let mut brain = brain();
        run_cycle(
            &mut brain,
            SensorySnapshot::at(Position::default(), 1.0),
            Inbox::default(),
            &raw(json!({"action": "say", "utterance": "Anyone here?"})),
            Instant::now(),
        );
        brain.report_completion("move", None);
        assert_eq!(brain.current_utterance(), Some("Anyone here?"));
        assert_eq!(brain.state_view().current_action, "idle");
    }

    #[test]
    fn observation_memory_keeps_heard_messages() {
        let mut brain = brain();
        let heard = ConversationEntry {
            speaker: "Bob".to_owned(),
            recipient: "Alice".to_owned(),
            message: "Over here".to_owned(),
            simulation_time: 2.0,
            timestamp: Utc::now(),
        };
        run_cycle(
            &mut brain,
            SensorySnapshot::at(Position::default(), 3.0),
            Inbox { entries: vec![heard], cursor: 4 },
            &raw(json!({"action": "observe"})),
            Instant::now(),
        );
        assert_eq!(brain.conversation_cursor(), 4);
        let item = brain.memory().recent_observations().next().unwrap();
        assert_eq!(item.heard.len(), 1);
    }

    #[test]
    fn rewinding_the_conversation_keeps_memory() {
        let mut brain = brain();
        run_cycle(
            &mut brain,
            SensorySnapshot::at(Position::default(), 1.0),
            Inbox { entries: Vec::new(), cursor: 3 },
            &raw(json!({"action": "observe"})),
            Instant::now(),
        );
        brain.rewind_conversation();
        assert_eq!(brain.conversation_cursor(), 0);
        assert_eq!(brain.brain_view().action_memory_count, 1);
        assert!(brain.cooldown_decision(Instant::now()).is_some());
    }

    #[test]
    fn memory_is_capped() {
        let mut brain = brain();
        let start = Instant::now();
        for i in 0..5_u32 {
            run_cycle(
                &mut brain,
                SensorySnapshot::at(Position::default(), f64::from(i)),
                Inbox::default(),
                &raw(json!({"action": "idle"})),
                start + Duration::from_secs(u64::from(i) * 2),
            );
        }
        assert_eq!(brain.brain_view().action_memory_count, 3);
        assert_eq!(brain.brain_view().observation_memory_count, 3);
    }

    #[test]
    fn reset_twice_equals_reset_once() {
        let mut brain = brain();
        run_cycle(
            &mut brain,
            SensorySnapshot::at(Position::new(3.0, 3.0), 1.0),
            Inbox { entries: Vec::new(), cursor: 2 },
            &raw(json!({"action": "say", "utterance": "hi"})),
            Instant::now(),
        );
        brain.reset();
        let once = (brain.state_view(), brain.brain_view(), brain.conversation_cursor());
        brain.reset();
        let twice = (brain.state_view(), brain.brain_view(), brain.conversation_cursor());
        assert_eq!(once, twice);
        assert_eq!(once.0.position, Position::new(-2.0, 1.0));
        assert_eq!(once.1.action_memory_count, 0);
        assert_eq!(once.2, 0);
        assert!(brain.cooldown_decision(Instant::now()).is_none());
    }
}
