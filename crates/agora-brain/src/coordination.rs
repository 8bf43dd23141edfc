//! The coordination service: registry and lifecycle of every brain.
//!
//! One [`CoordinationService`] is constructed at startup and shared by the
//! HTTP layer. It indexes:
//!
//! - the global active flag (brains start inactive);
//! - one [`AgentBrain`] per registered agent;
//! - the [`ConversationBook`].
//!
//! Brains are built elsewhere and handed over with
//! [`CoordinationService::register`]; [`CoordinationService::from_config`]
//! does that for every configured agent.
//!
//! # Locking
//!
//! The registry sits behind one `RwLock`. Decision cycles, completion
//! reports and read views take it shared, and only for short steps: a
//! decision cycle drops it while the model is thinking. Lifecycle and
//! registration take it exclusive.
//!
//! Each brain has a decision gate that serializes its cycles and a state
//! mutex that is only held briefly. The conversation book has its own mutex.
//! Lock order is gate, registry, brain state, book.
//!
//! Every `reset` bumps the registry epoch. A cycle whose model call straddled
//! a reset is discarded instead of committed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use agora_types::{
    AgentTarget, BrainState, BrainStateView, ConversationEntry, Decision, Position,
    SensorySnapshot, SimulationState,
};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::brain::AgentBrain;
use crate::config::{AgentProfile, AgoraConfig};
use crate::conversation::ConversationBook;
use crate::error::{CoordinationError, PipelineError, PromptError};
use crate::llm::DecisionClient;
use crate::prompt::PromptComposer;
use crate::validation::DecisionValidator;

/// Recipient recorded for a `say` with no addressee and nobody in sight.
const EVERYONE: &str = "everyone";

/// The shared machinery every brain uses to decide.
#[derive(Debug)]
pub struct DecisionPipeline {
    /// Renders prompts.
    pub composer: PromptComposer,
    /// Calls the model.
    pub client: DecisionClient,
    /// Repairs raw decisions.
    pub validator: DecisionValidator,
}

impl DecisionPipeline {
    /// Build the composer, client and validator from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the templates or the HTTP client cannot
    /// be set up.
    pub fn from_config(config: &AgoraConfig) -> Result<Self, PipelineError> {
        let validator = DecisionValidator::from_config(&config.brain);
        Ok(Self {
            composer: PromptComposer::from_config(&config.prompt)?,
            client: DecisionClient::new(&config.llm, validator)?,
            validator,
        })
    }
}

/// One agent as listed by [`CoordinationService::agents`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentListing {
    /// The agent's static description.
    #[serde(flatten)]
    pub profile: AgentProfile,
    /// The rendered system prompt its brain decides with.
    pub system_prompt: String,
}

#[derive(Debug)]
struct BrainSlot {
    gate: Mutex<()>,
    brain: Mutex<AgentBrain>,
}

#[derive(Debug)]
struct Registry {
    brains_active: bool,
    epoch: u64,
    brains: BTreeMap<String, Arc<BrainSlot>>,
    ids_by_name: BTreeMap<String, String>,
    conversations: Mutex<ConversationBook>,
}

impl Registry {
    fn empty() -> Self {
        Self {
            brains_active: false,
            epoch: 0,
            brains: BTreeMap::new(),
            ids_by_name: BTreeMap::new(),
            conversations: Mutex::new(ConversationBook::default()),
        }
    }

    fn slot(&self, agent_id: &str) -> Result<&Arc<BrainSlot>, CoordinationError> {
        self.brains
            .get(agent_id)
            .ok_or_else(|| CoordinationError::UnknownAgent(agent_id.to_owned()))
    }

    /// Whether `slot` is still the brain registered under `agent_id`.
    fn holds(&self, agent_id: &str, slot: &Arc<BrainSlot>) -> bool {
        self.brains
            .get(agent_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    fn insert(&mut self, brain: AgentBrain) -> Result<(), CoordinationError> {
        let id = brain.profile().id.clone();
        let name_key = brain.profile().name.to_lowercase();
        if self.brains.contains_key(&id) {
            return Err(CoordinationError::DuplicateAgent(id));
        }
        if self.ids_by_name.contains_key(&name_key) {
            return Err(CoordinationError::DuplicateAgent(brain.profile().name.clone()));
        }

        self.conversations.get_mut().add_agent(&id);
        self.ids_by_name.insert(name_key, id.clone());
        self.brains.insert(
            id,
            Arc::new(BrainSlot {
                gate: Mutex::new(()),
                brain: Mutex::new(brain),
            }),
        );
        Ok(())
    }

    /// Append a fresh utterance to the speaker's log and each recipient's log.
    async fn deliver(
        &self,
        speaker_id: &str,
        speaker: &str,
        target: Option<&AgentTarget>,
        message: &str,
        nearby: &[String],
        simulation_time: f64,
    ) {
        let recipients: Vec<&str> = match target {
            Some(t) => vec![t.agent.as_str()],
            None if nearby.is_empty() => vec![EVERYONE],
            None => nearby.iter().map(String::as_str).collect(),
        };

        let mut book = self.conversations.lock().await;
        for recipient in recipients {
            let entry = ConversationEntry {
                speaker: speaker.to_owned(),
                recipient: recipient.to_owned(),
                message: message.to_owned(),
                simulation_time,
                timestamp: Utc::now(),
            };
            match self.ids_by_name.get(&recipient.to_lowercase()) {
                Some(recipient_id) if recipient_id != speaker_id => {
                    book.append(recipient_id, entry.clone());
                }
                Some(_) => {}
                None if recipient == EVERYONE => {}
                None => warn!(speaker_id, recipient, "utterance addressed to unknown agent"),
            }
            book.append(speaker_id, entry);
        }
        debug!(speaker_id, message, "utterance delivered");
    }
}

/// Registry and lifecycle manager for all agent brains.
#[derive(Debug)]
pub struct CoordinationService {
    registry: RwLock<Registry>,
    pipeline: DecisionPipeline,
}

impl CoordinationService {
    /// Create a service with no brains, initially inactive.
    pub fn new(pipeline: DecisionPipeline) -> Self {
        Self {
            registry: RwLock::new(Registry::empty()),
            pipeline,
        }
    }

    /// Create a service holding one brain per configured agent.
    ///
    /// Agents whose id or name repeats an earlier one are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] if a system prompt cannot be rendered.
    pub fn from_config(
        config: &AgoraConfig,
        pipeline: DecisionPipeline,
    ) -> Result<Self, PromptError> {
        let mut registry = Registry::empty();
        for profile in &config.agents {
            let system_prompt =
                pipeline
                    .composer
                    .system_prompt(profile, &config.agents, &config.prompt)?;
            let brain = AgentBrain::new(profile.clone(), system_prompt, &config.brain);
            if let Err(e) = registry.insert(brain) {
                warn!(error = %e, "skipping agent");
            }
        }

        info!(agents = registry.brains.len(), "coordination service ready");

        Ok(Self {
            registry: RwLock::new(registry),
            pipeline,
        })
    }

    /// The shared decision machinery, for building brains to register.
    pub const fn pipeline(&self) -> &DecisionPipeline {
        &self.pipeline
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Start indexing `brain` and give it an empty conversation log.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::DuplicateAgent`] if a brain with the same
    /// id or (case-insensitive) name is already registered.
    pub async fn register(&self, brain: AgentBrain) -> Result<(), CoordinationError> {
        let agent_id = brain.profile().id.clone();
        self.registry.write().await.insert(brain)?;
        info!(agent_id, "brain registered");
        Ok(())
    }

    /// Stop indexing `agent_id`, dropping its brain and conversation log.
    ///
    /// A cycle still waiting on the model for that agent is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::UnknownAgent`] if no brain has that id.
    pub async fn remove(&self, agent_id: &str) -> Result<AgentProfile, CoordinationError> {
        let mut registry = self.registry.write().await;
        let slot = registry
            .brains
            .remove(agent_id)
            .ok_or_else(|| CoordinationError::UnknownAgent(agent_id.to_owned()))?;
        let profile = slot.brain.lock().await.profile().clone();
        let name_key = profile.name.to_lowercase();
        if registry.ids_by_name.get(&name_key).is_some_and(|id| id == agent_id) {
            registry.ids_by_name.remove(&name_key);
        }
        registry.conversations.get_mut().remove_agent(agent_id);
        info!(agent_id, "brain removed");
        Ok(profile)
    }

    /// Whether a brain is registered for `agent_id`.
    pub async fn has_agent(&self, agent_id: &str) -> bool {
        self.registry.read().await.brains.contains_key(agent_id)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Activate the brains. Returns `false` (and warns) if already active.
    pub async fn activate(&self) -> bool {
        let mut registry = self.registry.write().await;
        if registry.brains_active {
            warn!("brains already active");
            return false;
        }
        registry.brains_active = true;
        for (agent_id, slot) in &registry.brains {
            let brain = slot.brain.lock().await;
            info!(
                agent_id = agent_id.as_str(),
                name = brain.profile().name.as_str(),
                system_prompt = brain.system_prompt(),
                "brain activated"
            );
        }
        info!("brains active");
        true
    }

    /// Deactivate the brains. Always succeeds.
    ///
    /// Cycles already waiting on the model still commit.
    pub async fn deactivate(&self) {
        self.registry.write().await.brains_active = false;
        info!("brains inactive");
    }

    /// Deactivate and return every brain and conversation log to the
    /// configured starting state.
    pub async fn reset(&self) {
        let mut registry = self.registry.write().await;
        registry.brains_active = false;
        registry.epoch = registry.epoch.wrapping_add(1);
        for slot in registry.brains.values() {
            slot.brain.lock().await.reset();
        }
        registry.conversations.get_mut().clear();
        info!("brains reset");
    }

    /// Whether the brains are active.
    pub async fn is_active(&self) -> bool {
        self.registry.read().await.brains_active
    }

    // -----------------------------------------------------------------------
    // Decision cycle
    // -----------------------------------------------------------------------

    /// Run a decision cycle for `agent_id` on `snapshot`.
    ///
    /// Inactive brains answer `idle` without consulting the model; brains
    /// still cooling down repeat their previous decision. A fresh `say` is
    /// delivered to the conversation logs. A cycle overtaken by a reset
    /// answers `idle` and leaves no trace.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::UnknownAgent`] if no brain has that id,
    /// including when it is removed while the model is thinking.
    pub async fn decide(
        &self,
        agent_id: &str,
        snapshot: SensorySnapshot,
    ) -> Result<Decision, CoordinationError> {
        let slot = {
            let registry = self.registry.read().await;
            let slot = Arc::clone(registry.slot(agent_id)?);
            if !registry.brains_active {
                debug!(agent_id, "brains inactive, answering idle");
                return Ok(Decision::Idle);
            }
            slot
        };

        let _cycle = slot.gate.lock().await;
        let nearby: Vec<String> = snapshot
            .nearby_agents
            .iter()
            .map(|a| a.name.clone())
            .collect();

        let (pending, speaker, epoch) = {
            let registry = self.registry.read().await;
            if !registry.holds(agent_id, &slot) {
                return Err(CoordinationError::UnknownAgent(agent_id.to_owned()));
            }
            if !registry.brains_active {
                debug!(agent_id, "brains deactivated while queued, answering idle");
                return Ok(Decision::Idle);
            }
            let mut brain = slot.brain.lock().await;
            if let Some(previous) = brain.cooldown_decision(Instant::now()) {
                debug!(agent_id, "cooling down, repeating previous decision");
                return Ok(previous);
            }
            let speaker = brain.profile().name.clone();
            let inbox = registry.conversations.lock().await.inbox(
                agent_id,
                brain.conversation_cursor(),
                &speaker,
            );
            let pending = brain.prepare(snapshot, inbox, &self.pipeline.composer);
            (pending, speaker, registry.epoch)
        };

        let client_decision = match pending.request() {
            Some(request) => self.pipeline.client.decide(&request).await,
            None => self.pipeline.client.fallback(pending.snapshot()),
        };
        let simulation_time = pending.snapshot().simulation_time;

        let registry = self.registry.read().await;
        if registry.epoch != epoch {
            info!(agent_id, "brains reset while deciding, discarding the cycle");
            return Ok(Decision::Idle);
        }
        if !registry.holds(agent_id, &slot) {
            return Err(CoordinationError::UnknownAgent(agent_id.to_owned()));
        }

        let decision = slot.brain.lock().await.commit(
            pending,
            &client_decision,
            &self.pipeline.validator,
            Instant::now(),
        );

        if let Decision::Say { target, utterance } = &decision {
            registry
                .deliver(
                    agent_id,
                    &speaker,
                    target.as_ref(),
                    utterance,
                    &nearby,
                    simulation_time,
                )
                .await;
        }

        Ok(decision)
    }

    /// Apply the world's report that an action finished.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::UnknownAgent`] if no brain has that id.
    pub async fn report_action_completion(
        &self,
        agent_id: &str,
        action_type: &str,
        final_position: Option<Position>,
    ) -> Result<(), CoordinationError> {
        let registry = self.registry.read().await;
        registry
            .slot(agent_id)?
            .brain
            .lock()
            .await
            .report_completion(action_type, final_position);
        debug!(agent_id, action_type, "action completed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read views
    // -----------------------------------------------------------------------

    /// Per-agent render state plus the active flag.
    pub async fn simulation_state(&self) -> SimulationState {
        let registry = self.registry.read().await;
        let mut agents = Vec::with_capacity(registry.brains.len());
        for slot in registry.brains.values() {
            agents.push(slot.brain.lock().await.state_view());
        }
        SimulationState {
            agents,
            simulation_running: registry.brains_active,
        }
    }

    /// Per-agent memory summary plus the active flag.
    pub async fn brain_state(&self) -> BrainState {
        let registry = self.registry.read().await;
        let mut brains = BTreeMap::new();
        for (agent_id, slot) in &registry.brains {
            brains.insert(agent_id.clone(), slot.brain.lock().await.brain_view());
        }
        BrainState {
            brains,
            brains_active: registry.brains_active,
            timestamp: Utc::now(),
        }
    }

    /// Memory summary of one brain.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::UnknownAgent`] if no brain has that id.
    pub async fn brain(&self, agent_id: &str) -> Result<BrainStateView, CoordinationError> {
        let registry = self.registry.read().await;
        let view = registry.slot(agent_id)?.brain.lock().await.brain_view();
        Ok(view)
    }

    /// Every registered agent with its system prompt, keyed by id.
    pub async fn agents(&self) -> BTreeMap<String, AgentListing> {
        let registry = self.registry.read().await;
        let mut agents = BTreeMap::new();
        for (agent_id, slot) in &registry.brains {
            let brain = slot.brain.lock().await;
            agents.insert(
                agent_id.clone(),
                AgentListing {
                    profile: brain.profile().clone(),
                    system_prompt: brain.system_prompt().to_owned(),
                },
            );
        }
        agents
    }

    /// The conversation log of `agent_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::UnknownAgent`] if no brain has that id.
    pub async fn conversation(
        &self,
        agent_id: &str,
    ) -> Result<Vec<ConversationEntry>, CoordinationError> {
        let registry = self.registry.read().await;
        let book = registry.conversations.lock().await;
        book.log(agent_id)
            .map(<[ConversationEntry]>::to_vec)
            .ok_or_else(|| CoordinationError::UnknownAgent(agent_id.to_owned()))
    }

    /// Clear the conversation log of `agent_id` only; its brain starts
    /// reading the log from the beginning again.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::UnknownAgent`] if no brain has that id.
    pub async fn reset_conversation(&self, agent_id: &str) -> Result<(), CoordinationError> {
        let registry = self.registry.read().await;
        let slot = registry.slot(agent_id)?;
        slot.brain.lock().await.rewind_conversation();
        registry.conversations.lock().await.reset_agent(agent_id);
        info!(agent_id, "conversation reset");
        Ok(())
    }
}
