//! Agent decision engine and brain coordination.
//!
//! Each agent owns an [`AgentBrain`]. On every decision request the brain
//! turns the world's sensory snapshot and its own memory into a prompt,
//! asks a language model for one action, repairs whatever comes back into a
//! valid [`Decision`](agora_types::Decision) and remembers it. The
//! [`CoordinationService`] owns all brains and handles the lifecycle
//! (activate, deactivate, reset), action-completion reports and the
//! agent-to-agent conversation logs.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides
//! - [`error`] -- Error types
//! - [`memory`] -- Bounded action and observation memory
//! - [`prompt`] -- System and user prompt rendering
//! - [`llm`] -- Model client: tool calls, JSON content, fallback dispatch
//! - [`parse`] -- Recovery of JSON decisions from free text
//! - [`validation`] -- Repair of raw decisions
//! - [`fallback`] -- Rule-based decisions when the model is unavailable
//! - [`conversation`] -- Per-agent conversation logs
//! - [`brain`] -- The per-agent decision cycle
//! - [`coordination`] -- Registry and lifecycle of every brain

pub mod brain;
pub mod config;
pub mod conversation;
pub mod coordination;
pub mod error;
pub mod fallback;
pub mod llm;
pub mod memory;
pub mod parse;
pub mod prompt;
pub mod validation;

pub use brain::{AgentBrain, PendingCycle};
pub use config::{
    AgentProfile, AgoraConfig, BrainConfig, LlmConfig, PromptConfig, ServerConfig, ToolChoice,
};
pub use conversation::{ConversationBook, Inbox};
pub use coordination::{AgentListing, CoordinationService, DecisionPipeline};
pub use error::{ClientError, ConfigError, CoordinationError, PipelineError, PromptError};
pub use fallback::DecisionSource;
pub use llm::{ClientDecision, DecisionClient, DecisionRequest, ModelOutcome};
pub use memory::MemoryStore;
pub use prompt::{PromptComposer, PromptContext};
pub use validation::DecisionValidator;
