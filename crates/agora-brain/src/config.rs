//! Configuration loading and typed config structures for the agent brains.
//!
//! The configuration lives in `agora-config.yaml` at the project root (the
//! path can be changed with `AGORA_CONFIG`). Every section and field has a
//! default, so an empty or missing file yields a runnable setup with two
//! agents. Model endpoint settings and the listen address can be overridden
//! from the environment.

use std::collections::BTreeSet;
use std::path::Path;

use agora_types::{Position, WORLD_BOUND};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::ConfigError;
use crate::validation::MIN_UTTERANCE_CHARS;

/// Colors the world front-end knows how to render.
pub const VALID_COLORS: &[&str] = &["red", "blue", "green", "yellow", "purple", "orange", "gray"];

/// Top-level configuration.
///
/// Mirrors the structure of `agora-config.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgoraConfig {
    /// HTTP listen address.
    #[serde(default)]
    pub server: ServerConfig,

    /// Model endpoint settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Decision cycle tuning.
    #[serde(default)]
    pub brain: BrainConfig,

    /// Prompt boilerplate and template overrides.
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Static agent roster.
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentProfile>,
}

impl Default for AgoraConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            brain: BrainConfig::default(),
            prompt: PromptConfig::default(),
            agents: default_agents(),
        }
    }
}

impl AgoraConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override the file:
    /// - `LLM_BASE_URL`, `LLM_MODEL`, `LLM_API_KEY` override `llm.*`
    /// - `AGORA_HOST`, `AGORA_PORT` override `server.*`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if the result fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Like [`AgoraConfig::from_file`], but a missing file yields the
    /// defaults (with environment overrides applied).
    ///
    /// # Errors
    ///
    /// Same as [`AgoraConfig::from_file`] for a file that exists.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }
        let mut config = Self::default();
        config.apply_env_overrides();
        config.check()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if the result fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to an empty mapping.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        config.check()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.llm.apply_env_overrides();
        self.server.apply_env_overrides();
    }

    /// Validate cross-field constraints and every agent profile.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.agents.is_empty() {
            return Err(ConfigError::Invalid("at least one agent is required".to_owned()));
        }
        if self.brain.memory_capacity == 0 {
            return Err(ConfigError::Invalid("brain.memory_capacity must be positive".to_owned()));
        }
        if !(self.brain.world_bound.is_finite() && self.brain.world_bound > 0.0) {
            return Err(ConfigError::Invalid("brain.world_bound must be positive".to_owned()));
        }
        if self.brain.max_utterance_chars < MIN_UTTERANCE_CHARS {
            return Err(ConfigError::Invalid(format!(
                "brain.max_utterance_chars must be at least {MIN_UTTERANCE_CHARS}"
            )));
        }
        if self.llm.max_concurrent_calls == 0 {
            return Err(ConfigError::Invalid(
                "llm.max_concurrent_calls must be positive".to_owned(),
            ));
        }

        let mut ids = BTreeSet::new();
        let mut names = BTreeSet::new();
        for agent in &self.agents {
            agent
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("agent {}: {e}", agent.id)))?;
            if !ids.insert(agent.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate agent id: {}", agent.id)));
            }
            if !names.insert(agent.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate agent name: {}", agent.name)));
            }
            if !agent.position.within(self.brain.world_bound) {
                return Err(ConfigError::Invalid(format!(
                    "agent {} starts outside the world at {}",
                    agent.id, agent.position
                )));
            }
        }
        Ok(())
    }
}

/// HTTP listen address for the brain API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    /// Override the listen address with `AGORA_HOST` / `AGORA_PORT` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AGORA_HOST") {
            self.host = val;
        }
        if let Some(port) = std::env::var("AGORA_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
        {
            self.port = port;
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// How the model is asked to use the declared tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides whether to call a tool.
    Auto,
    /// The model must call one of the tools.
    #[default]
    Required,
    /// Tools are not declared at all; the model answers in JSON text.
    None,
}

impl ToolChoice {
    /// Value of the `tool_choice` request field.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Required => "required",
            Self::None => "none",
        }
    }
}

/// OpenAI-compatible model endpoint settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LlmConfig {
    /// Base URL; requests go to `{base_url}/chat/completions`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier sent with each request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Bearer token. No `Authorization` header is sent when unset.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Tool-calling mode.
    #[serde(default)]
    pub tool_choice: ToolChoice,

    /// Per-call deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of model calls in flight across all agents.
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Completion token limit.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl LlmConfig {
    /// Override endpoint settings with `LLM_BASE_URL`, `LLM_MODEL` and
    /// `LLM_API_KEY` when set. An empty `LLM_API_KEY` clears the key.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LLM_BASE_URL") {
            self.base_url = val;
        }
        if let Ok(val) = std::env::var("LLM_MODEL") {
            self.model = val;
        }
        if let Ok(val) = std::env::var("LLM_API_KEY") {
            self.api_key = Some(val).filter(|k| !k.trim().is_empty());
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            tool_choice: ToolChoice::default(),
            timeout_ms: default_timeout_ms(),
            max_concurrent_calls: default_max_concurrent_calls(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Decision cycle tuning shared by every brain.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BrainConfig {
    /// Minimum time between two model-backed decisions of one agent.
    #[serde(default = "default_decision_interval_ms")]
    pub decision_interval_ms: u64,

    /// Capacity of each memory channel.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,

    /// Half-width of the square world.
    #[serde(default = "default_world_bound")]
    pub world_bound: f64,

    /// Longest utterance kept verbatim.
    #[serde(default = "default_max_utterance_chars")]
    pub max_utterance_chars: usize,

    /// How long (simulation seconds) an utterance stays on screen.
    #[serde(default = "default_utterance_display_secs")]
    pub utterance_display_secs: f64,

    /// Largest per-axis offset of a synthesized move target.
    #[serde(default = "default_move_jitter")]
    pub move_jitter: f64,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            decision_interval_ms: default_decision_interval_ms(),
            memory_capacity: default_memory_capacity(),
            world_bound: default_world_bound(),
            max_utterance_chars: default_max_utterance_chars(),
            utterance_display_secs: default_utterance_display_secs(),
            move_jitter: default_move_jitter(),
        }
    }
}

/// Prompt boilerplate and template overrides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PromptConfig {
    /// Description of the world appended to every system prompt.
    #[serde(default = "default_environment_context")]
    pub environment_context: String,

    /// Instructions on how to answer, appended after the environment.
    #[serde(default = "default_response_format")]
    pub response_format: String,

    /// Directory holding `user.j2` / `system.j2` overrides.
    #[serde(default)]
    pub templates_dir: Option<String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            environment_context: default_environment_context(),
            response_format: default_response_format(),
            templates_dir: None,
        }
    }
}

/// Static description of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AgentProfile {
    /// Stable identifier used in routes (e.g. `agent1`).
    #[validate(length(min = 1, max = 64))]
    pub id: String,

    /// Display name other agents address.
    #[validate(length(min = 1, max = 64))]
    pub name: String,

    /// Personality description woven into the system prompt.
    #[validate(length(min = 1))]
    pub personality: String,

    /// Render color.
    #[serde(default = "default_color")]
    #[validate(custom(function = "validate_color"))]
    pub color: String,

    /// Starting position, restored on reset.
    pub position: Position,
}

fn validate_color(color: &str) -> Result<(), ValidationError> {
    if VALID_COLORS.contains(&color) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_color"))
    }
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    5001
}

fn default_base_url() -> String {
    "http://127.0.0.1:1234/v1".to_owned()
}

fn default_model() -> String {
    "openai/gpt-oss-20b".to_owned()
}

const fn default_timeout_ms() -> u64 {
    10_000
}

const fn default_max_concurrent_calls() -> usize {
    10
}

const fn default_temperature() -> f64 {
    0.7
}

const fn default_max_tokens() -> u32 {
    500
}

const fn default_decision_interval_ms() -> u64 {
    5_000
}

const fn default_memory_capacity() -> usize {
    50
}

const fn default_world_bound() -> f64 {
    WORLD_BOUND
}

const fn default_max_utterance_chars() -> usize {
    200
}

const fn default_utterance_display_secs() -> f64 {
    5.0
}

const fn default_move_jitter() -> f64 {
    2.0
}

fn default_color() -> String {
    "gray".to_owned()
}

fn default_environment_context() -> String {
    "ENVIRONMENT: You live in a small square world that spans from -4 to 4 on both \
     the x and z axes. Gold coins are scattered around the world and everyone is \
     trying to collect them. You can see the agents and coins close to you, and \
     you can hear what nearby agents say."
        .to_owned()
}

fn default_response_format() -> String {
    "RESPONSE FORMAT: Choose exactly one action per turn by calling one of the \
     provided functions: move(x, z) to walk somewhere, text(agent, message) to \
     talk to another agent (keep messages short), idle() to rest, or observe() \
     to look around. If you cannot call functions, reply with only a JSON object \
     such as {\"action\": \"move\", \"target\": {\"x\": 1.0, \"z\": -2.0}, \
     \"utterance\": null}."
        .to_owned()
}

fn default_agents() -> Vec<AgentProfile> {
    vec![
        AgentProfile {
            id: "agent1".to_owned(),
            name: "Alice".to_owned(),
            personality: "Creative and artistic".to_owned(),
            color: "red".to_owned(),
            position: Position::new(-2.0, 1.0),
        },
        AgentProfile {
            id: "agent2".to_owned(),
            name: "Bob".to_owned(),
            personality: "Logical and analytical".to_owned(),
            color: "blue".to_owned(),
            position: Position::new(2.0, 1.0),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AgoraConfig::default();
        assert!(config.check().is_ok());
        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.brain.memory_capacity, 50);
        assert_eq!(config.brain.decision_interval_ms, 5_000);
        assert_eq!(config.llm.max_concurrent_calls, 10);
        assert_eq!(config.llm.tool_choice, ToolChoice::Required);
    }

    #[test]
    fn parse_empty_yaml() {
        let config = AgoraConfig::parse("");
        assert!(config.is_ok());
    }

    #[test]
    fn parse_partial_yaml_keeps_defaults() {
        let yaml = "brain:\n  memory_capacity: 8\nllm:\n  tool_choice: auto\n";
        let config = AgoraConfig::parse(yaml).unwrap_or_default();
        assert_eq!(config.brain.memory_capacity, 8);
        assert_eq!(config.llm.tool_choice, ToolChoice::Auto);
        assert_eq!(config.brain.max_utterance_chars, 200);
        assert_eq!(config.agents.len(), 2);
    }

    #[test]
    fn parse_custom_roster() {
        let yaml = r"
agents:
  - id: scout
    name: Carol
    personality: Curious and restless
    color: green
    position: { x: 0.0, z: -3.5 }
";
        let config = AgoraConfig::parse(yaml).unwrap_or_default();
        assert_eq!(config.agents.len(), 1);
        assert_eq!(config.agents.first().map(|a| a.name.as_str()), Some("Carol"));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let yaml = r"
agents:
  - { id: a, name: Ann, personality: calm, position: { x: 0, z: 0 } }
  - { id: a, name: Ben, personality: calm, position: { x: 1, z: 0 } }
";
        assert!(matches!(AgoraConfig::parse(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_empty_personality_and_unknown_color() {
        let yaml = "agents:\n  - { id: a, name: Ann, personality: '', position: { x: 0, z: 0 } }\n";
        assert!(matches!(AgoraConfig::parse(yaml), Err(ConfigError::Invalid(_))));

        let yaml = "agents:\n  - { id: a, name: Ann, personality: calm, color: teal, \
                    position: { x: 0, z: 0 } }\n";
        assert!(matches!(AgoraConfig::parse(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_start_outside_world() {
        let yaml = "agents:\n  - { id: a, name: Ann, personality: calm, \
                    position: { x: 9, z: 0 } }\n";
        assert!(matches!(AgoraConfig::parse(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_utterance_cap_below_truncation_marker() {
        assert!(matches!(
            AgoraConfig::parse("brain:\n  max_utterance_chars: 2\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(AgoraConfig::parse("brain:\n  max_utterance_chars: 3\n").is_ok());
    }

    #[test]
    fn invalid_yaml_is_a_yaml_error() {
        assert!(matches!(
            AgoraConfig::parse("brain: [unclosed"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!(
            "agora_missing_config_{}.yaml",
            std::process::id()
        ));
        let config = AgoraConfig::load_or_default(&path);
        assert!(config.is_ok());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("agora-config.yaml");
        if path.exists() {
            let config = AgoraConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
