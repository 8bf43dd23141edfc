//! Error types for the brain crate.
//!
//! Only [`CoordinationError`] ever reaches callers of a decision cycle.
//! [`ClientError`] is recovered inside the decision client by falling back
//! to a rule-based decision. [`ConfigError`], [`PromptError`] and
//! [`PipelineError`] are startup failures.

/// Failures of a single model call.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The endpoint was unreachable or the connection broke.
    #[error("transport error: {0}")]
    Transport(String),

    /// The call did not finish within the configured deadline.
    #[error("model call timed out after {0} ms")]
    Timeout(u128),

    /// The endpoint answered with a non-success HTTP status.
    #[error("model endpoint returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnosis.
        body: String,
    },

    /// The response could not be turned into a decision object.
    #[error("malformed model output: {reason}")]
    MalformedOutput {
        /// What was wrong with it.
        reason: String,
        /// The offending payload, verbatim.
        raw: String,
    },
}

/// Errors surfaced by the coordination service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinationError {
    /// No brain is registered under the given id.
    #[error("agent not found: {0}")]
    UnknownAgent(String),

    /// A brain with the same id or name is already registered.
    #[error("agent already registered: {0}")]
    DuplicateAgent(String),
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but violates a constraint.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Errors raised while loading or rendering prompt templates.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// A template file could not be read.
    #[error("failed to read template {path}: {source}")]
    Io {
        /// Path of the template file.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A template failed to compile or render.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// Failure to assemble the decision pipeline at startup.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Prompt templates could not be loaded.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// The model client could not be built.
    #[error(transparent)]
    Client(#[from] ClientError),
}
