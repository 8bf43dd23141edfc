//! Brain server entry point for the Agora world.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `AGORA_CONFIG` (default `agora-config.yaml`)
//! 3. Build the decision pipeline and one brain per configured agent
//! 4. Serve the HTTP API until `Ctrl-C`
//!
//! If the brains cannot be built the server still starts, and every brain
//! route answers 500 so the world front-end sees a clear error.

use std::path::PathBuf;
use std::sync::Arc;

use agora_brain::{AgoraConfig, CoordinationService, DecisionPipeline};
use agora_server::{AppState, start_server};
use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "agora-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the server cannot
/// bind its address.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("agora-server starting");

    let config_path = std::env::var("AGORA_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = AgoraConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    info!(
        config = %config_path.display(),
        agents = config.agents.len(),
        model = config.llm.model,
        base_url = config.llm.base_url,
        tool_choice = config.llm.tool_choice.as_str(),
        decision_interval_ms = config.brain.decision_interval_ms,
        "configuration loaded"
    );

    let state = match build_service(&config) {
        Ok(service) => AppState::new(Arc::new(service)),
        Err(e) => {
            error!(error = %e, "brain service unavailable, serving errors");
            AppState::uninitialized()
        }
    };

    start_server(&config.server, Arc::new(state)).await?;

    Ok(())
}

fn build_service(config: &AgoraConfig) -> anyhow::Result<CoordinationService> {
    let pipeline = DecisionPipeline::from_config(config).context("building decision pipeline")?;
    let service =
        CoordinationService::from_config(config, pipeline).context("rendering system prompts")?;
    Ok(service)
}
