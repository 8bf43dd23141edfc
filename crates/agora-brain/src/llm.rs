//! Model invocation for decision cycles.
//!
//! The [`DecisionClient`] talks to an OpenAI-compatible chat completions
//! endpoint. A call can end three ways, captured by [`ModelOutcome`]:
//!
//! 1. the model called one of the declared tools (`move`, `text`, `idle`,
//!    `observe`), which maps 1:1 onto a raw decision;
//! 2. the model answered with text that parses as a JSON decision;
//! 3. the call failed (transport, status, timeout, unusable output).
//!
//! A single dispatcher turns the outcome into a [`ClientDecision`]; failures
//! are routed to the rule-based fallback, so [`DecisionClient::decide`]
//! always yields a decision.

use std::time::{Duration, Instant};

use agora_types::SensorySnapshot;
use serde_json::{Value, json};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::{LlmConfig, ToolChoice};
use crate::error::ClientError;
use crate::fallback::{DecisionSource, fallback_decision};
use crate::parse::parse_decision_content;
use crate::validation::DecisionValidator;

/// One decision request.
#[derive(Debug, Clone, Copy)]
pub struct DecisionRequest<'a> {
    /// Agent making the decision (for logging).
    pub agent_id: &'a str,
    /// Personality and roster prompt.
    pub system_prompt: &'a str,
    /// Per-cycle state prompt.
    pub user_prompt: &'a str,
    /// The snapshot the prompt was built from; drives the fallback.
    pub snapshot: &'a SensorySnapshot,
}

/// Raw decision object plus where it came from.
///
/// `raw` still has to go through the validator.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientDecision {
    /// Decision object in wire shape (possibly sloppy).
    pub raw: Value,
    /// Which path produced it.
    pub source: DecisionSource,
}

/// Result of one model call.
#[derive(Debug)]
pub enum ModelOutcome {
    /// The model called a tool; carries the mapped raw decision.
    ToolCall(Value),
    /// The model answered in text; carries the parsed JSON object.
    ContentParsed(Value),
    /// The call failed.
    Failed(ClientError),
}

/// Async client for decision requests.
#[derive(Debug)]
pub struct DecisionClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    tool_choice: ToolChoice,
    temperature: f64,
    max_tokens: u32,
    timeout: Duration,
    permits: Semaphore,
    validator: DecisionValidator,
}

impl DecisionClient {
    /// Create a client from the `llm` configuration section.
    ///
    /// `validator` supplies the world bound for tool descriptions and the
    /// jitter used by the fallback.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig, validator: DecisionValidator) -> Result<Self, ClientError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(config.max_concurrent_calls)
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            tool_choice: config.tool_choice,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout,
            permits: Semaphore::new(config.max_concurrent_calls.max(1)),
            validator,
        })
    }

    /// Ask the model for a decision. Never fails.
    pub async fn decide(&self, request: &DecisionRequest<'_>) -> ClientDecision {
        debug!(
            agent_id = request.agent_id,
            system_prompt = request.system_prompt,
            user_prompt = request.user_prompt,
            "sending decision prompt"
        );
        let started = Instant::now();
        let outcome = self.call_model(request).await;
        let latency_ms = started.elapsed().as_millis();
        self.dispatch(request.agent_id, request.snapshot, outcome, latency_ms)
    }

    /// Produce a rule-based decision without calling the model.
    pub fn fallback(&self, snapshot: &SensorySnapshot) -> ClientDecision {
        let mut rng = rand::rng();
        ClientDecision {
            raw: fallback_decision(snapshot, &self.validator, &mut rng),
            source: DecisionSource::Fallback,
        }
    }

    fn dispatch(
        &self,
        agent_id: &str,
        snapshot: &SensorySnapshot,
        outcome: ModelOutcome,
        latency_ms: u128,
    ) -> ClientDecision {
        let (raw, source) = match outcome {
            ModelOutcome::ToolCall(raw) => (raw, DecisionSource::ToolCall),
            ModelOutcome::ContentParsed(raw) => (raw, DecisionSource::Content),
            ModelOutcome::Failed(err) => {
                if let ClientError::MalformedOutput { raw, .. } = &err {
                    error!(
                        agent_id,
                        latency_ms,
                        error = %err,
                        raw_output = raw.as_str(),
                        "model output unusable, using fallback"
                    );
                } else {
                    warn!(
                        agent_id,
                        latency_ms,
                        error = %err,
                        "model call failed, using fallback"
                    );
                }
                return self.fallback(snapshot);
            }
        };
        info!(
            agent_id,
            source = source.as_str(),
            latency_ms,
            "model answered"
        );
        ClientDecision { raw, source }
    }

    async fn call_model(&self, request: &DecisionRequest<'_>) -> ModelOutcome {
        let attempt = async {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|e| ClientError::Transport(format!("call limiter closed: {e}")))?;
            self.send(request).await
        };
        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(body)) => interpret_completion(&body),
            Ok(Err(err)) => ModelOutcome::Failed(err),
            Err(_) => ModelOutcome::Failed(ClientError::Timeout(self.timeout.as_millis())),
        }
    }

    async fn send(&self, request: &DecisionRequest<'_>) -> Result<Value, ClientError> {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_prompt}
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        if self.tool_choice != ToolChoice::None
            && let Some(fields) = body.as_object_mut()
        {
            fields.insert("tools".to_owned(), tool_definitions(self.validator.bound()));
            fields.insert("tool_choice".to_owned(), json!(self.tool_choice.as_str()));
        }

        let mut builder = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(self.timeout.as_millis())
            } else {
                ClientError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(format!("failed to read response: {e}")))?;
        serde_json::from_str(&text).map_err(|e| ClientError::MalformedOutput {
            reason: format!("response is not JSON: {e}"),
            raw: text,
        })
    }
}

// ---------------------------------------------------------------------------
// Tool declarations
// ---------------------------------------------------------------------------

/// The `tools` array declared with every request.
pub fn tool_definitions(bound: f64) -> Value {
    json!([
        {
            "type": "function",
            "function": {
                "name": "move",
                "description": format!(
                    "Walk to a point in the world. \
                     Both coordinates must lie between {} and {bound}.",
                    -bound
                ),
                "parameters": {
                    "type": "object",
                    "properties": {
                        "x": {"type": "number", "description": "Target x coordinate"},
                        "z": {"type": "number", "description": "Target z coordinate"}
                    },
                    "required": ["x", "z"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "text",
                "description": "Send a short message to another agent.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "agent": {"type": "string", "description": "Name of the agent to talk to"},
                        "message": {"type": "string", "description": "What to say"}
                    },
                    "required": ["agent", "message"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "idle",
                "description": "Rest in place for a moment.",
                "parameters": {"type": "object", "properties": {}}
            }
        },
        {
            "type": "function",
            "function": {
                "name": "observe",
                "description": "Look around without acting.",
                "parameters": {"type": "object", "properties": {}}
            }
        }
    ])
}

// ---------------------------------------------------------------------------
// Response interpretation
// ---------------------------------------------------------------------------

/// Classify a chat completions response body.
///
/// A usable tool call wins; otherwise the text content is parsed; otherwise
/// the call counts as failed.
pub fn interpret_completion(body: &Value) -> ModelOutcome {
    let Some(message) = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
    else {
        return ModelOutcome::Failed(ClientError::MalformedOutput {
            reason: "response missing choices[0].message".to_owned(),
            raw: body.to_string(),
        });
    };

    let first_call = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .and_then(|calls| calls.first())
        .and_then(|call| call.get("function"));
    let tool_error = match first_call.map(|function| {
        let name = function.get("name").and_then(Value::as_str).unwrap_or_default();
        tool_call_to_decision(name, function.get("arguments"))
    }) {
        Some(Ok(raw)) => return ModelOutcome::ToolCall(raw),
        Some(Err(err)) => Some(err),
        None => None,
    };

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty());
    match (content, tool_error) {
        (Some(text), _) => match parse_decision_content(text) {
            Ok(raw) => ModelOutcome::ContentParsed(raw),
            Err(err) => ModelOutcome::Failed(err),
        },
        (None, Some(err)) => ModelOutcome::Failed(err),
        (None, None) => ModelOutcome::Failed(ClientError::MalformedOutput {
            reason: "response has neither a tool call nor content".to_owned(),
            raw: message.to_string(),
        }),
    }
}

/// Map a tool call onto a raw decision object.
///
/// Accepts the declared names and the aliases `move_to`, `say` and `say_to`.
///
/// # Errors
///
/// Returns [`ClientError::MalformedOutput`] for an unknown tool name or
/// arguments that are not a JSON object.
pub fn tool_call_to_decision(name: &str, arguments: Option<&Value>) -> Result<Value, ClientError> {
    let args = match arguments {
        None | Some(Value::Null) => json!({}),
        Some(Value::String(s)) if s.trim().is_empty() => json!({}),
        Some(Value::String(s)) => parse_decision_content(s)?,
        Some(other @ Value::Object(_)) => other.clone(),
        Some(other) => {
            return Err(ClientError::MalformedOutput {
                reason: format!("arguments of tool {name} are not an object"),
                raw: other.to_string(),
            });
        }
    };

    match name.trim().to_lowercase().as_str() {
        "move" | "move_to" => Ok(json!({
            "action": "move",
            "target": {
                "x": args.get("x").cloned().unwrap_or(Value::Null),
                "z": args.get("z").cloned().unwrap_or(Value::Null),
            },
            "utterance": null,
        })),
        "text" | "say" | "say_to" => {
            let recipient = args
                .get("agent")
                .or_else(|| args.get("target"))
                .cloned()
                .unwrap_or(Value::Null);
            let utterance = args
                .get("message")
                .or_else(|| args.get("utterance"))
                .cloned()
                .unwrap_or(Value::Null);
            Ok(json!({
                "action": "say",
                "target": match recipient {
                    Value::String(agent) => json!({"agent": agent}),
                    other => other,
                },
                "utterance": utterance,
            }))
        }
        "idle" => Ok(json!({"action": "idle", "target": null, "utterance": null})),
        "observe" => Ok(json!({"action": "observe", "target": null, "utterance": null})),
        other => Err(ClientError::MalformedOutput {
            reason: format!("unknown tool: {other}"),
            raw: args.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(message: &Value) -> Value {
        json!({"choices": [{"index": 0, "message": message, "finish_reason": "stop"}]})
    }

    fn tool_message(name: &str, arguments: &str) -> Value {
        json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": name, "arguments": arguments}
            }]
        })
    }

    #[test]
    fn move_tool_call_maps_to_move() {
        let outcome = interpret_completion(&chat(&tool_message("move", r#"{"x": 1.5, "z": -2}"#)));
        match outcome {
            ModelOutcome::ToolCall(raw) => {
                assert_eq!(raw["action"], "move");
                assert_eq!(raw["target"]["x"], 1.5);
                assert_eq!(raw["target"]["z"], -2);
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn text_tool_call_maps_to_say() {
        let outcome = interpret_completion(&chat(&tool_message(
            "text",
            r#"{"agent": "Bob", "message": "Race you to the coin!"}"#,
        )));
        match outcome {
            ModelOutcome::ToolCall(raw) => {
                assert_eq!(raw["action"], "say");
                assert_eq!(raw["target"]["agent"], "Bob");
                assert_eq!(raw["utterance"], "Race you to the coin!");
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn legacy_tool_names_are_accepted() {
        assert!(tool_call_to_decision("move_to", Some(&json!({"x": 0, "z": 0}))).is_ok());
        let say =
            tool_call_to_decision("say_to", Some(&json!({"agent": "Ann", "utterance": "hi"})));
        assert!(matches!(say, Ok(ref v) if v["utterance"] == "hi"));
        assert!(tool_call_to_decision("observe", None).is_ok());
        assert!(tool_call_to_decision("idle", Some(&json!(""))).is_ok());
    }

    #[test]
    fn unknown_tool_is_malformed() {
        assert!(matches!(
            tool_call_to_decision("dance", None),
            Err(ClientError::MalformedOutput { .. })
        ));
        assert!(tool_call_to_decision("move", Some(&json!([1, 2]))).is_err());
    }

    #[test]
    fn content_json_is_parsed() {
        let outcome = interpret_completion(&chat(&json!({
            "role": "assistant",
            "content":
                "```json\n{\"action\": \"observe\", \"target\": null, \"utterance\": null}\n```"
        })));
        assert!(matches!(outcome, ModelOutcome::ContentParsed(ref v) if v["action"] == "observe"));
    }

    #[test]
    fn unknown_tool_with_content_uses_content() {
        let mut message = tool_message("dance", "{}");
        if let Some(fields) = message.as_object_mut() {
            fields.insert("content".to_owned(), json!("{\"action\": \"idle\"}"));
        }
        let outcome = interpret_completion(&chat(&message));
        assert!(matches!(outcome, ModelOutcome::ContentParsed(_)));
    }

    #[test]
    fn empty_or_garbled_responses_fail() {
        assert!(matches!(
            interpret_completion(&json!({"error": "overloaded"})),
            ModelOutcome::Failed(ClientError::MalformedOutput { .. })
        ));
        assert!(matches!(
            interpret_completion(&chat(&json!({"role": "assistant", "content": ""}))),
            ModelOutcome::Failed(_)
        ));
        assert!(matches!(
            interpret_completion(&chat(&json!({"role": "assistant", "content": "I will wander."}))),
            ModelOutcome::Failed(ClientError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn tools_declare_the_four_actions() {
        let tools = tool_definitions(4.0);
        let names: Vec<&str> = tools
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|t| t["function"]["name"].as_str())
                    .collect()
            })
            .unwrap_or_default();
        assert_eq!(names, vec!["move", "text", "idle", "observe"]);
    }
}
