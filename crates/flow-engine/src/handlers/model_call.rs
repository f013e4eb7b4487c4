//! Model call handler: chat completions against a language model provider
//!
//! In [`ExecutionMode::Simulation`] no request is made; the handler waits for
//! the configured latency and returns a deterministic placeholder so graphs
//! can be exercised without credentials.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_config, NodeHandler, NodeRecorder};
use crate::config::ExecutionMode;
use crate::context::ExecutionContext;
use crate::error::{FlowError, Result};
use crate::evaluator::interpolate_variables;
use crate::result::NodeExecutionResult;
use crate::types::GraphNode;

const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1000;
const SIMULATED_COMPLETION_TOKENS: u64 = 50;
const PROMPT_PREVIEW_CHARS: usize = 100;

/// Language model vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    #[default]
    Openai,
    Anthropic,
    Azure,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProvider::Openai => "openai",
            ModelProvider::Anthropic => "anthropic",
            ModelProvider::Azure => "azure",
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a model call node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ModelProvider,
    pub model: String,
    /// May contain `{{variable}}` placeholders
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ModelConfig {
    pub fn temperature(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Invokes a language model, or simulates one
pub struct ModelCallHandler {
    client: reqwest::Client,
}

impl ModelCallHandler {
    /// Create a handler whose live requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Create a handler around an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn run(
        &self,
        node: &GraphNode,
        context: &ExecutionContext,
        recorder: &mut NodeRecorder,
    ) -> Result<Value> {
        let config: ModelConfig = parse_config(node)?;
        if config.model.trim().is_empty() {
            return Err(FlowError::invalid_config(&node.id, "model is required"));
        }

        let prompt = interpolate_variables(&config.prompt, context.variables());
        recorder.log(format!("Calling {} model: {}", config.provider, config.model));

        match context.config().mode {
            ExecutionMode::Simulation => {
                recorder.log("Running in simulation mode");
                tokio::time::sleep(context.config().simulated_latency()).await;
                Ok(simulated_output(&config, &prompt))
            }
            ExecutionMode::Live => {
                let api_key = context
                    .config()
                    .api_key(config.provider.as_str())
                    .ok_or_else(|| FlowError::MissingCredential(config.provider.to_string()))?;
                match config.provider {
                    ModelProvider::Openai => {
                        let base_url = context.config().openai_base_url.trim_end_matches('/');
                        self.openai_chat(base_url, api_key, &config, &prompt, recorder)
                            .await
                    }
                    other => Err(FlowError::Provider(format!("Provider {} not implemented", other))),
                }
            }
        }
    }

    async fn openai_chat(
        &self,
        base_url: &str,
        api_key: &str,
        config: &ModelConfig,
        prompt: &str,
        recorder: &mut NodeRecorder,
    ) -> Result<Value> {
        let url = format!("{}/chat/completions", base_url);
        let request_body = json!({
            "model": config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": config.temperature(),
            "max_tokens": config.max_tokens(),
        });

        log::debug!("Sending chat completion to {} with model '{}'", url, config.model);

        let http_response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await?;

        if !http_response.status().is_success() {
            let status = http_response.status();
            let error_body = http_response.text().await.unwrap_or_default();
            return Err(FlowError::Provider(format!(
                "{} API error ({}): {}",
                config.provider, status, error_body
            )));
        }

        let completion: ChatCompletion = http_response
            .json()
            .await
            .map_err(|e| FlowError::Provider(format!("Failed to parse {} response: {}", config.provider, e)))?;

        let response = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        recorder.log(format!("Received {} chars from {}", response.chars().count(), config.model));

        Ok(json!({
            "response": response,
            "model": config.model,
            "provider": config.provider,
            "usage": completion.usage.unwrap_or(Value::Null),
        }))
    }
}

fn simulated_output(config: &ModelConfig, prompt: &str) -> Value {
    let preview: String = prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();
    let prompt_tokens = (prompt.chars().count() / 4) as u64;
    json!({
        "response": format!(
            "[SIMULATED RESPONSE]\n\nThis is a simulated response from {}.\n\nPrompt received: {}...",
            config.model, preview
        ),
        "model": config.model,
        "provider": config.provider,
        "usage": {
            "prompt_tokens": prompt_tokens,
            "completion_tokens": SIMULATED_COMPLETION_TOKENS,
            "total_tokens": prompt_tokens + SIMULATED_COMPLETION_TOKENS,
        },
    })
}

#[async_trait]
impl NodeHandler for ModelCallHandler {
    async fn execute(&self, node: &GraphNode, context: &ExecutionContext) -> NodeExecutionResult {
        let mut recorder = NodeRecorder::start(node);
        let outcome = self.run(node, context, &mut recorder).await;
        recorder.finish(outcome)
    }
}
