use std::time::Duration;

use async_trait::async_trait;
use labace_core::{ChatMessage, LLMProvider, LLMResponse, Role, Usage};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::info;

use crate::{DEFAULT_TIMEOUT, build_client, token_count};

pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8000;

/// Hosted backend speaking the Anthropic Messages API.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        info!("Creating AnthropicProvider");
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> anyhow::Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    async fn try_send(&self, request: &Value) -> anyhow::Result<LLMResponse> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        parse_response(&response)
    }
}

/// The Messages API takes the system instruction as a top-level field.
fn build_request(model: &str, messages: &[ChatMessage], temperature: f32) -> Value {
    let system = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let turns: Vec<&ChatMessage> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .collect();

    let mut request = json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "temperature": temperature,
        "messages": turns,
    });
    if !system.is_empty() {
        request["system"] = Value::String(system);
    }
    request
}

fn parse_response(response: &Value) -> anyhow::Result<LLMResponse> {
    let content = response["content"]
        .as_array()
        .and_then(|blocks| blocks.iter().find(|b| b["type"] == "text"))
        .and_then(|block| block["text"].as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid response format: missing text content"))?
        .to_string();

    let usage = response["usage"].as_object().map(|u| {
        let prompt_tokens = u.get("input_tokens").map_or(0, token_count);
        let completion_tokens = u.get("output_tokens").map_or(0, token_count);
        Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    });

    Ok(LLMResponse { content, usage })
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> anyhow::Result<LLMResponse> {
        let request = build_request(&self.model, messages, temperature);

        info!(
            "Sending request to Anthropic API: model={}, temperature={temperature}",
            self.model
        );
        let response = self.try_send(&request).await?;
        info!("Received response from Anthropic API");

        Ok(response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
