use std::time::Duration;

use async_trait::async_trait;
use labace_core::{ChatMessage, LLMProvider, LLMResponse, Usage};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::info;

use crate::{DEFAULT_TIMEOUT, build_client, token_count};

pub const DEFAULT_MODEL: &str = "gpt-oss:20b";
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/chat";

/// Local backend for an Ollama-style `/api/chat` endpoint.
pub struct OllamaProvider {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaProvider {
    pub fn new() -> anyhow::Result<Self> {
        info!("Creating OllamaProvider");
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
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
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        parse_response(&response)
    }
}

fn build_request(model: &str, messages: &[ChatMessage], temperature: f32) -> Value {
    json!({
        "model": model,
        "messages": messages,
        "stream": false,
        "options": {"temperature": temperature},
    })
}

fn parse_response(response: &Value) -> anyhow::Result<LLMResponse> {
    let content = response["message"]["content"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid response format: missing message content"))?
        .to_string();

    let usage = response.get("eval_count").map(|eval| {
        let prompt_tokens = token_count(&response["prompt_eval_count"]);
        let completion_tokens = token_count(eval);
        Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    });

    Ok(LLMResponse { content, usage })
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> anyhow::Result<LLMResponse> {
        let request = build_request(&self.model, messages, temperature);

        info!(
            "Sending request to {}: model={}, temperature={temperature}",
            self.endpoint, self.model
        );
        let response = self.try_send(&request).await?;
        info!("Received response from local model");

        Ok(response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
