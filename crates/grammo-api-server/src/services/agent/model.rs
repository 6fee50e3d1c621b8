use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;
use crate::models::chat::ChatMessage;

/// Remote language model capability.
///
/// The agent only needs a single blocking-style completion; swapping the
/// implementation is how tests run without network access.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: usize,
    temperature: f32,
    stream: bool,
    response_format: Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client for the hosted endpoint
#[derive(Clone)]
pub struct HostedChatModel {
    client: Client,
    config: LlmConfig,
}

impl HostedChatModel {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl ChatModel for HostedChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!("Calling {} with {} messages", self.config.model, messages.len());

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: false,
            response_format: response_schema(),
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to call LLM API: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("LLM API error: {} - {}", status, body));
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse LLM response: {}", e))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| anyhow!("No choices returned from LLM"))
    }
}

/// JSON schema the endpoint is asked to honour for every reply.
fn response_schema() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "Response",
            "schema": {
                "type": "object",
                "properties": {
                    "original": { "type": "string", "description": "The original text" },
                    "task_type": {
                        "type": "string",
                        "enum": ["translation", "correction", "follow-up", "invalid"],
                        "description": "The type of task performed"
                    },
                    "output": { "type": "string", "description": "The translated or corrected text" },
                    "explanation": { "type": "string", "description": "Explanation of the translation or correction" }
                },
                "required": ["task_type", "output"]
            }
        }
    })
}
