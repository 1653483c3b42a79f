//! OpenAI-compatible completion client
//!
//! `POST {base_url}/chat/completions` with a system and a user message.
//! Every failure, including an empty answer, becomes `ChatError::Upstream`.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::domain::repository::CompletionClient;
use crate::error::{ChatError, ChatResult};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

pub struct OpenAiCompletionClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiCompletionClient {
    pub fn new(config: OpenAiConfig) -> ChatResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChatError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [RequestMessage<'a>; 2],
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// First choice's content, if it has any visible text
fn extract_reply(response: CompletionResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> ChatResult<String> {
        let body = CompletionRequest {
            model: &self.config.model,
            messages: [
                RequestMessage {
                    role: "system",
                    content: system_prompt,
                },
                RequestMessage {
                    role: "user",
                    content: user_message,
                },
            ],
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Upstream(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ChatError::Upstream(format!(
                "status {status}: {}",
                detail.chars().take(500).collect::<String>()
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Upstream(format!("invalid response body: {e}")))?;

        let reply = extract_reply(parsed)
            .ok_or_else(|| ChatError::Upstream("completion returned no content".into()))?;

        tracing::debug!(model = %self.config.model, reply_chars = reply.chars().count(), "Completion received");
        Ok(reply)
    }
}
