//! Send Message Use Case
//!
//! Validate, admit, complete, then count. Only a non-empty reply is counted,
//! and a failure to persist the count never hides the reply from the user.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use platform::rate_limit::LimiterChain;

use crate::application::config::ChatConfig;
use crate::application::system_prompt::SystemPromptCache;
use crate::application::usage_counter::UsageCounter;
use crate::domain::repository::{CompletionClient, UsageStore};
use crate::domain::value_objects::ChatMessage;
use crate::error::{ChatError, ChatResult};

/// Input DTO for send message
#[derive(Debug, Clone)]
pub struct SendMessageInput {
    /// Raw message as received, possibly absent
    pub message: Option<String>,
    /// Rate-limit identity of the caller
    pub caller: String,
}

/// Output DTO for send message
#[derive(Debug, Clone)]
pub struct SendMessageOutput {
    pub reply: String,
    /// New window total, `None` when the increment could not be persisted
    pub prompts_in_window: Option<u64>,
}

/// Send Message Use Case
pub struct SendMessageUseCase<C, S>
where
    C: CompletionClient,
    S: UsageStore,
{
    client: Arc<C>,
    counter: Arc<UsageCounter<S>>,
    limiters: Arc<LimiterChain>,
    system_prompt: Arc<SystemPromptCache>,
    config: Arc<ChatConfig>,
}

impl<C, S> SendMessageUseCase<C, S>
where
    C: CompletionClient + Send + Sync,
    S: UsageStore + Send + Sync,
{
    pub fn new(
        client: Arc<C>,
        counter: Arc<UsageCounter<S>>,
        limiters: Arc<LimiterChain>,
        system_prompt: Arc<SystemPromptCache>,
        config: Arc<ChatConfig>,
    ) -> Self {
        Self {
            client,
            counter,
            limiters,
            system_prompt,
            config,
        }
    }

    pub async fn execute(
        &self,
        input: SendMessageInput,
        now: DateTime<Utc>,
    ) -> ChatResult<SendMessageOutput> {
        let message = ChatMessage::parse(input.message.as_deref(), self.config.max_message_chars)?;

        self.limiters.check(&input.caller, now.timestamp_millis())?;

        let system_prompt = self.system_prompt.get(Instant::now()).await;
        let reply = self
            .client
            .complete(&system_prompt, message.as_str())
            .await?;
        if reply.trim().is_empty() {
            return Err(ChatError::Upstream("completion returned no content".into()));
        }

        let prompts_in_window = match self.counter.increment(now).await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::error!(error = %e, "Failed to record chat usage");
                None
            }
        };

        tracing::info!(
            caller = %input.caller,
            message_chars = message.as_str().chars().count(),
            prompts_in_window = ?prompts_in_window,
            "Chat reply sent"
        );

        Ok(SendMessageOutput {
            reply,
            prompts_in_window,
        })
    }
}
