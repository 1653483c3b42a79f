//! HTTP Handlers

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use chrono::Utc;
use platform::client::caller_key;
use platform::rate_limit::LimiterChain;

use crate::application::check_health::CheckHealthUseCase;
use crate::application::config::ChatConfig;
use crate::application::send_message::{SendMessageInput, SendMessageUseCase};
use crate::application::system_prompt::SystemPromptCache;
use crate::application::usage_counter::UsageCounter;
use crate::domain::repository::{CompletionClient, UsageStore};
use crate::error::{ChatError, ChatResult};
use crate::presentation::dto::{ChatRequest, ChatResponse, HealthResponse};

/// Shared state for chat handlers
pub struct ChatAppState<C, S> {
    pub client: Arc<C>,
    pub counter: Arc<UsageCounter<S>>,
    pub limiters: Arc<LimiterChain>,
    pub system_prompt: Arc<SystemPromptCache>,
    pub config: Arc<ChatConfig>,
}

// Manual impl: only the `Arc`s are cloned, `C` and `S` need not be `Clone`
impl<C, S> Clone for ChatAppState<C, S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            counter: self.counter.clone(),
            limiters: self.limiters.clone(),
            system_prompt: self.system_prompt.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C, S> ChatAppState<C, S> {
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
}

/// POST /api/chat
pub async fn send_message<C, S>(
    State(state): State<ChatAppState<C, S>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ChatResult<Json<ChatResponse>>
where
    C: CompletionClient + Send + Sync + 'static,
    S: UsageStore + Send + Sync + 'static,
{
    let Json(req) = payload.map_err(|rejection| ChatError::InvalidBody(rejection.body_text()))?;

    let use_case = SendMessageUseCase::new(
        state.client.clone(),
        state.counter.clone(),
        state.limiters.clone(),
        state.system_prompt.clone(),
        state.config.clone(),
    );

    let input = SendMessageInput {
        message: req.message,
        caller: caller_key(&headers, Some(addr.ip()), state.config.trust_forwarded_for),
    };

    let output = use_case.execute(input, Utc::now()).await?;

    Ok(Json(ChatResponse {
        reply: output.reply,
    }))
}

/// GET /health
pub async fn health<C, S>(State(state): State<ChatAppState<C, S>>) -> Json<HealthResponse>
where
    C: CompletionClient + Send + Sync + 'static,
    S: UsageStore + Send + Sync + 'static,
{
    let use_case = CheckHealthUseCase::new(state.counter.clone(), state.config.clone());
    let status = use_case.execute(Utc::now()).await;

    Json(status.into())
}
