//! Chat Router

use axum::{
    Router,
    routing::{get, post},
};

use crate::domain::repository::{CompletionClient, UsageStore};
use crate::presentation::handlers::{self, ChatAppState};

/// Create the chat router: `POST /api/chat` and `GET /health`
///
/// Handlers read the peer address, so serve with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
///
/// With `trust_forwarded_for` set, callers are keyed by the first
/// X-Forwarded-For address. Only enable it behind a proxy that overwrites
/// the header, otherwise a client can rotate it to dodge the per-caller limit.
pub fn chat_router<C, S>(state: ChatAppState<C, S>) -> Router
where
    C: CompletionClient + Send + Sync + 'static,
    S: UsageStore + Send + Sync + 'static,
{
    Router::new()
        .route("/api/chat", post(handlers::send_message::<C, S>))
        .route("/health", get(handlers::health::<C, S>))
        .with_state(state)
}
