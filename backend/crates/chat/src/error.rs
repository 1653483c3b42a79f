//! Chat Error Types
//!
//! This module provides chat-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::rate_limit::{LimitScope, RateLimitRejection};
use thiserror::Error;

/// Chat-specific result type alias
pub type ChatResult<T> = Result<T, ChatError>;

/// Chat-specific error variants
///
/// Client faults (validation, rate limiting) are returned with actionable
/// detail. Server faults are logged in full and returned as a generic message.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Message is absent or only whitespace
    #[error("Message is empty")]
    EmptyMessage,

    /// Trimmed message exceeds the configured maximum
    #[error("Message is too long: {received} characters (max {max})")]
    MessageTooLong { max: usize, received: usize },

    /// Request body is not the expected JSON
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// A rate limiter rejected the request
    #[error("Rate limit exceeded ({scope}), retry in {retry_after_ms} ms")]
    RateLimited {
        scope: LimitScope,
        retry_after_ms: i64,
    },

    /// Completion API failed or returned no content
    #[error("Completion failed: {0}")]
    Upstream(String),

    /// Usage record could not be read or written
    #[error("Usage store error: {0}")]
    Store(String),

    /// Notification could not be delivered
    #[error("Notification failed: {0}")]
    Notification(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::EmptyMessage
            | ChatError::MessageTooLong { .. }
            | ChatError::InvalidBody(_) => ErrorKind::BadRequest,
            ChatError::RateLimited { .. } => ErrorKind::TooManyRequests,
            ChatError::Upstream(_)
            | ChatError::Store(_)
            | ChatError::Notification(_)
            | ChatError::Database(_)
            | ChatError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Convert to AppError
    ///
    /// Server-side details stay in the logs; only client faults carry their
    /// own message and detail fields.
    pub fn to_app_error(&self) -> AppError {
        match self {
            ChatError::EmptyMessage => {
                AppError::bad_request("Message is empty").with_detail("reason", "empty_message")
            }
            ChatError::MessageTooLong { max, received } => {
                AppError::bad_request("Message is too long")
                    .with_detail("reason", "message_too_long")
                    .with_detail("max", *max)
                    .with_detail("received", *received)
            }
            ChatError::InvalidBody(_) => AppError::bad_request("Invalid request body")
                .with_detail("reason", "invalid_body"),
            ChatError::RateLimited {
                scope,
                retry_after_ms,
            } => {
                let retry_after_ms = (*retry_after_ms).max(0);
                AppError::too_many_requests("Too many requests, please try again later")
                    .with_detail("reason", "rate_limited")
                    .with_detail("scope", scope.as_str())
                    .with_detail("retryAfterMs", retry_after_ms)
                    .with_retry_after(Duration::from_millis(retry_after_ms.unsigned_abs()))
            }
            ChatError::Upstream(_) => AppError::internal("The assistant could not answer right now"),
            _ => AppError::internal("Internal server error"),
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            ChatError::Upstream(detail) => {
                tracing::error!(detail = %detail, "Completion request failed");
            }
            ChatError::Database(e) => {
                tracing::error!(error = %e, "Chat database error");
            }
            ChatError::Store(detail) | ChatError::Internal(detail) => {
                tracing::error!(detail = %detail, "Chat internal error");
            }
            ChatError::RateLimited { scope, .. } => {
                tracing::warn!(scope = %scope, "Chat request rate limited");
            }
            _ => {
                tracing::debug!(error = %self, "Chat request rejected");
            }
        }
    }
}

impl From<RateLimitRejection> for ChatError {
    fn from(rejection: RateLimitRejection) -> Self {
        ChatError::RateLimited {
            scope: rejection.scope,
            retry_after_ms: rejection.retry_after_ms,
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        err.to_app_error()
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}
