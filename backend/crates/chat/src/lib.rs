//! Chat Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Value objects, entities, cycle arithmetic, port traits
//! - `application/` - Use cases
//! - `infra/` - Usage stores, completion client, notifiers, schedulers
//! - `presentation/` - HTTP handlers
//!
//! ## Accounting Model
//! - Every request is validated before it touches a rate limiter
//! - Rate limiters charge as they check; a later rejection does not refund earlier ones
//! - Only a non-empty completion is counted, and counting never blocks the reply
//! - All reads and writes of the usage record go through one critical section

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::{ChatConfig, DEFAULT_SYSTEM_PROMPT};
pub use application::report_usage::UsageReporter;
pub use application::system_prompt::SystemPromptCache;
pub use application::usage_counter::UsageCounter;
pub use domain::value_objects::ReportSchedule;
pub use error::{ChatError, ChatResult};
pub use infra::UsageStoreBackend;
pub use presentation::handlers::ChatAppState;
pub use presentation::router::chat_router;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

#[cfg(test)]
mod tests;
