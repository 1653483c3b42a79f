//! Application Layer - Use Cases
//!
//! This layer orchestrates domain logic and infrastructure.
//! Contains use case implementations.

pub mod check_health;
pub mod config;
pub mod report_usage;
pub mod send_message;
pub mod system_prompt;
pub mod usage_counter;
