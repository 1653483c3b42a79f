//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (UsageWindow, UsageReport)
//! - Domain value objects (ChatMessage, ReportSchedule)
//! - Domain services (cycle boundary arithmetic)
//! - Port traits (usage store, completion, notification)

pub mod entities;
pub mod repository;
pub mod services;
pub mod value_objects;
