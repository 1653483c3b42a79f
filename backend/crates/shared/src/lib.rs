//! Shared Kernel - Domain-crossing minimal core
//!
//! This crate contains the "smallest core" shared by every backend crate:
//! - The unified error type ([`error::app_error::AppError`]) and result alias
//! - Error classification mapped to HTTP status codes
//! - Conversions from common library errors
//!
//! **Design Principle**: Only include things that are "hard to change"
//! and have consistent meaning across all crates.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
