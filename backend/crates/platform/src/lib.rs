//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Fixed-window rate limiting and limiter composition
//! - Client identification from request headers
//! - Typed environment-variable configuration

pub mod client;
pub mod config;
pub mod rate_limit;
