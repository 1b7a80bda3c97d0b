//! Shared utilities for agent-rs
//!
//! This crate provides common functionality used across the agent-rs workspace:
//! tracing setup and environment-driven configuration helpers.

pub mod config;
pub mod logging;

pub use config::{ConfigError, env_or, env_parse, env_var, load_dotenv, require_env};
pub use logging::{init_json_tracing, init_tracing};
