//! Shared utilities for the stock quote bot
//!
//! This crate provides common functionality used across the workspace,
//! including logging setup and environment-driven configuration helpers.

pub mod config;
pub mod logging;

pub use config::{ConfigError, EnvLookup, ProcessEnv, load_dotenv, parse_env};
pub use logging::{LogFormat, init_tracing};
