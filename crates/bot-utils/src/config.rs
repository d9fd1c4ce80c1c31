//! Configuration management utilities
//!
//! Configuration comes from the process environment, optionally seeded from a
//! `.env` file. Lookups go through [`EnvLookup`] so tests can feed a map instead
//! of mutating the real environment.

use std::str::FromStr;
use thiserror::Error;

/// Errors raised while reading configuration values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Value present but not parseable
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

/// Source of configuration values keyed by variable name
pub trait EnvLookup {
    fn get(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl<F> EnvLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        self(key)
    }
}

/// Load variables from a `.env` file if one exists
///
/// Returns the path that was loaded, if any. A missing file is not an error.
pub fn load_dotenv() -> Option<std::path::PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => Some(path),
        Err(e) if e.not_found() => None,
        Err(e) => {
            tracing::warn!("Failed to load .env: {}", e);
            None
        }
    }
}

/// Parse `key` from `env`, returning `None` when unset
pub fn parse_env<T, E>(env: &E, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    E: EnvLookup + ?Sized,
{
    match env.get(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
    }
}
