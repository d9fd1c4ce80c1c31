//! Text completion layer for the stock quote bot
//!
//! This crate provides provider-agnostic types for short text completions
//! (news summarization). It includes:
//!
//! - Message and completion request/response types
//! - The [`LLMProvider`] trait
//! - Concrete provider implementations (behind feature flags)

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;

pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;

#[cfg(any(feature = "gemini", feature = "openai"))]
pub mod providers;
