//! Completion provider trait definition

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// Trait for text completion providers
///
/// Implementations wrap a concrete service (Gemini, OpenAI-compatible
/// endpoints). Callers treat it as prompt in, text out; rate limiting and
/// quota exhaustion surface as distinct [`crate::LLMError`] variants.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the provider name (e.g., "gemini", "openai")
    fn name(&self) -> &str;
}
