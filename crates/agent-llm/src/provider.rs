//! LLM provider trait definition

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// Trait for text-completion providers
///
/// The pipeline treats the model as a black box: one request in, one block of
/// free-form text out. Implementations exist for Gemini and for any
/// OpenAI-compatible chat endpoint.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion from the LLM
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the provider name (e.g., "gemini", "openai")
    fn name(&self) -> &str;
}
