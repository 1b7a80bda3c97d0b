//! Error types for the analysis pipeline

use agent_llm::LLMError;
use thiserror::Error;

/// Errors raised inside the analysis pipeline
///
/// Only the model call and prompt rendering surface these to the pipeline;
/// the data fetchers convert them into degraded records at their boundary.
#[derive(Debug, Error)]
pub enum FinanceError {
    /// Provider answered with a non-success status or an error payload
    #[error("API error: {0}")]
    ApiError(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Completion provider failure
    #[error("LLM error: {0}")]
    LlmError(#[from] LLMError),

    /// Prompt template failed to render
    #[error("Prompt error: {0}")]
    PromptError(#[from] minijinja::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, FinanceError>;

impl From<agent_utils::ConfigError> for FinanceError {
    fn from(err: agent_utils::ConfigError) -> Self {
        FinanceError::ConfigError(err.to_string())
    }
}
