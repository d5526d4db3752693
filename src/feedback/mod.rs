//! Natural-language feedback for rejected submissions.
//!
//! Feedback is best effort. A failing provider only changes the feedback
//! text, never a verdict or the results file.

pub mod anthropic;
mod factory;
mod generator;
mod http;
mod mock;
pub mod openai;
pub mod prompt;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use factory::create_client;
pub use generator::{placeholder, FeedbackGenerator};
pub use mock::{MockLlmClient, DEFAULT_MOCK_FEEDBACK};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use prompt::FeedbackRequest;
pub use types::{Message, Role};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Result;

/// Trait for LLM clients that can generate completions.
///
/// Implementations must be thread-safe (Send + Sync) to support async operations.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generates a completion for the given messages.
    async fn complete(&self, messages: &[Message]) -> Result<String>;
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI (GPT-4o, etc.)
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic (Claude)
    Anthropic,
    /// Canned responses, no API key required
    Mock,
}

impl LlmProvider {
    /// Returns the provider as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings for one grading run's feedback generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackConfig {
    pub provider: LlmProvider,
    /// Overrides the provider's default model.
    pub model: Option<String>,
    /// Overrides the provider's API key environment variable.
    pub api_key: Option<String>,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: None,
            api_key: None,
            timeout_secs: openai::DEFAULT_TIMEOUT_SECS,
        }
    }
}
