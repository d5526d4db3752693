//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients.

use super::anthropic::{self, AnthropicClient, AnthropicConfig};
use super::openai::{self, OpenAiClient, OpenAiConfig};
use super::{FeedbackConfig, LlmClient, LlmProvider, MockLlmClient};
use crate::error::{GraderError, Result};

/// Creates an LLM client for the configured provider.
///
/// The API key is taken from the config, then from `OPENAI_API_KEY` or
/// `ANTHROPIC_API_KEY`. The model is taken from the config, then from
/// `OPENAI_MODEL` or `ANTHROPIC_MODEL`, then the provider default.
pub fn create_client(config: &FeedbackConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider {
        LlmProvider::OpenAi => {
            let key = resolve_key(config, "OPENAI_API_KEY")?;
            let model = resolve_model(config, "OPENAI_MODEL", openai::DEFAULT_MODEL);
            let client_config = OpenAiConfig::new(key, model).with_timeout(config.timeout_secs);
            Ok(Box::new(OpenAiClient::new(client_config)?))
        }
        LlmProvider::Anthropic => {
            let key = resolve_key(config, "ANTHROPIC_API_KEY")?;
            let model = resolve_model(config, "ANTHROPIC_MODEL", anthropic::DEFAULT_MODEL);
            let client_config =
                AnthropicConfig::new(key, model).with_timeout(config.timeout_secs);
            Ok(Box::new(AnthropicClient::new(client_config)?))
        }
        LlmProvider::Mock => Ok(Box::new(MockLlmClient::new())),
    }
}

fn resolve_key(config: &FeedbackConfig, env_var: &str) -> Result<String> {
    config
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .or_else(|| std::env::var(env_var).ok())
        .ok_or_else(|| {
            GraderError::feedback(format!(
                "No API key configured for {}. Set {env_var} or feedback.api_key.",
                config.provider
            ))
        })
}

fn resolve_model(config: &FeedbackConfig, env_var: &str, default: &str) -> String {
    config
        .model
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .unwrap_or_else(|| default.to_string())
}
