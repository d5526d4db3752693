//! Anthropic Messages API client.
//!
//! The system prompt travels as a separate request field rather than as a
//! message.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{self, ApiTransport, Endpoint};
use super::types::{Message, Role};
use super::LlmClient;
use crate::error::{GraderError, Result};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Model used when neither the config nor `ANTHROPIC_MODEL` names one.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const ENDPOINT: Endpoint = Endpoint {
    name: "Anthropic",
    url: "https://api.anthropic.com/v1/messages",
    key_var: "ANTHROPIC_API_KEY",
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Feedback is a few paragraphs at most.
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Caps the length of generated feedback.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    model: String,
    max_tokens: u32,
    transport: ApiTransport,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let headers = http::headers(&[
            ("x-api-key", config.api_key.as_str()),
            ("anthropic-version", ANTHROPIC_VERSION),
        ])?;
        let transport = ApiTransport::new(ENDPOINT, headers, config.timeout_secs)?;

        Ok(Self {
            model: config.model,
            max_tokens: config.max_tokens,
            transport,
        })
    }

    /// Splits out the system prompt; the last system message wins.
    fn request<'a>(&'a self, messages: &'a [Message]) -> MessagesRequest<'a> {
        let mut system = None;
        let mut turns = Vec::new();

        for message in messages {
            match message.role {
                Role::System => system = Some(message.content.as_str()),
                Role::User | Role::Assistant => turns.push(Turn {
                    role: message.role.as_str(),
                    content: &message.content,
                }),
            }
        }

        MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: turns,
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let response: MessagesResponse = self.transport.post(&self.request(messages)).await?;
        response_text(response)
    }
}

/// Joins the text blocks of a response, skipping any other block types.
fn response_text(response: MessagesResponse) -> Result<String> {
    let text: String = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect();

    if text.trim().is_empty() {
        return Err(GraderError::feedback("No response from Anthropic"));
    }
    Ok(text)
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Turn<'a>>,
}

#[derive(Debug, Serialize)]
struct Turn<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AnthropicClient {
        let config = AnthropicConfig::new("sk-ant-test", DEFAULT_MODEL).with_max_tokens(512);
        AnthropicClient::new(config).unwrap()
    }

    #[test]
    fn test_config_builders() {
        let config = AnthropicConfig::new("k", DEFAULT_MODEL)
            .with_timeout(60)
            .with_max_tokens(256);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.max_tokens, 256);
        assert_eq!(
            AnthropicConfig::new("k", DEFAULT_MODEL).max_tokens,
            DEFAULT_MAX_TOKENS
        );
    }

    #[test]
    fn test_request_moves_system_prompt() {
        let client = client();
        let messages = [
            Message::system("You are a TA."),
            Message::user("Review this"),
            Message::assistant("Sure"),
        ];

        let json = serde_json::to_value(client.request(&messages)).unwrap();

        assert_eq!(json["system"], "You are a TA.");
        assert_eq!(json["max_tokens"], 512);
        assert_eq!(json["messages"].as_array().unwrap().len(), 2);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][1]["role"], "assistant");
    }

    #[test]
    fn test_request_omits_missing_system() {
        let client = client();
        let messages = [Message::user("hi")];
        let json = serde_json::to_value(client.request(&messages)).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_response_text_joins_text_blocks() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content":[
                {"type":"text","text":"Check "},
                {"type":"tool_use","id":"t1","name":"x","input":{}},
                {"type":"text","text":"the join."}
            ]}"#,
        )
        .unwrap();
        assert_eq!(response_text(response).unwrap(), "Check the join.");
    }

    #[test]
    fn test_empty_response_is_error() {
        let response: MessagesResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        let err = response_text(response).unwrap_err();
        assert!(matches!(err, GraderError::Feedback(_)));
    }
}
