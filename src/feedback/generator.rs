//! Feedback generation for one grading run.

use std::time::Duration;

use tracing::{debug, warn};

use super::prompt::{build_messages, FeedbackRequest};
use super::{FeedbackConfig, LlmClient};
use crate::error::GraderError;

/// Upper bound on one feedback text, in units of the per-request timeout.
/// Covers three attempts plus the backoff between them.
const TIMEOUT_BUDGET_FACTOR: u32 = 4;

/// Produces feedback text for rejected submissions.
///
/// Owns its provider client and settings for the duration of one run.
pub struct FeedbackGenerator {
    config: FeedbackConfig,
    client: Box<dyn LlmClient>,
    schema: Option<String>,
}

impl FeedbackGenerator {
    pub fn new(config: FeedbackConfig, client: Box<dyn LlmClient>) -> Self {
        Self {
            config,
            client,
            schema: None,
        }
    }

    /// Includes the schema source text in every prompt.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Returns feedback for one submission.
    ///
    /// Never fails: errors become a placeholder text.
    pub async fn generate(&self, request: &FeedbackRequest<'_>) -> String {
        let messages = build_messages(self.schema.as_deref(), request);
        let budget = Duration::from_secs(self.config.timeout_secs) * TIMEOUT_BUDGET_FACTOR;

        let result = match tokio::time::timeout(budget, self.client.complete(&messages)).await {
            Ok(result) => result,
            Err(_) => Err(GraderError::feedback(format!(
                "no answer from {} within {:?}",
                self.config.provider, budget
            ))),
        };

        match result {
            Ok(text) => {
                debug!("Generated feedback for {}", request.student);
                text.trim().to_string()
            }
            Err(e) => {
                warn!("Feedback for {} failed: {}", request.student, e);
                placeholder(&e)
            }
        }
    }
}

/// The text recorded in place of feedback that could not be generated.
pub fn placeholder(error: &GraderError) -> String {
    let detail = match error {
        GraderError::Feedback(msg) => msg.clone(),
        other => other.to_string(),
    };
    format!("[feedback unavailable: {detail}]")
}
