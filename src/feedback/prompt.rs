//! Prompt construction for feedback requests.

use super::types::Message;
use crate::grading::Verdict;

/// System prompt template for the teaching assistant.
const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are a teaching assistant reviewing SQL homework for a SQLite database.

DATABASE SCHEMA:
{schema}

INSTRUCTIONS:
- The student's query ran, but its result did not match the answer most of the class agreed on
- Explain in plain language what the query most likely gets wrong
- Give hints, not a full corrected query
- Keep the answer under 150 words"#;

/// Everything known about one submission that needs feedback.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackRequest<'a> {
    pub student: &'a str,
    pub query: &'a str,
    pub verdict: &'a Verdict,
    /// A query from a student whose result matched the majority.
    pub reference_query: Option<&'a str>,
}

/// Builds the system prompt with the schema source injected.
pub fn build_system_prompt(schema: Option<&str>) -> String {
    let schema = schema
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("(not available)");
    SYSTEM_PROMPT_TEMPLATE.replace("{schema}", schema)
}

/// Builds the user message describing the submission.
pub fn build_user_prompt(request: &FeedbackRequest<'_>) -> String {
    let mut prompt = format!(
        "Student: {}\nVerdict: {}\n\nSubmitted query:\n```sql\n{}\n```\n",
        request.student,
        request.verdict,
        request.query.trim()
    );

    match request.reference_query {
        Some(reference) => prompt.push_str(&format!(
            "\nA query that produced the accepted result:\n```sql\n{}\n```\n",
            reference.trim()
        )),
        None => prompt.push_str("\nNo result was accepted by a majority of the class.\n"),
    }

    prompt
}

/// Builds the complete message list for a feedback request.
pub fn build_messages(schema: Option<&str>, request: &FeedbackRequest<'_>) -> Vec<Message> {
    vec![
        Message::system(build_system_prompt(schema)),
        Message::user(build_user_prompt(request)),
    ]
}
