//! Error types for sqlgrade.
//!
//! Only provisioning and configuration errors abort a run. Everything that
//! can go wrong with a single submission is captured as a verdict instead.

use thiserror::Error;

/// Main error type for grading operations.
#[derive(Error, Debug)]
pub enum GraderError {
    /// Schema or fixture load failures. Fatal: grading never starts.
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    /// Query execution errors (syntax errors, constraint violations, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// The isolated worker could not be spawned or replied with garbage.
    #[error("Worker error: {0}")]
    Worker(String),

    /// Feedback generation errors (rate limits, auth, timeouts, etc.)
    #[error("Feedback error: {0}")]
    Feedback(String),

    /// Configuration errors (invalid config file, bad flag values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors while discovering submissions or writing reports.
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GraderError {
    /// Creates a provisioning error with the given message.
    pub fn provisioning(msg: impl Into<String>) -> Self {
        Self::Provisioning(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a worker error with the given message.
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    /// Creates a feedback error with the given message.
    pub fn feedback(msg: impl Into<String>) -> Self {
        Self::Feedback(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an I/O error with the given message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Provisioning(_) => "Provisioning Error",
            Self::Query(_) => "Query Error",
            Self::Worker(_) => "Worker Error",
            Self::Feedback(_) => "Feedback Error",
            Self::Config(_) => "Configuration Error",
            Self::Io(_) => "I/O Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns true if this error must abort the whole grading run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Provisioning(_) | Self::Config(_) | Self::Io(_))
    }
}

/// Result type alias using GraderError.
pub type Result<T> = std::result::Result<T, GraderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_provisioning() {
        let err = GraderError::provisioning("table Students already exists");
        assert_eq!(
            err.to_string(),
            "Provisioning error: table Students already exists"
        );
        assert_eq!(err.category(), "Provisioning Error");
    }

    #[test]
    fn test_error_display_query() {
        let err = GraderError::query("no such column: emal");
        assert_eq!(err.to_string(), "Query error: no such column: emal");
        assert_eq!(err.category(), "Query Error");
    }

    #[test]
    fn test_error_display_worker() {
        let err = GraderError::worker("reply was not valid JSON");
        assert_eq!(err.to_string(), "Worker error: reply was not valid JSON");
        assert_eq!(err.category(), "Worker Error");
    }

    #[test]
    fn test_error_display_feedback() {
        let err = GraderError::feedback("Rate limited. Please wait.");
        assert_eq!(err.to_string(), "Feedback error: Rate limited. Please wait.");
        assert_eq!(err.category(), "Feedback Error");
    }

    #[test]
    fn test_error_display_config() {
        let err = GraderError::config("timeout must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error: timeout must be positive"
        );
        assert_eq!(err.category(), "Configuration Error");
    }

    #[test]
    fn test_fatal_errors() {
        assert!(GraderError::provisioning("x").is_fatal());
        assert!(GraderError::config("x").is_fatal());
        assert!(GraderError::io("x").is_fatal());
        assert!(!GraderError::query("x").is_fatal());
        assert!(!GraderError::worker("x").is_fatal());
        assert!(!GraderError::feedback("x").is_fatal());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GraderError>();
    }
}
