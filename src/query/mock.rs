//! Mock query runner for testing.
//!
//! Provides canned outcomes without spawning processes or touching a
//! database.

use super::{QueryOutcome, QueryRunner};
use crate::db::DatabaseHandle;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// A query runner that returns predefined outcomes keyed by SQL text.
#[derive(Debug, Default)]
pub struct MockQueryRunner {
    /// (trimmed SQL, outcome) pairs checked in insertion order.
    responses: Vec<(String, QueryOutcome)>,
    /// SQL texts seen, in call order.
    calls: Mutex<Vec<String>>,
}

impl MockQueryRunner {
    /// Creates a runner that answers every query with an empty row set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the outcome returned for `sql`.
    pub fn with_outcome(mut self, sql: impl Into<String>, outcome: QueryOutcome) -> Self {
        self.responses.push((sql.into().trim().to_string(), outcome));
        self
    }

    /// Returns the SQL texts executed so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl QueryRunner for MockQueryRunner {
    async fn execute(
        &self,
        sql: &str,
        _database: &DatabaseHandle,
        _timeout: Duration,
    ) -> QueryOutcome {
        let sql = sql.trim();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(sql.to_string());
        }

        self.responses
            .iter()
            .find(|(pattern, _)| pattern == sql)
            .map(|(_, outcome)| outcome.clone())
            .unwrap_or(QueryOutcome::Rows(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Value;

    #[tokio::test]
    async fn test_mock_returns_registered_outcome() {
        let runner = MockQueryRunner::new()
            .with_outcome("SELECT 1", QueryOutcome::Rows(vec![vec![Value::Int(1)]]))
            .with_outcome("SELECT forever", QueryOutcome::TimedOut);
        let db = DatabaseHandle::new("unused.db");

        let outcome = runner.execute("SELECT 1\n", &db, Duration::ZERO).await;
        assert_eq!(outcome, QueryOutcome::Rows(vec![vec![Value::Int(1)]]));

        let outcome = runner.execute("SELECT forever", &db, Duration::ZERO).await;
        assert_eq!(outcome, QueryOutcome::TimedOut);

        let outcome = runner.execute("SELECT 2", &db, Duration::ZERO).await;
        assert_eq!(outcome, QueryOutcome::Rows(vec![]));

        assert_eq!(runner.calls().len(), 3);
    }
}
