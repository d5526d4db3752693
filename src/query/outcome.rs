//! Raw and normalized query outcomes.

use crate::db::Row;
use std::collections::BTreeSet;
use std::fmt;

/// What happened when a submission was executed.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Every row the query produced, in the engine's order.
    Rows(Vec<Row>),
    /// The query did not finish before the deadline.
    TimedOut,
    /// Connection, parse, execution or worker failure.
    Error(String),
}

impl QueryOutcome {
    /// Creates an error outcome with the given message.
    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error(msg.into())
    }

    /// Short description for logs.
    pub fn summary(&self) -> String {
        match self {
            Self::Rows(rows) => format!("{} rows", rows.len()),
            Self::TimedOut => "timed out".to_string(),
            Self::Error(msg) => format!("error: {msg}"),
        }
    }
}

/// A query outcome reduced to an order- and duplicate-insensitive form.
///
/// Row sets compare by their distinct rows only, so `ORDER BY` and repeated
/// rows never change a grade. Failure markers pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NormalizedOutcome {
    /// The distinct rows, unordered.
    RowSet(BTreeSet<Row>),
    /// The query timed out.
    TimedOut,
    /// The query failed with this message.
    Error(String),
}

impl NormalizedOutcome {
    /// Returns true for row sets, the only values that take part in a vote.
    pub fn is_comparable(&self) -> bool {
        matches!(self, Self::RowSet(_))
    }
}

impl fmt::Display for NormalizedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowSet(rows) => write!(f, "{} distinct rows", rows.len()),
            Self::TimedOut => write!(f, "TimedOut"),
            Self::Error(msg) => write!(f, "ERROR: {msg}"),
        }
    }
}

/// Canonicalizes an outcome for comparison.
pub fn normalize(outcome: QueryOutcome) -> NormalizedOutcome {
    match outcome {
        QueryOutcome::Rows(rows) => NormalizedOutcome::RowSet(rows.into_iter().collect()),
        QueryOutcome::TimedOut => NormalizedOutcome::TimedOut,
        QueryOutcome::Error(msg) => NormalizedOutcome::Error(msg),
    }
}

impl From<NormalizedOutcome> for QueryOutcome {
    fn from(normalized: NormalizedOutcome) -> Self {
        match normalized {
            NormalizedOutcome::RowSet(rows) => QueryOutcome::Rows(rows.into_iter().collect()),
            NormalizedOutcome::TimedOut => QueryOutcome::TimedOut,
            NormalizedOutcome::Error(msg) => QueryOutcome::Error(msg),
        }
    }
}
