//! Submission safety hints.
//!
//! Parses each submission with the SQLite dialect and reports whether it
//! would modify the shared database. Grading never refuses a query on these
//! grounds; the result only feeds a warning in the log.

mod parser;

pub use parser::{classify_sql, SqlClassifier};

use std::fmt;

/// Whether a submission leaves the database untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SafetyLevel {
    /// Only reads data (SELECT, WITH, EXPLAIN, VALUES).
    ReadOnly,
    /// Writes data or changes the schema.
    Mutating,
    /// The parser could not make sense of the text.
    Unknown,
}

impl SafetyLevel {
    /// Returns true if a warning should be logged for this submission.
    pub fn requires_warning(&self) -> bool {
        matches!(self, Self::Mutating)
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "Read-only"),
            Self::Mutating => write!(f, "Mutating"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// The type of SQL statement detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Drop,
    Alter,
    Create,
    Explain,
    Pragma,
    Transaction,
    /// Multiple statements detected; contains the most significant type.
    Multiple(Box<StatementType>),
    /// Statement type could not be determined.
    Unknown,
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Drop => write!(f, "DROP"),
            Self::Alter => write!(f, "ALTER"),
            Self::Create => write!(f, "CREATE"),
            Self::Explain => write!(f, "EXPLAIN"),
            Self::Pragma => write!(f, "PRAGMA"),
            Self::Transaction => write!(f, "TRANSACTION"),
            Self::Multiple(inner) => write!(f, "Multiple ({})", inner),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// What a submission would do to the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub level: SafetyLevel,
    pub statement_type: StatementType,
    /// Why the text could not be parsed, if it could not.
    pub parse_error: Option<String>,
}

impl Classification {
    pub fn new(level: SafetyLevel, statement_type: StatementType) -> Self {
        Self {
            level,
            statement_type,
            parse_error: None,
        }
    }

    /// A classification for text the parser rejected.
    pub fn with_parse_error(
        level: SafetyLevel,
        statement_type: StatementType,
        error: impl Into<String>,
    ) -> Self {
        Self {
            level,
            statement_type,
            parse_error: Some(error.into()),
        }
    }

    /// Returns true if the submission would modify the database.
    pub fn requires_warning(&self) -> bool {
        self.level.requires_warning()
    }
}
