//! Submission discovery.

use crate::error::{GraderError, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File extension that marks a submission (compared case-insensitively).
pub const SUBMISSION_EXTENSION: &str = "sql";

/// One student's query, as loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Student identity: the file name without its extension.
    pub student: String,
    pub path: PathBuf,
    /// The query text, or why it could not be read.
    pub text: std::result::Result<String, String>,
}

impl Submission {
    /// Creates a readable submission.
    pub fn new(student: impl Into<String>, sql: impl Into<String>) -> Self {
        let student = student.into();
        Self {
            path: PathBuf::from(format!("{student}.{SUBMISSION_EXTENSION}")),
            student,
            text: Ok(sql.into()),
        }
    }

    /// Returns the query text if it could be read.
    pub fn sql(&self) -> Option<&str> {
        self.text.as_deref().ok()
    }
}

/// Loads every `.sql` file in `dir`, sorted by file name.
///
/// When two files share a stem (`bob.sql` and `bob.SQL`) the first in sorted
/// order is kept and the rest are skipped.
pub fn discover_submissions(dir: &Path) -> Result<Vec<Submission>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        GraderError::config(format!(
            "Cannot read submissions directory {}: {e}",
            dir.display()
        ))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            GraderError::io(format!("Cannot list {}: {e}", dir.display()))
        })?;
        let path = entry.path();
        if path.is_file() && is_submission(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut seen = BTreeSet::new();
    let mut submissions = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(student) = student_name(&path) else {
            warn!("Skipping submission with unusable name: {}", path.display());
            continue;
        };
        if !seen.insert(student.clone()) {
            warn!(
                "Duplicate submission for {student}: skipping {}",
                path.display()
            );
            continue;
        }

        let text = read_query(&path);
        debug!("Loaded submission {student} from {}", path.display());
        submissions.push(Submission {
            student,
            path,
            text,
        });
    }

    Ok(submissions)
}

fn is_submission(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SUBMISSION_EXTENSION))
}

fn student_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(String::from)
}

fn read_query(path: &Path) -> std::result::Result<String, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("cannot read submission: {e}"))?;
    String::from_utf8(bytes).map_err(|e| format!("submission is not valid UTF-8: {e}"))
}
