//! Integration tests for sqlgrade.

pub mod cli_test;
pub mod executor_test;
pub mod grading_test;

use std::path::Path;

use sqlgrade::db::{provision, DatabaseHandle, SchemaSource, SeedMode};
use sqlgrade::query::{IsolatedExecutor, WorkerCommand};

/// Schema shared by the integration tests.
pub const SCHOOL_SCHEMA: &str = r#"
[[tables]]
name = "Students"
columns = ["id INTEGER PRIMARY KEY AUTOINCREMENT", "name TEXT NOT NULL"]
fixture = [{ name = "Alice" }, { name = "Bob" }, { name = "Charlie" }]

[[tables]]
name = "Courses"
columns = ["id INTEGER PRIMARY KEY AUTOINCREMENT", "title TEXT NOT NULL"]
fixture = [{ title = "math" }, { title = "history" }]

[[tables]]
name = "Enrollments"
columns = [
    "student_id INTEGER NOT NULL",
    "course_id INTEGER NOT NULL",
    "FOREIGN KEY (student_id) REFERENCES Students(id)",
    "FOREIGN KEY (course_id) REFERENCES Courses(id)",
]
fixture = [
    { student_id = 1, course_id = 1 },
    { student_id = 2, course_id = 1 },
    { student_id = 2, course_id = 2 },
]
"#;

/// A query that never finishes on its own.
pub const RUNAWAY_QUERY: &str =
    "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT count(*) FROM c;";

/// Path of the compiled binary under test.
pub fn sqlgrade_bin() -> &'static str {
    env!("CARGO_BIN_EXE_sqlgrade")
}

/// Executor that launches the compiled binary's worker subcommand.
pub fn executor() -> IsolatedExecutor {
    IsolatedExecutor::new(WorkerCommand::sqlgrade(sqlgrade_bin()))
}

/// Provisions the school fixture database inside `dir`.
pub async fn school_db(dir: &Path) -> DatabaseHandle {
    let schema = SchemaSource::parse_toml(SCHOOL_SCHEMA).unwrap();
    provision(&schema, SeedMode::Fixture, &dir.join("school.db"))
        .await
        .unwrap()
}
