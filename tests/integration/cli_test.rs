//! Tests that drive the `sqlgrade` binary from the command line.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use sqlgrade::db::Value;
use sqlgrade::query::WorkerReply;
use tempfile::tempdir;

use super::{sqlgrade_bin, SCHOOL_SCHEMA};

fn setup(dir: &Path) {
    std::fs::write(dir.join("schema.toml"), SCHOOL_SCHEMA).unwrap();
    let students = dir.join("students");
    std::fs::create_dir(&students).unwrap();
    std::fs::write(students.join("alice.sql"), "SELECT COUNT(*) FROM Students").unwrap();
    std::fs::write(students.join("bob.sql"), "SELECT count(id) FROM Students;").unwrap();
    std::fs::write(students.join("carol.sql"), "SELECT 2").unwrap();
}

fn grade(dir: &Path, extra: &[&str]) -> Output {
    Command::new(sqlgrade_bin())
        .current_dir(dir)
        .args([
            "--submissions",
            "students",
            "--schema",
            "schema.toml",
            "--database",
            "grade.db",
            "--output",
            "results.csv",
            "--config",
            "no-config.toml",
            "--timeout",
            "5",
        ])
        .args(extra)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn test_grade_writes_results_and_summary() {
    let dir = tempdir().unwrap();
    setup(dir.path());

    let output = grade(dir.path(), &["-j", "2"]);
    assert!(output.status.success(), "{:?}", output);

    let results = std::fs::read_to_string(dir.path().join("results.csv")).unwrap();
    assert_eq!(results, "Student,Result\nalice,OK\nbob,OK\ncarol,FAIL\n");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Majority result: accepted as correct (2/3)"), "{stdout}");
    assert!(stdout.contains("2 of 3 submissions graded OK"), "{stdout}");
}

#[test]
fn test_mock_feedback_for_failures() {
    let dir = tempdir().unwrap();
    setup(dir.path());

    let output = grade(dir.path(), &["--llm", "mock", "--feedback-output", "fb.csv"]);
    assert!(output.status.success(), "{:?}", output);

    let feedback = std::fs::read_to_string(dir.path().join("fb.csv")).unwrap();
    let mut lines = feedback.lines();
    assert_eq!(lines.next(), Some("Student,Feedback"));
    let carol = lines.next().unwrap();
    assert!(carol.starts_with("carol,"), "{carol}");
    assert_eq!(lines.next(), None);
}

#[test]
fn test_bad_schema_exits_nonzero() {
    let dir = tempdir().unwrap();
    setup(dir.path());
    std::fs::write(dir.path().join("schema.toml"), "[[tables]]\nname = 1\n").unwrap();

    let output = grade(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!dir.path().join("results.csv").exists());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Provisioning Error"), "{stderr}");
}

#[test]
fn test_invalid_timeout_exits_nonzero() {
    let dir = tempdir().unwrap();
    setup(dir.path());

    let output = grade(dir.path(), &["--timeout", "0"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Configuration Error"), "{stderr}");
}

#[test]
fn test_log_file_keeps_stderr_quiet() {
    let dir = tempdir().unwrap();
    setup(dir.path());

    let output = grade(dir.path(), &["--log-file", "logs/run.log"]);
    assert!(output.status.success(), "{:?}", output);
    assert!(output.stderr.is_empty());

    let log = std::fs::read_to_string(dir.path().join("logs/run.log")).unwrap();
    assert!(log.contains("Majority"), "{log}");
}

#[test]
fn test_worker_subcommand_speaks_json() {
    let dir = tempdir().unwrap();
    setup(dir.path());
    // Provision through a normal run first.
    assert!(grade(dir.path(), &[]).status.success());

    let mut child = Command::new(sqlgrade_bin())
        .args(["worker", "--database"])
        .arg(dir.path().join("grade.db"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"SELECT title FROM Courses ORDER BY id")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    assert_eq!(
        WorkerReply::parse(&output.stdout).unwrap(),
        WorkerReply::Rows {
            rows: vec![vec![Value::from("math")], vec![Value::from("history")]]
        }
    );
}
