//! Isolated execution tests.
//!
//! Every query here runs in a real worker process.

use std::time::{Duration, Instant};

use sqlgrade::db::Value;
use sqlgrade::query::{IsolatedExecutor, QueryOutcome, QueryRunner, WorkerCommand};
use tempfile::tempdir;

use super::{executor, school_db, RUNAWAY_QUERY};

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_select_returns_rows() {
    let dir = tempdir().unwrap();
    let db = school_db(dir.path()).await;

    let outcome = executor()
        .execute("SELECT name FROM Students ORDER BY id", &db, TIMEOUT)
        .await;

    assert_eq!(
        outcome,
        QueryOutcome::Rows(vec![
            vec![Value::from("Alice")],
            vec![Value::from("Bob")],
            vec![Value::from("Charlie")],
        ])
    );
}

#[tokio::test]
async fn test_values_survive_the_worker_boundary() {
    let dir = tempdir().unwrap();
    let db = school_db(dir.path()).await;

    let outcome = executor()
        .execute("SELECT NULL, 42, 2.5, 'text', x'00ff'", &db, TIMEOUT)
        .await;

    assert_eq!(
        outcome,
        QueryOutcome::Rows(vec![vec![
            Value::Null,
            Value::Int(42),
            Value::Float(2.5),
            Value::from("text"),
            Value::Bytes(vec![0x00, 0xff]),
        ]])
    );
}

#[tokio::test]
async fn test_syntax_error_is_error_outcome() {
    let dir = tempdir().unwrap();
    let db = school_db(dir.path()).await;

    let outcome = executor().execute("SELEC name FROM Students", &db, TIMEOUT).await;

    match outcome {
        QueryOutcome::Error(message) => assert!(message.contains("syntax error"), "{message}"),
        other => panic!("Expected error outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_runaway_query_times_out() {
    let dir = tempdir().unwrap();
    let db = school_db(dir.path()).await;

    let started = Instant::now();
    let outcome = executor()
        .execute(RUNAWAY_QUERY, &db, Duration::from_millis(500))
        .await;

    assert_eq!(outcome, QueryOutcome::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_statement_without_rows_is_empty_result() {
    let dir = tempdir().unwrap();
    let db = school_db(dir.path()).await;

    let outcome = executor()
        .execute("CREATE TEMP TABLE scratch (x INTEGER)", &db, TIMEOUT)
        .await;

    assert_eq!(outcome, QueryOutcome::Rows(Vec::new()));
}

#[tokio::test]
async fn test_crashing_worker_is_error_outcome() {
    let dir = tempdir().unwrap();
    let db = school_db(dir.path()).await;
    let executor = IsolatedExecutor::new(WorkerCommand::new("sh").with_args(["-c", "exit 3"]));

    let outcome = executor.execute("SELECT 1", &db, TIMEOUT).await;

    match outcome {
        QueryOutcome::Error(message) => assert!(message.contains("abnormally"), "{message}"),
        other => panic!("Expected error outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_worker_binary_is_error_outcome() {
    let dir = tempdir().unwrap();
    let db = school_db(dir.path()).await;
    let executor = IsolatedExecutor::new(WorkerCommand::new(dir.path().join("no-such-binary")));

    let outcome = executor.execute("SELECT 1", &db, TIMEOUT).await;
    assert!(matches!(outcome, QueryOutcome::Error(_)));
}
