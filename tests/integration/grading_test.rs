//! End-to-end grading through real worker processes.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use sqlgrade::config::GradeSettings;
use sqlgrade::db::SeedMode;
use sqlgrade::grading::{read_results_csv, run_grading, Verdict};
use tempfile::tempdir;

use super::{executor, RUNAWAY_QUERY, SCHOOL_SCHEMA};

const MATH_JOIN: &str = "SELECT s.name FROM Students s \
                         JOIN Enrollments e ON e.student_id = s.id \
                         WHERE e.course_id = 1";

fn class(dir: &Path) -> GradeSettings {
    let schema = dir.join("schema.toml");
    std::fs::write(&schema, SCHOOL_SCHEMA).unwrap();

    let students = dir.join("students");
    std::fs::create_dir(&students).unwrap();
    let submissions = [
        ("alice", MATH_JOIN.to_string()),
        // Same rows in another order.
        (
            "bob",
            "SELECT name FROM Students WHERE id IN \
             (SELECT student_id FROM Enrollments WHERE course_id = 1) ORDER BY name DESC"
                .to_string(),
        ),
        // Duplicates collapse.
        ("carol", format!("{MATH_JOIN} UNION ALL {MATH_JOIN}")),
        (
            "dave",
            "SELECT s.name FROM Students s, Enrollments e \
             WHERE s.id = e.student_id AND e.course_id = 1;"
                .to_string(),
        ),
        ("erin", "SELECT name FROM Students".to_string()),
        ("frank", RUNAWAY_QUERY.to_string()),
        ("grace", "SELEC name FROM Students".to_string()),
    ];
    for (student, sql) in submissions {
        std::fs::write(students.join(format!("{student}.sql")), sql).unwrap();
    }
    std::fs::write(students.join("notes.txt"), "not a submission").unwrap();

    GradeSettings {
        submissions_dir: students,
        schema,
        database: dir.join("grade.db"),
        output: dir.join("out").join("results.csv"),
        timeout: Duration::from_secs(1),
        seed_mode: SeedMode::Fixture,
        jobs: 3,
        feedback: None,
    }
}

#[tokio::test]
async fn test_grade_class_end_to_end() {
    let dir = tempdir().unwrap();
    let settings = class(dir.path());

    let report = run_grading(&settings, &executor()).await.unwrap();

    assert_eq!(report.verdicts.len(), 7);
    for student in ["alice", "bob", "carol", "dave"] {
        assert_eq!(report.verdicts[student], Verdict::Ok, "{student}");
    }
    assert_eq!(report.verdicts["erin"], Verdict::Fail);
    assert_eq!(report.verdicts["frank"], Verdict::TimedOut);
    match &report.verdicts["grace"] {
        Verdict::Error(message) => assert!(message.contains("syntax error"), "{message}"),
        other => panic!("Expected error verdict, got {other}"),
    }

    assert_eq!(report.majority.count, 4);
    assert_eq!(report.majority.total, 7);

    let written = read_results_csv(&settings.output).unwrap();
    assert_eq!(written, report.verdicts);
}

#[tokio::test]
async fn test_no_majority_fails_every_comparable_result() {
    let dir = tempdir().unwrap();
    let mut settings = class(dir.path());

    // Leave only two disagreeing students.
    for entry in std::fs::read_dir(&settings.submissions_dir).unwrap() {
        let path = entry.unwrap().path();
        let keep = matches!(
            path.file_stem().and_then(|s| s.to_str()),
            Some("alice") | Some("erin")
        );
        if !keep {
            std::fs::remove_file(path).unwrap();
        }
    }
    settings.jobs = 1;

    let report = run_grading(&settings, &executor()).await.unwrap();

    assert!(!report.majority.is_accepted());
    assert_eq!(
        report.verdicts,
        BTreeMap::from([
            ("alice".to_string(), Verdict::Fail),
            ("erin".to_string(), Verdict::Fail),
        ])
    );
}

#[tokio::test]
async fn test_empty_submissions_directory_writes_header_only() {
    let dir = tempdir().unwrap();
    let mut settings = class(dir.path());
    settings.submissions_dir = dir.path().join("empty");
    std::fs::create_dir(&settings.submissions_dir).unwrap();

    let report = run_grading(&settings, &executor()).await.unwrap();

    assert!(report.verdicts.is_empty());
    assert_eq!(
        std::fs::read_to_string(&settings.output).unwrap(),
        "Student,Result\n"
    );
}

#[tokio::test]
async fn test_random_data_grades_consistently() {
    let dir = tempdir().unwrap();
    let mut settings = class(dir.path());
    settings.seed_mode = SeedMode::Random { seed: Some(3) };

    let report = run_grading(&settings, &executor()).await.unwrap();

    // Equivalent queries agree on any data.
    let alice = &report.outcomes["alice"];
    for student in ["bob", "carol", "dave"] {
        assert_eq!(&report.outcomes[student], alice, "{student}");
    }
}
