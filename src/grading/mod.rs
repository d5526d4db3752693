//! Grading: submission discovery, majority consensus and reports.

pub mod consensus;
mod orchestrator;
pub mod report;
mod submission;

pub use consensus::{find_majority, grade, grade_against, verdict_for, MajorityResult, Verdict};
pub use orchestrator::{run_grading, Grader, GradingReport};
pub use report::{read_results_csv, write_feedback_csv, write_results_csv};
pub use submission::{discover_submissions, Submission, SUBMISSION_EXTENSION};
