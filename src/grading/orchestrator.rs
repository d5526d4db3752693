//! Drives one grading run from provisioning to reports.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use super::consensus::{find_majority, grade_against, MajorityResult, Verdict};
use super::report::{format_summary, write_feedback_csv, write_results_csv};
use super::submission::{discover_submissions, Submission};
use crate::config::GradeSettings;
use crate::db::{provision, DatabaseHandle, SchemaSource};
use crate::error::Result;
use crate::feedback::{create_client, placeholder, FeedbackGenerator, FeedbackRequest};
use crate::query::{normalize, NormalizedOutcome, QueryOutcome, QueryRunner};
use crate::safety::classify_sql;

/// Everything a grading run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingReport {
    pub outcomes: BTreeMap<String, NormalizedOutcome>,
    pub majority: MajorityResult,
    pub verdicts: BTreeMap<String, Verdict>,
    /// Feedback text for `FAIL` students; empty when feedback is off.
    pub feedback: BTreeMap<String, String>,
}

impl GradingReport {
    /// Console summary of the run.
    pub fn summary(&self) -> String {
        format_summary(&self.verdicts, &self.majority)
    }
}

/// Executes and grades a set of submissions.
pub struct Grader<'a> {
    runner: &'a dyn QueryRunner,
    timeout: Duration,
    jobs: usize,
    feedback: Option<FeedbackGenerator>,
}

impl<'a> Grader<'a> {
    pub fn new(runner: &'a dyn QueryRunner, timeout: Duration) -> Self {
        Self {
            runner,
            timeout,
            jobs: 1,
            feedback: None,
        }
    }

    /// Runs up to `jobs` queries at once.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_feedback(mut self, generator: FeedbackGenerator) -> Self {
        self.feedback = Some(generator);
        self
    }

    /// Executes every submission against `database`.
    pub async fn execute_all(
        &self,
        submissions: &[Submission],
        database: &DatabaseHandle,
    ) -> BTreeMap<String, QueryOutcome> {
        stream::iter(submissions)
            .map(|submission| async move {
                let outcome = self.execute_one(submission, database).await;
                (submission.student.clone(), outcome)
            })
            .buffer_unordered(self.jobs)
            .collect()
            .await
    }

    async fn execute_one(&self, submission: &Submission, database: &DatabaseHandle) -> QueryOutcome {
        let sql = match &submission.text {
            Ok(sql) => sql,
            Err(message) => return QueryOutcome::error(message.clone()),
        };

        let classification = classify_sql(sql);
        if classification.requires_warning() {
            warn!(
                "Submission {} modifies the database ({})",
                submission.student, classification.statement_type
            );
        }
        if let Some(parse_error) = &classification.parse_error {
            debug!("{} did not parse cleanly: {parse_error}", submission.student);
        }

        let outcome = self.runner.execute(sql, database, self.timeout).await;
        debug!("{}: {}", submission.student, outcome.summary());
        outcome
    }

    /// Executes, normalizes and grades every submission.
    pub async fn grade(
        &self,
        submissions: &[Submission],
        database: &DatabaseHandle,
    ) -> GradingReport {
        let outcomes: BTreeMap<String, NormalizedOutcome> = self
            .execute_all(submissions, database)
            .await
            .into_iter()
            .map(|(student, outcome)| (student, normalize(outcome)))
            .collect();

        let majority = find_majority(&outcomes);
        info!("Majority: {majority}");
        let verdicts = grade_against(&outcomes, &majority);

        let feedback = match &self.feedback {
            Some(generator) => generate_feedback(generator, submissions, &verdicts).await,
            None => BTreeMap::new(),
        };

        GradingReport {
            outcomes,
            majority,
            verdicts,
            feedback,
        }
    }
}

async fn generate_feedback(
    generator: &FeedbackGenerator,
    submissions: &[Submission],
    verdicts: &BTreeMap<String, Verdict>,
) -> BTreeMap<String, String> {
    let reference_query = submissions
        .iter()
        .find(|s| verdicts.get(&s.student) == Some(&Verdict::Ok))
        .and_then(Submission::sql);

    let mut feedback = BTreeMap::new();
    for submission in submissions {
        let Some(verdict) = verdicts.get(&submission.student).filter(|v| v.is_fail()) else {
            continue;
        };
        let request = FeedbackRequest {
            student: &submission.student,
            query: submission.sql().unwrap_or_default(),
            verdict,
            reference_query,
        };
        let text = generator.generate(&request).await;
        feedback.insert(submission.student.clone(), text);
    }
    feedback
}

/// Runs a complete grading pass and writes its reports.
///
/// Only discovery, provisioning and writing the results file can fail;
/// problems with individual submissions or with feedback are recorded in
/// the report instead.
pub async fn run_grading(
    settings: &GradeSettings,
    runner: &dyn QueryRunner,
) -> Result<GradingReport> {
    let submissions = discover_submissions(&settings.submissions_dir)?;

    info!("Provisioning {} from {}", settings.database.display(), settings.schema.display());
    let schema = SchemaSource::load(&settings.schema)?;
    let database = provision(&schema, settings.seed_mode, &settings.database).await?;

    info!(
        "Grading {} submissions from {}",
        submissions.len(),
        settings.submissions_dir.display()
    );

    let mut grader = Grader::new(runner, settings.timeout).with_jobs(settings.jobs);
    let mut client_error = None;
    if let Some(feedback) = &settings.feedback {
        match create_client(&feedback.client) {
            Ok(client) => {
                let generator = FeedbackGenerator::new(feedback.client.clone(), client)
                    .with_schema(schema.text());
                grader = grader.with_feedback(generator);
            }
            Err(e) => {
                warn!("Feedback disabled: {e}");
                client_error = Some(e);
            }
        }
    }

    let mut report = grader.grade(&submissions, &database).await;

    if let Some(e) = client_error {
        let text = placeholder(&e);
        report.feedback = report
            .verdicts
            .iter()
            .filter(|(_, verdict)| verdict.is_fail())
            .map(|(student, _)| (student.clone(), text.clone()))
            .collect();
    }

    write_results_csv(&settings.output, &report.verdicts)?;
    info!("Wrote {}", settings.output.display());

    if let Some(feedback) = &settings.feedback {
        match write_feedback_csv(&feedback.output, &report.feedback) {
            Ok(()) => info!("Wrote {}", feedback.output.display()),
            Err(e) => error!("Could not write feedback: {e}"),
        }
    }

    Ok(report)
}
