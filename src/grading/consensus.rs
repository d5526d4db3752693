//! Majority-consensus grading.
//!
//! There is no answer key. The row set shared by a strict majority of all
//! students is taken as the correct answer; everyone who produced it passes.

use crate::query::NormalizedOutcome;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Prefix that marks an error verdict in reports.
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Final grading decision for one student.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Matches the majority result.
    Ok,
    /// Produced rows that are not the majority result, or no majority exists.
    Fail,
    /// The query ran out of time.
    TimedOut,
    /// The query failed to run.
    Error(String),
}

impl Verdict {
    /// Returns true if the student's query produced rows but was rejected.
    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Fail => write!(f, "FAIL"),
            Self::TimedOut => write!(f, "TimedOut"),
            Self::Error(msg) => write!(f, "{ERROR_PREFIX}{msg}"),
        }
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "OK" => Ok(Self::Ok),
            "FAIL" => Ok(Self::Fail),
            "TimedOut" => Ok(Self::TimedOut),
            _ => s
                .strip_prefix(ERROR_PREFIX)
                .map(|msg| Self::Error(msg.to_string()))
                .ok_or_else(|| format!("Unknown verdict: {s}")),
        }
    }
}

/// The vote outcome over all normalized results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MajorityResult {
    /// The accepted row set, if more than half of all students produced it.
    pub value: Option<NormalizedOutcome>,
    /// How many students produced the most common row set.
    pub count: usize,
    /// Number of students, including those whose query failed.
    pub total: usize,
}

impl MajorityResult {
    /// Returns true if some row set was accepted as correct.
    pub fn is_accepted(&self) -> bool {
        self.value.is_some()
    }
}

impl fmt::Display for MajorityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_accepted() {
            write!(f, "accepted as correct ({}/{})", self.count, self.total)
        } else {
            write!(f, "no majority ({}/{})", self.count, self.total)
        }
    }
}

/// Finds the row set produced by a strict majority of students.
///
/// Row sets are counted in student-name order; when two are equally common
/// the first one seen is reported. A tie can never be a strict majority, so
/// this only affects the reported count.
pub fn find_majority(normalized: &BTreeMap<String, NormalizedOutcome>) -> MajorityResult {
    let total = normalized.len();

    let mut order: Vec<&NormalizedOutcome> = Vec::new();
    let mut counts: HashMap<&NormalizedOutcome, usize> = HashMap::new();
    for outcome in normalized.values().filter(|o| o.is_comparable()) {
        let count = counts.entry(outcome).or_insert(0);
        if *count == 0 {
            order.push(outcome);
        }
        *count += 1;
    }

    let mut best: Option<(&NormalizedOutcome, usize)> = None;
    for candidate in order {
        let count = counts.get(candidate).copied().unwrap_or(0);
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((candidate, count));
        }
    }

    match best {
        Some((value, count)) if count * 2 > total => MajorityResult {
            value: Some(value.clone()),
            count,
            total,
        },
        Some((_, count)) => MajorityResult {
            value: None,
            count,
            total,
        },
        None => MajorityResult {
            value: None,
            count: 0,
            total,
        },
    }
}

/// Decides one student's verdict from their outcome and the vote.
pub fn verdict_for(outcome: &NormalizedOutcome, majority: &MajorityResult) -> Verdict {
    match outcome {
        NormalizedOutcome::TimedOut => Verdict::TimedOut,
        NormalizedOutcome::Error(msg) => Verdict::Error(msg.clone()),
        rows if majority.value.as_ref() == Some(rows) => Verdict::Ok,
        NormalizedOutcome::RowSet(_) => Verdict::Fail,
    }
}

/// Grades every student against the majority result.
pub fn grade(normalized: &BTreeMap<String, NormalizedOutcome>) -> BTreeMap<String, Verdict> {
    let majority = find_majority(normalized);
    info!("Majority: {majority}");
    grade_against(normalized, &majority)
}

/// Grades every student against an already computed majority.
pub fn grade_against(
    normalized: &BTreeMap<String, NormalizedOutcome>,
    majority: &MajorityResult,
) -> BTreeMap<String, Verdict> {
    normalized
        .iter()
        .map(|(student, outcome)| (student.clone(), verdict_for(outcome, majority)))
        .collect()
}
