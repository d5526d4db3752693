//! Result and feedback reports.

use super::consensus::{MajorityResult, Verdict};
use crate::error::{GraderError, Result};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

const RESULTS_HEADER: [&str; 2] = ["Student", "Result"];
const FEEDBACK_HEADER: [&str; 2] = ["Student", "Feedback"];

/// Writes one `Student,Result` row per student, sorted by student name.
pub fn write_results_csv(path: &Path, verdicts: &BTreeMap<String, Verdict>) -> Result<()> {
    let rows = verdicts
        .iter()
        .map(|(student, verdict)| (student.as_str(), verdict.to_string()));
    write_csv(path, RESULTS_HEADER, rows)
}

/// Reads a results file written by [`write_results_csv`].
pub fn read_results_csv(path: &Path) -> Result<BTreeMap<String, Verdict>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| GraderError::io(format!("Cannot open {}: {e}", path.display())))?;

    let mut verdicts = BTreeMap::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| GraderError::io(format!("Bad row in {}: {e}", path.display())))?;
        let (Some(student), Some(result)) = (record.get(0), record.get(1)) else {
            return Err(GraderError::io(format!(
                "Bad row in {}: expected 2 fields",
                path.display()
            )));
        };
        let verdict = result.parse::<Verdict>().map_err(GraderError::io)?;
        verdicts.insert(student.to_string(), verdict);
    }
    Ok(verdicts)
}

/// Writes one `Student,Feedback` row per student.
pub fn write_feedback_csv(path: &Path, feedback: &BTreeMap<String, String>) -> Result<()> {
    let rows = feedback
        .iter()
        .map(|(student, text)| (student.as_str(), text.clone()));
    write_csv(path, FEEDBACK_HEADER, rows)
}

fn write_csv<'a>(
    path: &Path,
    header: [&str; 2],
    rows: impl Iterator<Item = (&'a str, String)>,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| GraderError::io(format!("Cannot create {}: {e}", parent.display())))?;
    }

    let write_err = |e: csv::Error| GraderError::io(format!("Cannot write {}: {e}", path.display()));
    let mut writer = csv::Writer::from_path(path).map_err(write_err)?;
    writer.write_record(header).map_err(write_err)?;
    for (student, value) in rows {
        writer
            .write_record([student, value.as_str()])
            .map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| GraderError::io(format!("Cannot write {}: {e}", path.display())))?;
    Ok(())
}

/// Renders the console summary: one line per student, then the vote.
pub fn format_summary(verdicts: &BTreeMap<String, Verdict>, majority: &MajorityResult) -> String {
    let mut out = String::new();
    if verdicts.is_empty() {
        out.push_str("No submissions found.\n");
        return out;
    }

    let width = verdicts.keys().map(|s| s.chars().count()).max().unwrap_or(0);
    for (student, verdict) in verdicts {
        let _ = writeln!(out, "{student:<width$}  {verdict}");
    }

    let ok = verdicts.values().filter(|v| **v == Verdict::Ok).count();
    let _ = writeln!(out);
    let _ = writeln!(out, "Majority result: {majority}");
    let _ = writeln!(out, "{ok} of {} submissions graded OK", verdicts.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::NormalizedOutcome;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn sample() -> BTreeMap<String, Verdict> {
        BTreeMap::from([
            ("carol".to_string(), Verdict::TimedOut),
            ("alice".to_string(), Verdict::Ok),
            ("bob".to_string(), Verdict::Fail),
            (
                "dave".to_string(),
                Verdict::Error("near \"FORM\": syntax error, \"quoted\"".to_string()),
            ),
        ])
    }

    #[test]
    fn test_results_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("results.csv");

        write_results_csv(&path, &sample()).unwrap();
        assert_eq!(read_results_csv(&path).unwrap(), sample());
    }

    #[test]
    fn test_results_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.csv");
        write_results_csv(&path, &sample()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Student,Result");
        assert_eq!(lines[1], "alice,OK");
        assert_eq!(lines[2], "bob,FAIL");
        assert_eq!(lines[3], "carol,TimedOut");
        assert!(lines[4].starts_with("dave,\"ERROR: "));
    }

    #[test]
    fn test_empty_results_has_header_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.csv");
        write_results_csv(&path, &BTreeMap::new()).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Student,Result\n");
        assert!(read_results_csv(&path).unwrap().is_empty());
    }

    #[test]
    fn test_feedback_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feedback.csv");
        let feedback = BTreeMap::from([(
            "bob".to_string(),
            "You forgot the WHERE clause,\nso every row matched.".to_string(),
        )]);
        write_feedback_csv(&path, &feedback).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let header: Vec<&str> = reader.headers().unwrap().iter().collect();
        assert_eq!(header, vec!["Student", "Feedback"]);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1], "You forgot the WHERE clause,\nso every row matched.");
    }

    #[test]
    fn test_summary_lists_students_and_majority() {
        let majority = MajorityResult {
            value: Some(NormalizedOutcome::RowSet(BTreeSet::new())),
            count: 1,
            total: 1,
        };
        let verdicts = BTreeMap::from([("alice".to_string(), Verdict::Ok)]);
        let summary = format_summary(&verdicts, &majority);
        assert!(summary.contains("alice  OK"));
        assert!(summary.contains("accepted as correct (1/1)"));
        assert!(summary.contains("1 of 1 submissions graded OK"));
    }

    #[test]
    fn test_summary_without_submissions() {
        let majority = MajorityResult {
            value: None,
            count: 0,
            total: 0,
        };
        assert_eq!(
            format_summary(&BTreeMap::new(), &majority),
            "No submissions found.\n"
        );
    }
}
