//! Terminal and JSON rendering of a run's result log.

use std::path::Path;

use anyhow::{Context, Result};
use chatprobe_core::{RunOutcome, RunReport};
use chatprobe_proto::{TestCase, TestResult};
use colored::Colorize;
use serde::Serialize;

/// Renders one result: a status line plus one line per field mismatch.
pub fn render_result(result: &TestResult) -> String {
    let position = format!(
        "Interaction {}, response {}",
        result.interaction_index + 1,
        result.response_index + 1
    );

    if result.success {
        return format!("{} {}", "✓".green(), position);
    }

    let mut out = format!("{} {}", "✗".red(), position);
    if let Some(error) = &result.error {
        out.push_str(&format!(": {}", error.red()));
    }
    for detail in result.details.iter().flatten() {
        out.push_str(&format!(
            "\n    {}: expected {} but received {}",
            detail.field,
            format!("{:?}", detail.expected).green(),
            format!("{:?}", detail.received).red()
        ));
    }
    out
}

pub fn outcome_label(outcome: RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Passed => "passed",
        RunOutcome::Failed => "failed",
        RunOutcome::TimedOut => "timed out",
        RunOutcome::Disconnected => "disconnected",
    }
}

/// One-line summary of a finished run.
pub fn render_summary(report: &RunReport) -> String {
    let counts = format!(
        "{} passed, {} failed in {:.1}s",
        report.passed_count(),
        report.failed_count(),
        report.elapsed.as_secs_f64()
    );
    let label = outcome_label(report.outcome).to_uppercase();
    if report.outcome.is_success() {
        format!("{} {}", label.green().bold(), counts)
    } else {
        format!("{} {}", label.red().bold(), counts)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    test_id: &'a str,
    test_name: &'a str,
    outcome: &'static str,
    elapsed_ms: u64,
    passed: usize,
    failed: usize,
    results: &'a [TestResult],
}

/// Writes the result log of `report` as pretty JSON.
pub fn write_json_report(path: &Path, case: &TestCase, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(&JsonReport {
        test_id: &case.id,
        test_name: &case.name,
        outcome: outcome_label(report.outcome),
        elapsed_ms: u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
        passed: report.passed_count(),
        failed: report.failed_count(),
        results: &report.results,
    })?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("failed to write report {}", path.display()))
}
