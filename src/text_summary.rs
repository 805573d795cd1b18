//! Run summary builder for CLI output.
//!
//! Counts outcomes and formats one human-readable line per task, or a JSON
//! document when machine-readable output is requested.

use crate::model::{ActionKind, OutcomeStatus, TaskReport};
use anyhow::Result;
use serde::Serialize;
use std::time::Duration;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RunSummary<'a> {
    pub action: ActionKind,
    pub finished_at: String,
    pub elapsed_ms: u64,
    pub tasks: &'a [TaskReport],
}

/// Build a text summary from the reports of one run.
pub(crate) fn build_text_summary(
    action: ActionKind,
    reports: &[TaskReport],
    elapsed: Duration,
) -> TextSummary {
    let count = |status: OutcomeStatus| reports.iter().filter(|r| r.status == status).count();
    let mut lines = vec![format!(
        "{action}: {} task(s), {} completed, {} timed out, {} failed in {:.1}s",
        reports.len(),
        count(OutcomeStatus::Completed),
        count(OutcomeStatus::TimedOut),
        count(OutcomeStatus::Failed),
        elapsed.as_secs_f64()
    )];

    let mut sorted: Vec<&TaskReport> = reports.iter().collect();
    sorted.sort_by_key(|r| r.id);
    for r in sorted {
        let line = match r.status {
            OutcomeStatus::Completed => {
                let exit = match r.exit_code {
                    Some(0) => String::new(),
                    Some(code) => format!(" (exit {code})"),
                    None => " (no exit code)".to_string(),
                };
                match (&r.path, &r.error) {
                    (Some(path), _) => format!("  [completed] {}{exit} -> {}", r.label, path.display()),
                    (None, Some(err)) => format!("  [completed] {}{exit}, not saved: {err}", r.label),
                    (None, None) => format!("  [completed] {}{exit}", r.label),
                }
            }
            OutcomeStatus::TimedOut => format!("  [timed out] {}: {}", r.label, r.command),
            OutcomeStatus::Failed => format!(
                "  [failed] {}: {}",
                r.label,
                r.error.as_deref().unwrap_or("unknown error")
            ),
        };
        lines.push(line);
    }

    TextSummary { lines }
}

pub(crate) fn build_json_summary(
    action: ActionKind,
    reports: &[TaskReport],
    elapsed: Duration,
) -> Result<String> {
    let summary = RunSummary {
        action,
        finished_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into()),
        elapsed_ms: elapsed.as_millis() as u64,
        tasks: reports,
    };
    Ok(serde_json::to_string_pretty(&summary)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report(id: usize, label: &str, status: OutcomeStatus) -> TaskReport {
        TaskReport {
            id,
            label: label.into(),
            command: format!("freqtrade backtesting --strategy {label}"),
            status,
            exit_code: None,
            path: None,
            error: None,
        }
    }

    #[test]
    fn text_summary_counts_and_orders_by_id() {
        let mut done = report(0, "alpha", OutcomeStatus::Completed);
        done.exit_code = Some(0);
        done.path = Some(PathBuf::from("/r/BacktestAll_alpha.txt"));
        let mut failed = report(2, "gamma", OutcomeStatus::Failed);
        failed.error = Some("failed to launch".into());
        let reports = vec![failed, report(1, "beta", OutcomeStatus::TimedOut), done];

        let summary = build_text_summary(ActionKind::BacktestAll, &reports, Duration::from_secs(2));

        assert_eq!(
            summary.lines[0],
            "BacktestAll: 3 task(s), 1 completed, 1 timed out, 1 failed in 2.0s"
        );
        assert_eq!(summary.lines[1], "  [completed] alpha -> /r/BacktestAll_alpha.txt");
        assert!(summary.lines[2].starts_with("  [timed out] beta"));
        assert_eq!(summary.lines[3], "  [failed] gamma: failed to launch");
    }

    #[test]
    fn json_summary_lists_tasks() {
        let reports = vec![report(0, "general", OutcomeStatus::Completed)];
        let json = build_json_summary(ActionKind::DownloadData, &reports, Duration::from_millis(1500))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["action"], "DownloadData");
        assert_eq!(value["elapsed_ms"], 1500);
        assert!(value["finished_at"].is_string());
        let tasks = value["tasks"].as_array().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0]["label"], "general");
        assert_eq!(tasks[0]["status"], "completed");
        for key in ["id", "command", "exit_code", "path", "error"] {
            assert!(tasks[0].get(key).is_some(), "missing {key}");
        }
    }
}
