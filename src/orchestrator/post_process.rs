//! Per-outcome handling: persistence, logging and reporting.
//!
//! Nothing here fails the run. A write error is logged and recorded on the
//! task's report, and the remaining tasks carry on.

use super::controller::emit;
use crate::model::{ActionKind, RunEvent, TaskOutcome, TaskReport};
use crate::storage::ResultStore;
use tokio::sync::mpsc::UnboundedSender;

/// Persist a completed task's output and turn any outcome into a report.
pub(crate) fn process_outcome(
    store: &ResultStore,
    action: ActionKind,
    outcome: TaskOutcome,
    events: &Option<UnboundedSender<RunEvent>>,
) -> TaskReport {
    let status = outcome.status();
    match outcome {
        TaskOutcome::Completed {
            task,
            output,
            exit_code,
            elapsed,
        } => {
            let command = task.command_line();
            match exit_code {
                Some(0) => tracing::info!(task = task.id, label = %task.label, ?elapsed, "completed"),
                code => tracing::warn!(
                    task = task.id,
                    label = %task.label,
                    ?elapsed,
                    exit_code = ?code,
                    "completed with non-zero exit status"
                ),
            }
            emit(events, RunEvent::TaskOutput {
                id: task.id,
                output: output.clone(),
            });

            let (path, error) = match store.save(action, &task, &output) {
                Ok(path) => {
                    tracing::info!(task = task.id, path = %path.display(), "result saved");
                    emit(events, RunEvent::Saved {
                        id: task.id,
                        path: path.clone(),
                    });
                    (Some(path), None)
                }
                Err(e) => {
                    tracing::error!(task = task.id, "{e}");
                    emit(events, RunEvent::Message(format!("Save failed: {e}")));
                    (None, Some(e.to_string()))
                }
            };

            TaskReport {
                id: task.id,
                label: task.label,
                command,
                status,
                exit_code,
                path,
                error,
            }
        }
        TaskOutcome::TimedOut { task } => {
            let command = task.command_line();
            tracing::warn!(task = task.id, label = %task.label, "exceeded time limit and was skipped: {command}");
            emit(events, RunEvent::Message(format!("Timed out: {command}")));
            TaskReport {
                id: task.id,
                label: task.label,
                command,
                status,
                exit_code: None,
                path: None,
                error: None,
            }
        }
        TaskOutcome::Failed { task, error } => {
            let command = task.command_line();
            tracing::error!(task = task.id, label = %task.label, "{error}");
            emit(events, RunEvent::Message(format!("Failed: {command}: {error}")));
            TaskReport {
                id: task.id,
                label: task.label,
                command,
                status,
                exit_code: None,
                path: None,
                error: Some(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrchestratorConfig, OutcomeStatus, Task};
    use std::time::Duration;

    fn task() -> Task {
        Task::new(
            3,
            vec!["freqtrade".into(), "backtesting".into(), "--strategy".into(), "beta".into()],
        )
    }

    #[test]
    fn completed_outcome_is_persisted() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ResultStore::new(&OrchestratorConfig::with_user_data_dir(tmp.path().into()));
        let outcome = TaskOutcome::Completed {
            task: task(),
            output: "result".into(),
            exit_code: Some(1),
            elapsed: Duration::from_millis(5),
        };

        let report = process_outcome(&store, ActionKind::BacktestAll, outcome, &None);

        assert_eq!(report.status, OutcomeStatus::Completed);
        assert_eq!(report.exit_code, Some(1));
        let path = report.path.unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("BacktestAll_beta_"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "result");
    }

    #[test]
    fn persistence_failure_is_recorded_not_raised() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = OrchestratorConfig::with_user_data_dir(tmp.path().into());
        cfg.results_dir = tmp.path().join("blocked");
        std::fs::write(&cfg.results_dir, "").unwrap();
        let store = ResultStore::new(&cfg);
        let outcome = TaskOutcome::Completed {
            task: task(),
            output: "result".into(),
            exit_code: Some(0),
            elapsed: Duration::ZERO,
        };

        let report = process_outcome(&store, ActionKind::BacktestAll, outcome, &None);

        assert_eq!(report.status, OutcomeStatus::Completed);
        assert!(report.path.is_none());
        assert!(report.error.is_some());
    }

    #[test]
    fn timed_out_and_failed_write_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ResultStore::new(&OrchestratorConfig::with_user_data_dir(tmp.path().into()));

        let timed_out = process_outcome(
            &store,
            ActionKind::HyperoptAll,
            TaskOutcome::TimedOut { task: task() },
            &None,
        );
        let failed = process_outcome(
            &store,
            ActionKind::HyperoptAll,
            TaskOutcome::Failed {
                task: task(),
                error: "no such file".into(),
            },
            &None,
        );

        assert_eq!(timed_out.status, OutcomeStatus::TimedOut);
        assert_eq!(failed.status, OutcomeStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("no such file"));
        assert!(!store.dir().exists());
    }
}
