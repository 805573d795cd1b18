//! Sequential and pooled execution of tasks.

use super::post_process::process_outcome;
use crate::engine;
use crate::model::{ActionKind, OrchestratorConfig, RunEvent, Task, TaskOutcome, TaskReport, TimeoutPolicy};
use crate::storage::ResultStore;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;

pub(crate) struct Orchestrator {
    cfg: Arc<OrchestratorConfig>,
    store: ResultStore,
    events: Option<UnboundedSender<RunEvent>>,
}

impl Orchestrator {
    pub(crate) fn new(cfg: OrchestratorConfig) -> Self {
        let store = ResultStore::new(&cfg);
        Self {
            cfg: Arc::new(cfg),
            store,
            events: None,
        }
    }

    /// Forward progress events (task start, output, saved paths) to `tx`.
    pub(crate) fn with_events(mut self, tx: UnboundedSender<RunEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Execute `tasks` for `action` and return one report per task.
    ///
    /// Batch actions use the worker pool; everything else runs in order.
    pub(crate) async fn run(&self, action: ActionKind, tasks: Vec<Task>) -> Vec<TaskReport> {
        tracing::info!(
            %action,
            tasks = tasks.len(),
            batch = action.is_batch(),
            results = %self.store.dir().display(),
            "starting run"
        );
        if action.is_batch() {
            self.run_parallel(action, tasks).await
        } else {
            self.run_sequential(action, tasks).await
        }
    }

    /// One task at a time in submission order, no timeout.
    pub(crate) async fn run_sequential(&self, action: ActionKind, tasks: Vec<Task>) -> Vec<TaskReport> {
        let mut reports = Vec::with_capacity(tasks.len());
        for task in tasks {
            emit(&self.events, RunEvent::TaskStarted {
                id: task.id,
                command: task.command_line(),
            });
            tracing::info!(task = task.id, program = task.program(), label = %task.label, "running");
            let outcome = engine::execute(task, false).await;
            reports.push(process_outcome(&self.store, action, outcome, &self.events));
        }
        reports
    }

    /// All tasks submitted at once to a pool of `pool_size` slots. Each task
    /// gets its own deadline counted from submission; outcomes are handled in
    /// completion order.
    pub(crate) async fn run_parallel(&self, action: ActionKind, tasks: Vec<Task>) -> Vec<TaskReport> {
        let slots = Arc::new(Semaphore::new(self.cfg.pool_size.max(1)));
        let limit = self.cfg.task_timeout;
        let kill = self.cfg.timeout_policy == TimeoutPolicy::Kill;
        let total = tasks.len();
        let mut pending = FuturesUnordered::new();

        for task in tasks {
            let slots = slots.clone();
            let events = self.events.clone();
            let worker_task = task.clone();
            let expired = Arc::new(AtomicBool::new(false));
            let worker_expired = expired.clone();
            let handle = tokio::spawn(async move {
                // Held until the process exits, even after a soft timeout.
                let _permit = slots.acquire_owned().await;
                // Already reported TimedOut while queued: never launch.
                if worker_expired.load(Ordering::Acquire) {
                    tracing::debug!(task = worker_task.id, "expired before start, skipping launch");
                    return TaskOutcome::TimedOut { task: worker_task };
                }
                emit(&events, RunEvent::TaskStarted {
                    id: worker_task.id,
                    command: worker_task.command_line(),
                });
                tracing::info!(task = worker_task.id, label = %worker_task.label, "running");
                engine::execute(worker_task, kill).await
            });
            let abort = handle.abort_handle();
            // Deadline is fixed here, at submission.
            let deadline = tokio::time::timeout(limit, handle);
            tracing::debug!(task = task.id, "submitted");

            pending.push(async move {
                match deadline.await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(join_err)) => TaskOutcome::Failed {
                        error: format!("worker failed: {join_err}"),
                        task,
                    },
                    Err(_) => {
                        expired.store(true, Ordering::Release);
                        if kill {
                            abort.abort();
                        }
                        TaskOutcome::TimedOut { task }
                    }
                }
            });
        }

        let mut reports = Vec::with_capacity(total);
        while let Some(outcome) = pending.next().await {
            tracing::debug!(task = outcome.task().id, done = reports.len() + 1, total, "outcome");
            reports.push(process_outcome(&self.store, action, outcome, &self.events));
        }
        reports
    }
}

pub(super) fn emit(events: &Option<UnboundedSender<RunEvent>>, event: RunEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
