//! Runs a single task as an external process.

mod output;

use crate::error::LaunchError;
use crate::model::{Task, TaskOutcome};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Captured result of a process that was started and ran to exit.
#[derive(Debug)]
pub struct Execution {
    pub output: String,
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

/// Run `task` to completion and classify the result.
///
/// A non-zero exit status is still `Completed`; only a failure to start
/// the process is `Failed`.
pub async fn execute(task: Task, kill_on_drop: bool) -> TaskOutcome {
    match run_process(&task, kill_on_drop).await {
        Ok(exec) => TaskOutcome::Completed {
            task,
            output: exec.output,
            exit_code: exec.exit_code,
            elapsed: exec.elapsed,
        },
        Err(e) => TaskOutcome::Failed {
            error: e.to_string(),
            task,
        },
    }
}

/// Spawn the task's argv with stdin closed and stdout/stderr merged, and
/// wait until the process exits and both streams are drained.
pub async fn run_process(task: &Task, kill_on_drop: bool) -> Result<Execution, LaunchError> {
    let (program, args) = task.argv.split_first().ok_or_else(|| LaunchError {
        program: String::new(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argument vector"),
    })?;

    let start = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(kill_on_drop)
        .spawn()
        .map_err(|source| LaunchError {
            program: program.clone(),
            source,
        })?;
    tracing::debug!(task = task.id, pid = ?child.id(), "process started");

    let output = output::read_merged(child.stdout.take(), child.stderr.take()).await;
    let exit_code = match child.wait().await {
        Ok(status) => status.code(),
        Err(e) => {
            tracing::warn!(task = task.id, "failed to collect exit status: {e}");
            None
        }
    };

    Ok(Execution {
        output,
        exit_code,
        elapsed: start.elapsed(),
    })
}
