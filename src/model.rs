use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Label used when an invocation carries no `--strategy` argument.
pub const GENERAL_LABEL: &str = "general";

/// Fields missing from a settings file take their [`Default`] values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// External program placed at argv[0] of every task
    pub program: String,
    pub strategies_dir: PathBuf,
    pub configs_dir: PathBuf,
    pub results_dir: PathBuf,
    pub pool_size: usize,
    /// Measured from submission, not from process start
    #[serde(with = "humantime_serde")]
    pub task_timeout: Duration,
    pub timeout_policy: TimeoutPolicy,
    pub max_filename_len: usize,
    pub result_extension: String,
}

impl OrchestratorConfig {
    pub fn with_user_data_dir(user_data: PathBuf) -> Self {
        Self {
            program: "freqtrade".into(),
            strategies_dir: user_data.join("strategies"),
            configs_dir: user_data.join("configs"),
            results_dir: user_data.join("results"),
            pool_size: 4,
            task_timeout: Duration::from_secs(300),
            timeout_policy: TimeoutPolicy::Soft,
            max_filename_len: 180,
            result_extension: "txt".into(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::with_user_data_dir(default_user_data_dir())
    }
}

/// `$HOME/freqtrade/user_data`, or `./user_data` without a home directory.
pub fn default_user_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("freqtrade").join("user_data"))
        .unwrap_or_else(|| PathBuf::from("user_data"))
}

/// What happens to the external process once its task is reported timed out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Stop waiting; the process keeps running and keeps its pool slot.
    #[default]
    Soft,
    /// Stop waiting and kill the process.
    Kill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    DownloadData,
    BacktestAll,
    BacktestOne,
    HyperoptAll,
    HyperoptOne,
    Trade,
    Plot,
}

impl ActionKind {
    /// Name used as the leading component of result filenames.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::DownloadData => "DownloadData",
            ActionKind::BacktestAll => "BacktestAll",
            ActionKind::BacktestOne => "BacktestOne",
            ActionKind::HyperoptAll => "HyperoptAll",
            ActionKind::HyperoptOne => "HyperoptOne",
            ActionKind::Trade => "Trade",
            ActionKind::Plot => "Plot",
        }
    }

    /// Batch actions fan out over the catalog and run under the worker pool.
    pub fn is_batch(self) -> bool {
        matches!(self, ActionKind::BacktestAll | ActionKind::HyperoptAll)
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved parameters for one run. Fields not used by the active action stay `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunParameters {
    pub config_path: Option<PathBuf>,
    #[serde(default)]
    pub strategies: Vec<String>,
    pub timeframe: Option<String>,
    pub timerange: Option<String>,
    pub hyperopt_loss: Option<String>,
    pub spaces: Option<String>,
    pub epochs: Option<u32>,
    pub pairs: Option<String>,
}

/// One external-process invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: usize,
    pub argv: Vec<String>,
    pub label: String,
}

impl Task {
    pub fn new(id: usize, argv: Vec<String>) -> Self {
        let label = extract_label(&argv);
        Self { id, argv, label }
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    /// Shell-quoted rendering of the argument vector.
    pub fn command_line(&self) -> String {
        shlex::try_join(self.argv.iter().map(String::as_str))
            .unwrap_or_else(|_| self.argv.join(" "))
    }
}

/// Value following the first `--strategy` token, or [`GENERAL_LABEL`].
pub fn extract_label(argv: &[String]) -> String {
    argv.iter()
        .position(|a| a == "--strategy")
        .and_then(|i| argv.get(i + 1))
        .cloned()
        .unwrap_or_else(|| GENERAL_LABEL.to_string())
}

#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Completed {
        task: Task,
        output: String,
        /// Informational only; a non-zero exit is still a completion.
        exit_code: Option<i32>,
        elapsed: Duration,
    },
    TimedOut {
        task: Task,
    },
    Failed {
        task: Task,
        error: String,
    },
}

impl TaskOutcome {
    pub fn task(&self) -> &Task {
        match self {
            TaskOutcome::Completed { task, .. }
            | TaskOutcome::TimedOut { task }
            | TaskOutcome::Failed { task, .. } => task,
        }
    }

    pub fn status(&self) -> OutcomeStatus {
        match self {
            TaskOutcome::Completed { .. } => OutcomeStatus::Completed,
            TaskOutcome::TimedOut { .. } => OutcomeStatus::TimedOut,
            TaskOutcome::Failed { .. } => OutcomeStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    TimedOut,
    Failed,
}

/// Per-task record emitted once the outcome has been handed to the store.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub id: usize,
    pub label: String,
    pub command: String,
    pub status: OutcomeStatus,
    pub exit_code: Option<i32>,
    pub path: Option<PathBuf>,
    pub error: Option<String>,
}

/// Progress events for presentation layers.
#[derive(Debug, Clone)]
pub enum RunEvent {
    TaskStarted { id: usize, command: String },
    TaskOutput { id: usize, output: String },
    Saved { id: usize, path: PathBuf },
    Message(String),
}
