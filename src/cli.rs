use crate::catalog;
use crate::command;
use crate::error::ConfigError;
use crate::model::{ActionKind, OrchestratorConfig, RunEvent, RunParameters, TimeoutPolicy};
use crate::orchestrator::Orchestrator;
use crate::resolver::{self, Catalog, Prompter};
use crate::storage::filename::min_filename_len;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
#[derive(Debug, PartialEq, Eq)]
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "freqtrade-batch",
    version,
    about = "Run freqtrade backtests, hyperopts and downloads in batches and keep every result"
)]
pub struct Cli {
    /// Program invoked for every task
    #[arg(long, global = true)]
    pub program: Option<String>,

    /// freqtrade user_data directory (default: ~/freqtrade/user_data)
    #[arg(long, global = true)]
    pub user_data_dir: Option<PathBuf>,

    /// Directory holding strategy *.py files
    #[arg(long, global = true)]
    pub strategies_dir: Option<PathBuf>,

    /// Directory holding *.json config files
    #[arg(long, global = true)]
    pub configs_dir: Option<PathBuf>,

    /// Directory where result files are written
    #[arg(long, global = true)]
    pub results_dir: Option<PathBuf>,

    /// Concurrent tasks for --all runs
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Per-task time limit for --all runs, counted from submission
    #[arg(long, global = true)]
    pub task_timeout: Option<humantime::Duration>,

    /// Kill a task's process when it exceeds the time limit
    #[arg(long, global = true)]
    pub kill_on_timeout: bool,

    /// JSON settings file; explicit flags override its values
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Do not echo command output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Print a JSON summary on stdout instead of command output
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: ActionCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ActionCommand {
    /// Download market data
    Download {
        #[command(flatten)]
        config: ConfigArg,
        /// One or more timeframes, e.g. "1m 5m 15m"
        #[arg(long)]
        timeframe: Option<String>,
        #[arg(long)]
        timerange: Option<String>,
    },
    /// Backtest one strategy or every strategy in parallel
    Backtest {
        #[command(flatten)]
        config: ConfigArg,
        #[command(flatten)]
        selection: StrategySelection,
        #[arg(long)]
        timeframe: Option<String>,
        #[arg(long)]
        timerange: Option<String>,
    },
    /// Hyperopt one strategy or every strategy in parallel
    Hyperopt {
        #[command(flatten)]
        config: ConfigArg,
        #[command(flatten)]
        selection: StrategySelection,
        #[arg(long = "hyperopt-loss")]
        loss: Option<String>,
        /// Spaces to optimize, e.g. "roi stoploss"
        #[arg(long)]
        spaces: Option<String>,
        #[arg(short, long)]
        epochs: Option<u32>,
        #[arg(long)]
        timeframe: Option<String>,
        #[arg(long)]
        timerange: Option<String>,
    },
    /// Start trading with a strategy
    Trade {
        #[command(flatten)]
        config: ConfigArg,
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Plot profit for a strategy
    Plot {
        #[command(flatten)]
        config: ConfigArg,
        #[arg(long)]
        strategy: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        /// Currency pair(s), e.g. "LTC/USDT"
        #[arg(long)]
        pairs: Option<String>,
        #[arg(long)]
        timerange: Option<String>,
    },
    /// Choose everything from numbered menus
    Menu,
}

#[derive(Debug, Args, Clone)]
pub struct ConfigArg {
    /// Config file name inside the configs directory, or a path
    #[arg(long)]
    pub config: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct StrategySelection {
    /// Single strategy name
    #[arg(long, conflicts_with = "all")]
    pub strategy: Option<String>,
    /// Every strategy found in the strategies directory
    #[arg(long)]
    pub all: bool,
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args)?;
    let (action, params) = resolve(&args.command, &cfg).await?;
    let tasks = command::build_tasks(&cfg.program, action, &params)
        .context("cannot build commands")?;

    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<RunEvent>();
    let echo_output = !args.quiet && !args.json;
    let labels: Vec<String> = tasks.iter().map(|t| t.label.clone()).collect();
    let forward = |ev: RunEvent| {
        if let Some(line) = render_event(ev, &labels, echo_output) {
            let _ = out_tx.send(line);
        }
    };

    let orchestrator = Orchestrator::new(cfg).with_events(evt_tx);
    let start = Instant::now();
    let run = orchestrator.run(action, tasks);
    tokio::pin!(run);

    // Workers left running after a soft timeout keep a sender alive, so the
    // run future, not channel closure, decides when we are done.
    let reports = loop {
        tokio::select! {
            reports = &mut run => break reports,
            Some(ev) = evt_rx.recv() => forward(ev),
        }
    };
    while let Ok(ev) = evt_rx.try_recv() {
        forward(ev);
    }
    let elapsed = start.elapsed();

    if args.json {
        let json = crate::text_summary::build_json_summary(action, &reports, elapsed)?;
        let _ = out_tx.send(OutputLine::Stdout(json));
    } else {
        let summary = crate::text_summary::build_text_summary(action, &reports, elapsed);
        for line in summary.lines {
            let _ = out_tx.send(OutputLine::Stderr(line));
        }
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

/// Turn a progress event into a console line tagged with the task's label.
fn render_event(ev: RunEvent, labels: &[String], echo_output: bool) -> Option<OutputLine> {
    let tag = |id: usize| labels.get(id).map(String::as_str).unwrap_or("?");
    let line = match ev {
        RunEvent::TaskStarted { id, command } => {
            OutputLine::Stderr(format!("[{}] Executing command: {command}", tag(id)))
        }
        RunEvent::TaskOutput { id, output } => {
            if !echo_output {
                return None;
            }
            let tag = tag(id);
            let tagged: Vec<String> = output.lines().map(|l| format!("[{tag}] {l}")).collect();
            OutputLine::Stdout(tagged.join("\n"))
        }
        RunEvent::Saved { id, path } => OutputLine::Stderr(format!(
            "[{}] Result saved to file: {}",
            tag(id),
            path.display()
        )),
        RunEvent::Message(msg) => OutputLine::Stderr(msg),
    };
    Some(line)
}

/// Resolve the settings for this run: defaults or `--settings`, then flags.
pub fn build_config(args: &Cli) -> Result<OrchestratorConfig> {
    let mut cfg = match args.settings.as_deref() {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read settings {}", path.display()))?;
            serde_json::from_str::<OrchestratorConfig>(&raw)
                .with_context(|| format!("failed to parse settings {}", path.display()))?
        }
        None => OrchestratorConfig::default(),
    };

    if let Some(ud) = args.user_data_dir.as_ref() {
        cfg.strategies_dir = ud.join("strategies");
        cfg.configs_dir = ud.join("configs");
        cfg.results_dir = ud.join("results");
    }
    if let Some(dir) = args.strategies_dir.clone() {
        cfg.strategies_dir = dir;
    }
    if let Some(dir) = args.configs_dir.clone() {
        cfg.configs_dir = dir;
    }
    if let Some(dir) = args.results_dir.clone() {
        cfg.results_dir = dir;
    }
    if let Some(program) = args.program.clone() {
        cfg.program = program;
    }
    if let Some(workers) = args.workers {
        cfg.pool_size = workers;
    }
    if let Some(timeout) = args.task_timeout {
        cfg.task_timeout = Duration::from(timeout);
    }
    if args.kill_on_timeout {
        cfg.timeout_policy = TimeoutPolicy::Kill;
    }

    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn validate_config(cfg: &OrchestratorConfig) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::InvalidSettings { message };
    if cfg.program.trim().is_empty() {
        return Err(invalid("program must not be empty".into()));
    }
    if cfg.pool_size == 0 {
        return Err(invalid("pool size must be at least 1".into()));
    }
    if cfg.task_timeout.is_zero() {
        return Err(invalid("task timeout must be greater than zero".into()));
    }
    let ext = &cfg.result_extension;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid(format!(
            "result extension {ext:?} must be non-empty ASCII letters and digits"
        )));
    }
    let min = min_filename_len(ext);
    if cfg.max_filename_len < min {
        return Err(invalid(format!(
            "max filename length {} is below the minimum of {min}",
            cfg.max_filename_len
        )));
    }
    Ok(())
}

/// Turn the chosen subcommand into an action and its parameters.
async fn resolve(
    command: &ActionCommand,
    cfg: &OrchestratorConfig,
) -> Result<(ActionKind, RunParameters)> {
    let config_path = |arg: &ConfigArg| arg.config.as_ref().map(|name| cfg.configs_dir.join(name));

    let resolved = match command {
        ActionCommand::Download {
            config,
            timeframe,
            timerange,
        } => (
            ActionKind::DownloadData,
            RunParameters {
                config_path: config_path(config),
                timeframe: timeframe.clone(),
                timerange: timerange.clone(),
                ..Default::default()
            },
        ),
        ActionCommand::Backtest {
            config,
            selection,
            timeframe,
            timerange,
        } => {
            let (action, strategies) =
                select_strategies(selection, cfg, ActionKind::BacktestAll, ActionKind::BacktestOne)?;
            (
                action,
                RunParameters {
                    config_path: config_path(config),
                    strategies,
                    timeframe: timeframe.clone(),
                    timerange: timerange.clone(),
                    ..Default::default()
                },
            )
        }
        ActionCommand::Hyperopt {
            config,
            selection,
            loss,
            spaces,
            epochs,
            timeframe,
            timerange,
        } => {
            let (action, strategies) =
                select_strategies(selection, cfg, ActionKind::HyperoptAll, ActionKind::HyperoptOne)?;
            (
                action,
                RunParameters {
                    config_path: config_path(config),
                    strategies,
                    timeframe: timeframe.clone(),
                    timerange: timerange.clone(),
                    hyperopt_loss: loss.clone(),
                    spaces: spaces.clone(),
                    epochs: *epochs,
                    ..Default::default()
                },
            )
        }
        ActionCommand::Trade { config, strategy } => (
            ActionKind::Trade,
            RunParameters {
                config_path: config_path(config),
                strategies: strategy.iter().cloned().collect(),
                ..Default::default()
            },
        ),
        ActionCommand::Plot {
            config,
            strategy,
            timeframe,
            pairs,
            timerange,
        } => (
            ActionKind::Plot,
            RunParameters {
                config_path: config_path(config),
                strategies: strategy.iter().cloned().collect(),
                timeframe: timeframe.clone(),
                timerange: timerange.clone(),
                pairs: pairs.clone(),
                ..Default::default()
            },
        ),
        ActionCommand::Menu => resolve_from_menus(cfg).await?,
    };
    Ok(resolved)
}

fn select_strategies(
    selection: &StrategySelection,
    cfg: &OrchestratorConfig,
    all: ActionKind,
    one: ActionKind,
) -> Result<(ActionKind, Vec<String>)> {
    if selection.all {
        let strategies = catalog::strategy_names(&cfg.strategies_dir)?;
        return Ok((all, strategies));
    }
    match selection.strategy.clone() {
        Some(name) => Ok((one, vec![name])),
        None => Err(ConfigError::MissingField {
            action: one.as_str(),
            field: "--strategy or --all",
        }
        .into()),
    }
}

async fn resolve_from_menus(cfg: &OrchestratorConfig) -> Result<(ActionKind, RunParameters)> {
    let strategies = catalog::strategy_names(&cfg.strategies_dir)?;
    let configs = catalog::config_files(&cfg.configs_dir)?;
    let configs_dir = cfg.configs_dir.clone();

    // stdin is blocking; keep it off the async workers
    tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        let mut prompter = Prompter::new(stdin.lock(), std::io::stdout());
        resolver::resolve_interactive(
            &mut prompter,
            &Catalog {
                strategies: &strategies,
                configs: &configs,
                configs_dir: &configs_dir,
            },
        )
    })
    .await
    .context("menu task failed")?
}
