//! Turns an action and its resolved parameters into argument vectors.
//!
//! Output is always a literal argv; nothing here is ever handed to a shell.
//! Multi-value fields (timeframes, timerange, spaces, pairs) are split with
//! POSIX shell-word rules so `"1m 5m 15m"` becomes three tokens.

use crate::error::ConfigError;
use crate::model::{ActionKind, RunParameters, Task};

/// Build every task for `action`. Batch actions yield one task per strategy.
pub fn build_tasks(
    program: &str,
    action: ActionKind,
    params: &RunParameters,
) -> Result<Vec<Task>, ConfigError> {
    let builder = Builder {
        program,
        action,
        params,
    };
    let argvs = match action {
        ActionKind::DownloadData => vec![builder.download_data()?],
        ActionKind::BacktestAll => builder
            .all_strategies()?
            .iter()
            .map(|s| builder.backtesting(s))
            .collect::<Result<_, _>>()?,
        ActionKind::BacktestOne => vec![builder.backtesting(builder.one_strategy()?)?],
        ActionKind::HyperoptAll => builder
            .all_strategies()?
            .iter()
            .map(|s| builder.hyperopt(s))
            .collect::<Result<_, _>>()?,
        ActionKind::HyperoptOne => vec![builder.hyperopt(builder.one_strategy()?)?],
        ActionKind::Trade => vec![builder.trade(builder.one_strategy()?)?],
        ActionKind::Plot => vec![builder.plot_profit(builder.one_strategy()?)?],
    };
    Ok(argvs
        .into_iter()
        .enumerate()
        .map(|(id, argv)| Task::new(id, argv))
        .collect())
}

struct Builder<'a> {
    program: &'a str,
    action: ActionKind,
    params: &'a RunParameters,
}

impl<'a> Builder<'a> {
    fn start(&self, subcommand: &str) -> Result<Vec<String>, ConfigError> {
        if self.program.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "program",
                message: "must not be empty".into(),
            });
        }
        Ok(vec![self.program.to_string(), subcommand.to_string()])
    }

    fn download_data(&self) -> Result<Vec<String>, ConfigError> {
        let mut argv = self.start("download-data")?;
        argv.extend(["--config".into(), self.config()?]);
        argv.push("--timeframe".into());
        argv.extend(self.words("timeframe", &self.params.timeframe)?);
        argv.push("--timerange".into());
        argv.extend(self.words("timerange", &self.params.timerange)?);
        Ok(argv)
    }

    fn backtesting(&self, strategy: &str) -> Result<Vec<String>, ConfigError> {
        let mut argv = self.start("backtesting")?;
        argv.extend(["--strategy".into(), strategy.to_string()]);
        argv.extend(["--config".into(), self.config()?]);
        argv.push("--timerange".into());
        argv.extend(self.words("timerange", &self.params.timerange)?);
        argv.push("--timeframe".into());
        argv.extend(self.words("timeframe", &self.params.timeframe)?);
        Ok(argv)
    }

    fn hyperopt(&self, strategy: &str) -> Result<Vec<String>, ConfigError> {
        let mut argv = self.start("hyperopt")?;
        argv.extend(["--strategy".into(), strategy.to_string()]);
        argv.extend([
            "--hyperopt-loss".into(),
            self.token("hyperopt loss", &self.params.hyperopt_loss)?,
        ]);
        argv.push("--spaces".into());
        argv.extend(self.words("spaces", &self.params.spaces)?);
        argv.push("--timerange".into());
        argv.extend(self.words("timerange", &self.params.timerange)?);
        argv.extend(["-e".into(), self.epochs()?.to_string()]);
        argv.extend(["--config".into(), self.config()?]);
        argv.push("--timeframe".into());
        argv.extend(self.words("timeframe", &self.params.timeframe)?);
        Ok(argv)
    }

    fn trade(&self, strategy: &str) -> Result<Vec<String>, ConfigError> {
        let mut argv = self.start("trade")?;
        argv.extend(["--strategy".into(), strategy.to_string()]);
        argv.extend(["--config".into(), self.config()?]);
        Ok(argv)
    }

    fn plot_profit(&self, strategy: &str) -> Result<Vec<String>, ConfigError> {
        let mut argv = self.start("plot-profit")?;
        argv.extend(["--strategy".into(), strategy.to_string()]);
        argv.extend(["--config".into(), self.config()?]);
        argv.push("--timeframe".into());
        argv.extend(self.words("timeframe", &self.params.timeframe)?);
        argv.push("--pairs".into());
        argv.extend(self.words("pairs", &self.params.pairs)?);
        argv.push("--timerange".into());
        argv.extend(self.words("timerange", &self.params.timerange)?);
        Ok(argv)
    }

    fn missing(&self, field: &'static str) -> ConfigError {
        ConfigError::MissingField {
            action: self.action.as_str(),
            field,
        }
    }

    fn config(&self) -> Result<String, ConfigError> {
        match self.params.config_path.as_deref() {
            Some(p) if !p.as_os_str().is_empty() => Ok(p.display().to_string()),
            _ => Err(self.missing("config file")),
        }
    }

    fn epochs(&self) -> Result<u32, ConfigError> {
        match self.params.epochs {
            Some(0) => Err(ConfigError::InvalidValue {
                field: "epochs",
                message: "must be at least 1".into(),
            }),
            Some(n) => Ok(n),
            None => Err(self.missing("epochs")),
        }
    }

    /// A single-token identifier such as a loss function name.
    fn token(&self, field: &'static str, value: &Option<String>) -> Result<String, ConfigError> {
        match value.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(self.missing(field)),
        }
    }

    fn words(&self, field: &'static str, value: &Option<String>) -> Result<Vec<String>, ConfigError> {
        let raw = value.as_deref().ok_or_else(|| self.missing(field))?;
        let words = shlex::split(raw).ok_or_else(|| ConfigError::InvalidValue {
            field,
            message: format!("unbalanced quoting in {raw:?}"),
        })?;
        if words.is_empty() {
            return Err(self.missing(field));
        }
        Ok(words)
    }

    fn one_strategy(&self) -> Result<&'a str, ConfigError> {
        match self.params.strategies.as_slice() {
            [only] if !only.trim().is_empty() => Ok(only.trim()),
            [] => Err(self.missing("strategy")),
            [_] => Err(ConfigError::InvalidValue {
                field: "strategy",
                message: "must not be empty".into(),
            }),
            many => Err(ConfigError::InvalidValue {
                field: "strategy",
                message: format!("expected exactly one, got {}", many.len()),
            }),
        }
    }

    fn all_strategies(&self) -> Result<&'a [String], ConfigError> {
        let strategies = self.params.strategies.as_slice();
        if strategies.is_empty() {
            return Err(ConfigError::NoStrategies {
                action: self.action.as_str(),
            });
        }
        if strategies.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "strategy",
                message: "must not be empty".into(),
            });
        }
        Ok(strategies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn backtest_params(strategies: &[&str]) -> RunParameters {
        RunParameters {
            config_path: Some(PathBuf::from("/ud/configs/config.json")),
            strategies: strategies.iter().map(|s| s.to_string()).collect(),
            timeframe: Some("1h".into()),
            timerange: Some("20240601-20240825".into()),
            ..Default::default()
        }
    }

    fn hyperopt_params(strategies: &[&str]) -> RunParameters {
        RunParameters {
            hyperopt_loss: Some("SharpeHyperOptLoss".into()),
            spaces: Some("roi stoploss".into()),
            epochs: Some(100),
            ..backtest_params(strategies)
        }
    }

    #[test]
    fn backtest_all_fans_out_one_vector_per_strategy() {
        let tasks = build_tasks(
            "freqtrade",
            ActionKind::BacktestAll,
            &backtest_params(&["alpha", "beta"]),
        )
        .unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(
            tasks[0].argv,
            vec![
                "freqtrade",
                "backtesting",
                "--strategy",
                "alpha",
                "--config",
                "/ud/configs/config.json",
                "--timerange",
                "20240601-20240825",
                "--timeframe",
                "1h",
            ]
        );
        // vectors differ only in the strategy token
        let mut second = tasks[1].argv.clone();
        second[3] = "alpha".into();
        assert_eq!(second, tasks[0].argv);
        assert_eq!(tasks[0].label, "alpha");
        assert_eq!(tasks[1].label, "beta");
        assert_eq!((tasks[0].id, tasks[1].id), (0, 1));
    }

    #[test]
    fn every_batch_vector_carries_its_strategy() {
        let names = ["a", "b", "c", "d", "e"];
        let tasks =
            build_tasks("freqtrade", ActionKind::HyperoptAll, &hyperopt_params(&names)).unwrap();
        assert_eq!(tasks.len(), names.len());
        for (task, name) in tasks.iter().zip(names) {
            let i = task.argv.iter().position(|a| a == "--strategy").unwrap();
            assert_eq!(task.argv[i + 1], name);
        }
    }

    #[test]
    fn download_splits_multi_timeframe() {
        let params = RunParameters {
            config_path: Some(PathBuf::from("c.json")),
            timeframe: Some("1m 5m 15m".into()),
            timerange: Some("20240810-20240825".into()),
            ..Default::default()
        };
        let tasks = build_tasks("freqtrade", ActionKind::DownloadData, &params).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(
            tasks[0].argv,
            vec![
                "freqtrade",
                "download-data",
                "--config",
                "c.json",
                "--timeframe",
                "1m",
                "5m",
                "15m",
                "--timerange",
                "20240810-20240825",
            ]
        );
        assert_eq!(tasks[0].label, "general");
    }

    #[test]
    fn hyperopt_one_layout() {
        let tasks =
            build_tasks("freqtrade", ActionKind::HyperoptOne, &hyperopt_params(&["alpha"])).unwrap();
        assert_eq!(
            tasks[0].argv,
            vec![
                "freqtrade",
                "hyperopt",
                "--strategy",
                "alpha",
                "--hyperopt-loss",
                "SharpeHyperOptLoss",
                "--spaces",
                "roi",
                "stoploss",
                "--timerange",
                "20240601-20240825",
                "-e",
                "100",
                "--config",
                "/ud/configs/config.json",
                "--timeframe",
                "1h",
            ]
        );
    }

    #[test]
    fn trade_and_plot_layouts() {
        let mut params = backtest_params(&["alpha"]);
        let trade = build_tasks("freqtrade", ActionKind::Trade, &params).unwrap();
        assert_eq!(
            trade[0].argv,
            vec!["freqtrade", "trade", "--strategy", "alpha", "--config", "/ud/configs/config.json"]
        );

        params.pairs = Some("LTC/USDT".into());
        let plot = build_tasks("freqtrade", ActionKind::Plot, &params).unwrap();
        assert_eq!(
            plot[0].argv,
            vec![
                "freqtrade",
                "plot-profit",
                "--strategy",
                "alpha",
                "--config",
                "/ud/configs/config.json",
                "--timeframe",
                "1h",
                "--pairs",
                "LTC/USDT",
                "--timerange",
                "20240601-20240825",
            ]
        );
    }

    #[test]
    fn free_text_cannot_inject_shell_syntax() {
        let mut params = backtest_params(&["alpha"]);
        params.pairs = Some("LTC/USDT; rm -rf /".into());
        let plot = build_tasks("freqtrade", ActionKind::Plot, &params).unwrap();
        // `;` stays glued to its word and is passed as a literal argument
        assert!(plot[0].argv.contains(&"LTC/USDT;".to_string()));
        assert_eq!(plot[0].program(), "freqtrade");
    }

    #[test]
    fn missing_fields_are_configuration_errors() {
        let mut params = backtest_params(&["alpha"]);
        params.timerange = None;
        let err = build_tasks("freqtrade", ActionKind::BacktestOne, &params).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingField {
                action: "BacktestOne",
                field: "timerange"
            }
        );

        let err = build_tasks("freqtrade", ActionKind::Plot, &backtest_params(&["alpha"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "pairs", .. }));

        let mut params = backtest_params(&["alpha"]);
        params.config_path = None;
        let err = build_tasks("freqtrade", ActionKind::Trade, &params).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "config file", .. }));
    }

    #[test]
    fn rejects_bad_strategy_selection_and_epochs() {
        let err =
            build_tasks("freqtrade", ActionKind::BacktestAll, &backtest_params(&[])).unwrap_err();
        assert_eq!(err, ConfigError::NoStrategies { action: "BacktestAll" });

        let err = build_tasks("freqtrade", ActionKind::BacktestOne, &backtest_params(&["a", "b"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "strategy", .. }));

        let mut params = hyperopt_params(&["alpha"]);
        params.epochs = Some(0);
        let err = build_tasks("freqtrade", ActionKind::HyperoptOne, &params).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "epochs", .. }));
    }

    #[test]
    fn unbalanced_quotes_are_rejected() {
        let mut params = backtest_params(&["alpha"]);
        params.timeframe = Some("\"1h".into());
        let err = build_tasks("freqtrade", ActionKind::BacktestOne, &params).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "timeframe", .. }));
    }
}
