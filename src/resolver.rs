//! Interactive parameter selection.
//!
//! Numbered menus with an optional "enter your own value" escape. Answers are
//! resolved to plain strings before they reach the command builder.

use crate::model::{ActionKind, RunParameters};
use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};
use std::path::Path;

pub const TIMEFRAMES: &[&str] = &["1m", "5m", "15m", "30m", "1h", "4h", "8h", "1d"];

/// Extra multi-timeframe presets offered when downloading data.
pub const DOWNLOAD_TIMEFRAME_PRESETS: &[&str] =
    &["1m 5m 15m 30m 1h 4h 8h 1d", "30m 1h 4h 8h 1d", "1m 5m 15m"];

pub const TIMERANGES: &[&str] = &[
    "20240601-20240825",
    "20240701-20240825",
    "20240601-",
    "20240810-20240825",
    "20240820-20240825",
    "20240824-20240825",
    "20240725-20240825",
];

pub const SPACES: &[&str] = &[
    "roi stoploss",
    "roi stoploss trailing",
    "buy sell",
    "buy sell roi",
    "buy sell roi stoploss",
    "stoploss roi",
    "roi",
    "buy",
    "sell",
    "all",
];

pub const LOSS_FUNCTIONS: &[&str] = &[
    "ShortTradeDurHyperOptLoss",
    "OnlyProfitHyperOptLoss",
    "SharpeHyperOptLoss",
    "SortinoHyperOptLoss",
];

const FUNCTIONS: &[&str] = &["Test Strategies", "Download Data", "Hyperopt", "Trade", "Plot"];

/// A menu answer: an entry of the offered list or a free-text value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuChoice {
    Selected(usize),
    Custom(String),
}

impl MenuChoice {
    pub fn resolve<S: AsRef<str>>(self, options: &[S]) -> String {
        match self {
            MenuChoice::Selected(i) => options
                .get(i)
                .map(|s| s.as_ref().to_string())
                .unwrap_or_default(),
            MenuChoice::Custom(value) => value,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Answer {
    Pick(MenuChoice),
    EnterOwn,
    Invalid,
}

fn parse_answer(raw: &str, option_count: usize, allow_custom: bool) -> Answer {
    let raw = raw.trim();
    if raw.is_empty() {
        return Answer::Invalid;
    }
    if raw.chars().all(|c| c.is_ascii_digit()) {
        return match raw.parse::<usize>() {
            Ok(n) if (1..=option_count).contains(&n) => Answer::Pick(MenuChoice::Selected(n - 1)),
            Ok(n) if allow_custom && n == option_count + 1 => Answer::EnterOwn,
            _ => Answer::Invalid,
        };
    }
    if allow_custom {
        Answer::Pick(MenuChoice::Custom(raw.to_string()))
    } else {
        Answer::Invalid
    }
}

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = self.input.read_line(&mut line).context("failed to read answer")?;
        if n == 0 {
            bail!("input closed before a choice was made");
        }
        Ok(line.trim().to_string())
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        self.read_line()
    }

    /// Show a numbered menu and keep asking until the answer is usable.
    pub fn choose<S: AsRef<str>>(
        &mut self,
        prompt: &str,
        options: &[S],
        allow_custom: bool,
    ) -> Result<MenuChoice> {
        writeln!(self.output, "{prompt}")?;
        for (i, option) in options.iter().enumerate() {
            writeln!(self.output, "{}. {}", i + 1, option.as_ref())?;
        }
        if allow_custom {
            writeln!(self.output, "{}. Enter your own value", options.len() + 1)?;
        }
        loop {
            let raw = self.ask("Enter the number or your own value: ")?;
            match parse_answer(&raw, options.len(), allow_custom) {
                Answer::Pick(choice) => return Ok(choice),
                Answer::EnterOwn => {
                    let value = self.ask("Enter your own value: ")?;
                    if !value.is_empty() {
                        return Ok(MenuChoice::Custom(value));
                    }
                    writeln!(self.output, "Value must not be empty, please try again.")?;
                }
                Answer::Invalid => {
                    writeln!(self.output, "Invalid choice, please try again.")?;
                }
            }
        }
    }

    pub fn choose_value<S: AsRef<str>>(
        &mut self,
        prompt: &str,
        options: &[S],
        allow_custom: bool,
    ) -> Result<String> {
        Ok(self.choose(prompt, options, allow_custom)?.resolve(options))
    }

    pub fn ask_text(&mut self, question: &str) -> Result<String> {
        loop {
            let value = self.ask(question)?;
            if !value.is_empty() {
                return Ok(value);
            }
        }
    }

    pub fn ask_epochs(&mut self) -> Result<u32> {
        loop {
            let raw = self.ask("Enter the number of epochs: ")?;
            match raw.parse::<u32>() {
                Ok(n) if n > 0 => return Ok(n),
                _ => writeln!(self.output, "Please enter a positive number.")?,
            }
        }
    }
}

/// What the menus choose from.
pub struct Catalog<'a> {
    pub strategies: &'a [String],
    pub configs: &'a [String],
    pub configs_dir: &'a Path,
}

/// Walk the menu flow and return the action with its parameters.
pub fn resolve_interactive<R: BufRead, W: Write>(
    p: &mut Prompter<R, W>,
    catalog: &Catalog<'_>,
) -> Result<(ActionKind, RunParameters)> {
    let function = p.choose("Select the function to run:", FUNCTIONS, false)?;
    let config = p.choose_value("Select the configuration file:", catalog.configs, true)?;
    let mut params = RunParameters {
        config_path: Some(catalog.configs_dir.join(config)),
        ..Default::default()
    };

    let action = match function {
        MenuChoice::Selected(0) => {
            let all = p.choose(
                "Select an option:",
                &["Test All Strategies", "Test Selected Strategy"],
                false,
            )? == MenuChoice::Selected(0);
            if all {
                params.strategies = catalog.strategies.to_vec();
            } else {
                params.strategies = vec![p.choose_value("Select a strategy:", catalog.strategies, true)?];
            }
            params.timeframe = Some(p.choose_value("Select timeframe:", TIMEFRAMES, true)?);
            params.timerange = Some(p.choose_value("Select timerange:", TIMERANGES, true)?);
            if all {
                ActionKind::BacktestAll
            } else {
                ActionKind::BacktestOne
            }
        }
        MenuChoice::Selected(1) => {
            let timeframes: Vec<&str> = TIMEFRAMES
                .iter()
                .chain(DOWNLOAD_TIMEFRAME_PRESETS)
                .copied()
                .collect();
            params.timeframe = Some(p.choose_value("Select timeframe:", &timeframes, true)?);
            params.timerange = Some(p.choose_value("Select timerange:", TIMERANGES, true)?);
            ActionKind::DownloadData
        }
        MenuChoice::Selected(2) => {
            let all = p.choose(
                "Select an option:",
                &["Optimize All Strategies", "Optimize Selected Strategy"],
                false,
            )? == MenuChoice::Selected(0);
            if all {
                params.strategies = catalog.strategies.to_vec();
            } else {
                params.strategies = vec![p.choose_value("Select a strategy:", catalog.strategies, true)?];
            }
            params.hyperopt_loss = Some(p.choose_value("Select loss function:", LOSS_FUNCTIONS, true)?);
            params.spaces = Some(p.choose_value("Select spaces:", SPACES, true)?);
            params.epochs = Some(p.ask_epochs()?);
            params.timeframe = Some(p.choose_value("Select timeframe:", TIMEFRAMES, true)?);
            params.timerange = Some(p.choose_value("Select timerange:", TIMERANGES, true)?);
            if all {
                ActionKind::HyperoptAll
            } else {
                ActionKind::HyperoptOne
            }
        }
        MenuChoice::Selected(3) => {
            params.strategies = vec![p.choose_value("Select strategy:", catalog.strategies, true)?];
            ActionKind::Trade
        }
        _ => {
            params.strategies = vec![p.choose_value("Select strategy:", catalog.strategies, true)?];
            params.timeframe = Some(p.choose_value("Select timeframe:", TIMEFRAMES, true)?);
            params.pairs = Some(p.ask_text("Enter the currency pair (e.g., LTC/USDT): ")?);
            params.timerange = Some(p.choose_value("Select timerange:", TIMERANGES, true)?);
            ActionKind::Plot
        }
    };
    Ok((action, params))
}
