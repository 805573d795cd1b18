//! Typed errors for the parts of a run that callers branch on.

use std::path::PathBuf;
use thiserror::Error;

/// A run cannot be built from the resolved parameters or settings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{action} requires {field}")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },

    #[error("invalid {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    #[error("{action} needs at least one strategy, none found")]
    NoStrategies { action: &'static str },

    #[error("invalid settings: {message}")]
    InvalidSettings { message: String },
}

/// The external program could not be started.
#[derive(Debug, Error)]
#[error("failed to launch '{program}': {source}")]
pub struct LaunchError {
    pub program: String,
    #[source]
    pub source: std::io::Error,
}

/// A result file could not be written.
#[derive(Debug, Error)]
#[error("failed to write {}: {source}", path.display())]
pub struct PersistError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}
