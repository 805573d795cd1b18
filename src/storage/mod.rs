//! Result persistence.
//!
//! One file per completed task under the results directory. Writes overwrite
//! whatever is already at the computed path.

pub mod filename;

use crate::error::PersistError;
use crate::model::{ActionKind, OrchestratorConfig, Task};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
    extension: String,
    max_filename_len: usize,
}

impl ResultStore {
    pub fn new(cfg: &OrchestratorConfig) -> Self {
        Self {
            dir: cfg.results_dir.clone(),
            extension: cfg.result_extension.clone(),
            max_filename_len: cfg.max_filename_len,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the output of `task` under `action` is written.
    pub fn path_for(&self, action: ActionKind, task: &Task) -> PathBuf {
        let name = filename::result_filename(
            action.as_str(),
            &task.label,
            &task.command_line(),
            &self.extension,
            self.max_filename_len,
        );
        self.dir.join(name)
    }

    /// Write `output` verbatim, replacing any previous file at the same path.
    pub fn save(&self, action: ActionKind, task: &Task, output: &str) -> Result<PathBuf, PersistError> {
        let path = self.path_for(action, task);
        std::fs::create_dir_all(&self.dir).map_err(|source| PersistError {
            path: self.dir.clone(),
            source,
        })?;
        std::fs::write(&path, output).map_err(|source| PersistError {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
