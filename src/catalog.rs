//! Strategy and config file discovery.

use anyhow::{Context, Result};
use std::path::Path;

/// Names of regular files in `dir` ending in `.extension`, sorted.
pub fn list_files(dir: &Path, extension: &str) -> Result<Vec<String>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Strategy identifiers: `*.py` file stems.
pub fn strategy_names(dir: &Path) -> Result<Vec<String>> {
    Ok(list_files(dir, "py")?
        .into_iter()
        .map(|name| strip_extension(&name).to_string())
        .collect())
}

/// `*.json` file names.
pub fn config_files(dir: &Path) -> Result<Vec<String>> {
    list_files(dir, "json")
}

pub fn strip_extension(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}
