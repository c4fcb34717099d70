//! Loading task lists from files.
//!
//! Two formats are accepted, chosen by extension:
//!
//! ```toml
//! [[task]]
//! id = "api"
//! description = "Build the API"
//! agent_type = "backend"
//! dependencies = ["spec"]
//! ```
//!
//! or a JSON array of the same objects.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::core::Task;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct TomlTaskFile {
    #[serde(default)]
    task: Vec<Task>,
}

/// Parse a TOML task list.
pub fn parse_toml(contents: &str) -> Result<Vec<Task>> {
    let file: TomlTaskFile = toml::from_str(contents)?;
    Ok(file.task)
}

/// Parse a JSON task list.
pub fn parse_json(contents: &str) -> Result<Vec<Task>> {
    Ok(serde_json::from_str(contents)?)
}

/// Read tasks from a `.toml` or `.json` file.
pub fn load_tasks(path: &Path) -> Result<Vec<Task>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let contents = fs::read_to_string(path)?;
    let tasks = match extension.as_deref() {
        Some("toml") => parse_toml(&contents)?,
        Some("json") => parse_json(&contents)?,
        _ => return Err(Error::UnsupportedTaskFile(path.display().to_string())),
    };

    tracing::debug!(path = %path.display(), tasks = tasks.len(), "loaded tasks");
    Ok(tasks)
}
