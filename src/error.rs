use thiserror::Error;

use crate::core::TaskId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Dependency cycle detected: adding {from} -> {to} would create a cycle")]
    Cycle { from: TaskId, to: TaskId },

    #[error("Task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: TaskId, dependency: TaskId },

    #[error("Task already exists: {0}")]
    DuplicateTask(TaskId),

    #[error("Task identifier must not be empty")]
    EmptyTaskId,

    #[error("Agent handler error: {0}")]
    Handler(String),

    #[error("Unsupported task file: {0}")]
    UnsupportedTaskFile(String),
}

impl Error {
    /// Whether this error is a construction-time graph error (the whole run aborts).
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Error::Cycle { .. }
                | Error::UnknownDependency { .. }
                | Error::DuplicateTask(_)
                | Error::EmptyTaskId
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
