use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for dataset management, report handling and evaluation runs
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Id already registered: {0}")]
    DuplicateId(String),

    #[error("Path already exists: {0} (enable overwrite to replace it)")]
    AlreadyExists(PathBuf),

    #[error("Corrupt saved state: {0}")]
    CorruptState(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Evaluation engine error: {0}")]
    Engine(String),
}

/// Result type for evaluation operations
pub type EvalResult<T> = Result<T, EvalError>;

/// Implement From<anyhow::Error> for EvalError
impl From<anyhow::Error> for EvalError {
    fn from(err: anyhow::Error) -> Self {
        EvalError::Engine(err.to_string())
    }
}
