use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for the conversation record store
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Grade must be between 1 and 10, got {0}")]
    InvalidGrade(u8),

    #[error("Conversation file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

/// Result type for record operations
pub type RecordResult<T> = Result<T, RecordError>;
