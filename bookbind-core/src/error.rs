use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for bookbind
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Probe failed for {}: {reason}", file.display())]
    Probe { file: PathBuf, reason: String },

    #[error("Transcode failed for {}: {reason}", file.display())]
    Transcode { file: PathBuf, reason: String },

    #[error("Merge failed: {0}")]
    Merge(String),

    #[error("Cover art embedding failed: {0}")]
    PostProcess(String),

    #[error("Command execution failed: {0}")]
    CommandExecution(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unexpected error: {0}")]
    Other(String),
}

/// Result type for bookbind operations
pub type Result<T> = std::result::Result<T, CoreError>;
