//! Error types for the collector

use thiserror::Error;

/// Workspace-wide error type
#[derive(Error, Debug)]
pub enum NewswireError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl NewswireError {
    pub fn config(msg: impl Into<String>) -> Self {
        NewswireError::Config(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        NewswireError::Parse(msg.into())
    }
}

/// Result type alias for core operations
pub type NewswireResult<T> = Result<T, NewswireError>;
