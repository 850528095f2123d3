// Error types for platecache
// Author: kelexine (https://github.com/kelexine)
//
// Fetcher failures are never represented here: they are a caller-supplied
// type parameter and flow back to the caller unchanged.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Sort error: {0}")]
    Sort(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Short machine-readable category, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Config(_) | CoreError::ConfigParsing(_) => "config",
            CoreError::Io(_) => "io",
            CoreError::Json(_) => "json",
            CoreError::Persistence(_) => "persistence",
            CoreError::Sort(_) => "sort",
            CoreError::InvalidInput(_) => "invalid_input",
            CoreError::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
