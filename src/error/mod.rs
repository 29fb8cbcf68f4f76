//! Error handling module for vbench

use thiserror::Error;

use crate::domain::errors::DomainError;

/// Main error type for run-level operations
#[derive(Error, Debug)]
pub enum BenchError {
    /// Configuration could not be assembled or validated
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Domain failure that escaped per-item handling
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Result table could not be read, merged or written
    #[error("Result table error: {message}")]
    Table { message: String },

    /// Scoring worker pool could not be built or joined
    #[error("Worker pool error: {message}")]
    Pool { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML config parse error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// YAML config parse error
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// JSON report error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl BenchError {
    pub fn config(message: impl Into<String>) -> Self {
        BenchError::Config {
            message: message.into(),
        }
    }

    pub fn table(message: impl Into<String>) -> Self {
        BenchError::Table {
            message: message.into(),
        }
    }
}

/// Result type alias for run-level operations
pub type BenchResult<T> = std::result::Result<T, BenchError>;
