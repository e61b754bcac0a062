//! Error types for the token pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type for token operations
pub type Result<T> = std::result::Result<T, TokenError>;

/// Token pipeline errors
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Validation failed with {} issue(s):\n  - {}", .0.len(), .0.join("\n  - "))]
    Validation(Vec<String>),

    #[error("Malformed migration, batch aborted before any write:\n  - {}", .0.join("\n  - "))]
    StructuralMigration(Vec<String>),

    #[error("Missing source keys (fail-on-missing), batch aborted before any write:\n  - {}", .0.join("\n  - "))]
    MissingKeys(Vec<String>),

    #[error("Backup of {path} failed, store left untouched: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backup {path} does not match the store contents, store left untouched")]
    BackupMismatch { path: PathBuf },

    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TokenError {
    /// Process exit code for this error: 2 for usage/environment, 1 for
    /// validation, migration and write failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            TokenError::Usage(_)
            | TokenError::Read { .. }
            | TokenError::Parse { .. }
            | TokenError::Config(_) => 2,
            TokenError::Validation(_)
            | TokenError::StructuralMigration(_)
            | TokenError::MissingKeys(_)
            | TokenError::Backup { .. }
            | TokenError::BackupMismatch { .. }
            | TokenError::Write { .. }
            | TokenError::Io(_)
            | TokenError::Json(_) => 1,
        }
    }
}
