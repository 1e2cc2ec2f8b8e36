//! Errors surfaced by the `classsense` binary
//!
//! `main` prints them to stderr as `CODE: message` and exits with status 1.
//! Store and server failures are wrapped with the step that failed, since the
//! operator reading stderr has no request context.

use std::io;

use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    /// Config file unreadable or invalid, or a bad environment override
    #[error("CLASSSENSE_CLI_CONFIG_ERROR: {0}")]
    Config(String),

    /// Store could not be opened, or the listener stopped with an error
    #[error("CLASSSENSE_CLI_BOOT_FAILED: {0}")]
    Boot(String),

    #[error("CLASSSENSE_CLI_IO_ERROR: {0}")]
    Io(#[from] io::Error),

    #[error("CLASSSENSE_CLI_IO_ERROR: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::Boot(msg.into())
    }

    /// Stable code printed ahead of the message
    pub fn code_str(&self) -> &'static str {
        match self {
            Self::Config(_) => "CLASSSENSE_CLI_CONFIG_ERROR",
            Self::Boot(_) => "CLASSSENSE_CLI_BOOT_FAILED",
            Self::Io(_) | Self::Json(_) => "CLASSSENSE_CLI_IO_ERROR",
        }
    }
}
