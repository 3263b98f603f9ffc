//! Error types for server startup and transport failures.
//!
//! Tool handlers report failures as plain strings inside the MCP result;
//! these types only cover errors that stop the process.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid transport mode '{0}', must be 'stdio', 'http', or 'both'")]
    InvalidTransport(String),

    #[error("invalid log format '{0}', must be 'text' or 'json'")]
    InvalidLogFormat(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;
