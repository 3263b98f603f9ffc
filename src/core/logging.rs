//! Tracing subscriber setup.
//!
//! Logs always go to stderr so the STDIO transport keeps stdout for JSON-RPC.
//! RUST_LOG selects levels (default "info"), LOG_FORMAT selects "text" or
//! "json" output. Records emitted through the `log` facade (Actix's request
//! logger) are forwarded into the same subscriber.

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use crate::core::error::{ConfigError, ServerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::InvalidLogFormat(other.to_string())),
        }
    }
}

impl LogFormat {
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var("LOG_FORMAT") {
            Ok(format) => format.parse(),
            Err(_) => Ok(LogFormat::Text),
        }
    }
}

/// Install the global subscriber. Must be called once, before anything logs.
pub fn init(format: LogFormat) -> Result<(), ServerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| ServerError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_log_formats() {
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!(
            "xml".parse::<LogFormat>(),
            Err(ConfigError::InvalidLogFormat("xml".to_string()))
        );
    }
}
