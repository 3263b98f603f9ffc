//! Server configuration loaded from environment variables.
//!
//! Variables:
//! - SERVER_NAME: name reported in `initialize` (default: "secret-message-server")
//! - SERVER_VERSION: version reported in `initialize` (default: crate version)
//! - MCP_TRANSPORT_MODE: "stdio", "http", or "both" (default: "stdio")
//! - HOST: bind address for HTTP mode (default: "0.0.0.0")
//! - PORT: port for HTTP mode (default: 3000)
//! - WORKER_THREADS: Actix worker count (default: CPU count, capped at 16)

use std::str::FromStr;

use crate::core::error::ConfigError;

pub const DEFAULT_NAME: &str = "secret-message-server";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
const MAX_WORKERS: usize = 16;

/// Which transports the server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Stdio,
    Http,
    Both,
}

impl TransportMode {
    pub fn runs_stdio(self) -> bool {
        matches!(self, TransportMode::Stdio | TransportMode::Both)
    }

    pub fn runs_http(self) -> bool {
        matches!(self, TransportMode::Http | TransportMode::Both)
    }
}

impl FromStr for TransportMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdio" => Ok(TransportMode::Stdio),
            "http" => Ok(TransportMode::Http),
            "both" => Ok(TransportMode::Both),
            other => Err(ConfigError::InvalidTransport(other.to_string())),
        }
    }
}

/// Runtime configuration for the MCP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name as reported in MCP initialize responses
    pub name: String,
    /// Server version as reported in MCP initialize responses
    pub version: String,
    pub transport: TransportMode,
    pub host: String,
    pub port: u16,
    /// Actix worker thread count
    pub workers: usize,
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// An unparseable PORT or WORKER_THREADS falls back to its default with a
    /// warning; an unknown transport mode is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = lookup("SERVER_NAME").unwrap_or_else(|| DEFAULT_NAME.to_string());
        let version =
            lookup("SERVER_VERSION").unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

        let transport = match lookup("MCP_TRANSPORT_MODE") {
            Some(mode) => mode.parse()?,
            None => TransportMode::Stdio,
        };

        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match lookup("PORT") {
            Some(raw) => raw.parse::<u16>().unwrap_or_else(|_| {
                tracing::warn!(port = %raw, "invalid PORT, using {}", DEFAULT_PORT);
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let workers = match lookup("WORKER_THREADS") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    let fallback = default_workers();
                    tracing::warn!(workers = %raw, "invalid WORKER_THREADS, using {}", fallback);
                    fallback
                }
            },
            None => default_workers(),
        };

        Ok(Self {
            name,
            version,
            transport,
            host,
            port,
            workers,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// CPU count capped to avoid excessive context switching.
fn default_workers() -> usize {
    num_cpus::get().clamp(1, MAX_WORKERS)
}
