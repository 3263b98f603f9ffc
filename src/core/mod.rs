//! Core Server Framework Module
//!
//! - server.rs: MCP protocol types, tool registry, HTTP and STDIO transports
//! - config.rs: configuration from environment variables
//! - logging.rs: tracing subscriber setup
//! - error.rs: startup and transport errors

pub mod config;
pub mod error;
pub mod logging;
pub mod server;
