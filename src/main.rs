//! Secret message MCP server entry point.
//!
//! Reads configuration from the environment (see `core::config`), installs
//! logging, registers the tools and starts the configured transports:
//! STDIO only, HTTP only, or both with STDIO in a background task.

mod core;
mod tools;

use std::process::ExitCode;

use tracing::error;

use crate::core::config::ServerConfig;
use crate::core::error::Result;
use crate::core::logging::{self, LogFormat};
use crate::core::server::{self, AppState};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    logging::init(LogFormat::from_env()?)?;

    let config = ServerConfig::from_env()?;
    let state = AppState::from_config(&config);
    let registry = server::initialize_tools();

    if !config.transport.runs_http() {
        server::run_server_stdio(state, registry).await?;
        return Ok(());
    }

    let stdio_handle = config.transport.runs_stdio().then(|| {
        let state = state.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            if let Err(e) = server::run_server_stdio(state, registry).await {
                error!(error = %e, "STDIO server error");
            }
        })
    });

    let http_result = server::run_server_http(&config, state, registry).await;

    // HTTP exited, stop reading stdin too.
    if let Some(handle) = stdio_handle {
        handle.abort();
    }

    http_result?;
    Ok(())
}
