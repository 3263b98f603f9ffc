//! MCP Server Implementation
//!
//! This module contains the core MCP server implementation including:
//! - JSON-RPC 2.0 request/response structures
//! - Tool registry mapping tool names to handlers and metadata
//! - A single dispatcher shared by both transports
//! - HTTP server setup with Actix Web
//! - STDIO server implementation for line-based communication

use actix_web::{
    error::InternalError,
    http::header,
    middleware::{Compress, DefaultHeaders, Logger},
    web, App, HttpResponse, HttpServer, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info, warn};

use crate::core::config::ServerConfig;
use crate::tools;

/// MCP protocol revision advertised in initialize responses.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

/// Server metadata shared by both transports.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server name as reported in MCP initialize responses
    pub server_name: String,
    /// Server version string as reported in MCP initialize responses
    pub server_version: String,
}

impl AppState {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            server_name: config.name.clone(),
            server_version: config.version.clone(),
        }
    }
}

/// JSON-RPC 2.0 request structure for MCP protocol.
///
/// A request without `id` is a notification and never gets a response.
#[derive(Deserialize, Debug)]
pub struct MCPRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
}

/// JSON-RPC 2.0 response structure. Exactly one of `result` and `error` is set.
#[derive(Serialize, Debug)]
pub struct MCPResponse {
    jsonrpc: String,
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<MCPError>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Serialize, Debug)]
pub struct MCPError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl MCPResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(MCPError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP tool definition, serialized as listed by `tools/list`.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MCPTool {
    /// Unique tool identifier
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema defining the tool's input parameters
    pub input_schema: Value,
}

/// Tool handlers take JSON arguments and return a JSON result or an error
/// message. They must be Send + Sync to be shared across HTTP workers.
pub type ToolHandler = Box<dyn Fn(Value) -> std::result::Result<Value, String> + Send + Sync>;

/// Registry of available MCP tools, populated once at startup.
pub struct ToolRegistry {
    /// Tool definitions in registration order (for tools/list)
    pub tools: Vec<MCPTool>,
    /// Tool names to handlers (for tools/call)
    pub handlers: HashMap<String, ToolHandler>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            handlers: HashMap::new(),
        }
    }

    /// Register a tool. Registering an existing name replaces both its
    /// handler and its listed definition.
    pub fn register(&mut self, tool: MCPTool, handler: ToolHandler) {
        let name = tool.name.clone();
        if self.handlers.insert(name.clone(), handler).is_some() {
            self.tools.retain(|t| t.name != name);
        }
        self.tools.push(tool);
    }

    /// Look up a tool definition by name.
    pub fn get(&self, name: &str) -> Option<&MCPTool> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Invoke a tool by name. Returns None if no such tool is registered.
    pub fn call(&self, name: &str, arguments: Value) -> Option<std::result::Result<Value, String>> {
        self.handlers.get(name).map(|handler| handler(arguments))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize and register all tools.
pub fn initialize_tools() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    tools::secret_message::register(&mut registry);

    Arc::new(registry)
}

/// Route one request to its method handler.
///
/// Returns None for notifications, which must not be answered.
pub fn dispatch(state: &AppState, registry: &ToolRegistry, req: MCPRequest) -> Option<MCPResponse> {
    let Some(id) = req.id else {
        debug!(method = %req.method, "notification received");
        return None;
    };
    let id = Some(id);

    debug!(method = %req.method, "request received");
    let response = match req.method.as_str() {
        "initialize" => handle_initialize(state, id),
        "ping" => MCPResponse::success(id, serde_json::json!({})),
        "tools/list" => handle_tools_list(registry, id),
        "tools/call" => handle_tools_call(registry, id, req.params),
        _ => MCPResponse::failure(id, METHOD_NOT_FOUND, format!("Method not found: {}", req.method)),
    };
    Some(response)
}

/// Decode one JSON-RPC message from parsed JSON. On failure the parse error
/// response carries whatever `id` the message had.
fn decode_request(value: Value) -> std::result::Result<MCPRequest, MCPResponse> {
    let id = value.get("id").cloned();
    serde_json::from_value::<MCPRequest>(value).map_err(|e| {
        warn!(error = %e, "invalid JSON-RPC request");
        MCPResponse::failure(id, PARSE_ERROR, format!("Parse error: {}", e))
    })
}

fn handle_initialize(state: &AppState, id: Option<Value>) -> MCPResponse {
    MCPResponse::success(
        id,
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": state.server_name,
                "version": state.server_version
            }
        }),
    )
}

fn handle_tools_list(registry: &ToolRegistry, id: Option<Value>) -> MCPResponse {
    MCPResponse::success(id, serde_json::json!({ "tools": registry.tools }))
}

fn handle_tools_call(registry: &ToolRegistry, id: Option<Value>, params: Option<Value>) -> MCPResponse {
    let Some(params) = params else {
        return MCPResponse::failure(id, INVALID_PARAMS, "Invalid params");
    };

    let tool_name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
    let arguments = params
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));

    let Some(tool) = registry.get(tool_name) else {
        return MCPResponse::failure(id, METHOD_NOT_FOUND, format!("Unknown tool: {}", tool_name));
    };
    debug!(tool = %tool.name, "calling tool");

    match registry.call(&tool.name, arguments) {
        Some(Ok(result)) => MCPResponse::success(id, tool_content(render_text(result), false)),
        Some(Err(e)) => {
            warn!(tool = %tool.name, error = %e, "tool call failed");
            MCPResponse::success(id, tool_content(format!("Error: {}", e), true))
        }
        None => MCPResponse::failure(id, METHOD_NOT_FOUND, format!("Unknown tool: {}", tool.name)),
    }
}

fn tool_content(text: String, is_error: bool) -> Value {
    serde_json::json!({
        "content": [
            {
                "type": "text",
                "text": text
            }
        ],
        "isError": is_error
    })
}

/// Strings are sent verbatim; other values as their JSON text.
fn render_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

async fn health(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": state.server_name
    })))
}

/// JSON-RPC over HTTP. Notifications are acknowledged with 202 and no body.
async fn mcp_handler(
    state: web::Data<AppState>,
    registry: web::Data<ToolRegistry>,
    counter: web::Data<AtomicU64>,
    body: web::Json<Value>,
) -> Result<HttpResponse> {
    counter.fetch_add(1, Ordering::Relaxed);

    let req = match decode_request(body.into_inner()) {
        Ok(req) => req,
        Err(response) => return Ok(HttpResponse::BadRequest().json(response)),
    };

    match dispatch(state.get_ref(), registry.get_ref(), req) {
        Some(response) => Ok(HttpResponse::Ok().json(response)),
        None => Ok(HttpResponse::Accepted().finish()),
    }
}

async fn metrics_handler(counter: web::Data<AtomicU64>) -> Result<HttpResponse> {
    let count = counter.load(Ordering::Relaxed);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "requests_total": count,
        "status": "ok"
    })))
}

/// Server-Sent Events endpoint for tools discovery: one event carrying the
/// full tool list.
async fn sse_tools_discovery(registry: web::Data<ToolRegistry>) -> Result<HttpResponse> {
    let tools_data = serde_json::json!({
        "tools": registry.tools,
        "count": registry.tools.len()
    });

    let sse_data = format!("data: {}\n\n", tools_data);

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(header::CacheControl(vec![
            header::CacheDirective::NoCache,
            header::CacheDirective::NoStore,
            header::CacheDirective::MustRevalidate,
        ]))
        .insert_header(("x-accel-buffering", "no"))
        .body(sse_data))
}

/// Malformed JSON bodies get a JSON-RPC parse error instead of a bare 400.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = format!("Parse error: {}", err);
        warn!("{}", message);
        let response = HttpResponse::BadRequest().json(MCPResponse::failure(None, PARSE_ERROR, message));
        InternalError::from_response(err, response).into()
    })
}

/// Register all HTTP routes. The caller supplies `AppState`, `ToolRegistry`
/// and the `AtomicU64` request counter as app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/sse", web::get().to(sse_tools_discovery))
        .route("/mcp", web::post().to(mcp_handler))
        .route("/", web::post().to(mcp_handler))
        .route("/", web::get().to(health));
}

/// Run the MCP server in HTTP mode.
///
/// Connection limits and timeouts:
/// - Max connections: 10,000, at most 1,000 new per second
/// - Keep-alive and request timeout: 30 seconds
/// - Disconnect timeout: 2 seconds, shutdown timeout: 10 seconds
pub async fn run_server_http(
    config: &ServerConfig,
    state: AppState,
    registry: Arc<ToolRegistry>,
) -> std::io::Result<()> {
    let bind_addr = config.bind_addr();

    let app_state = web::Data::new(state);
    let tool_registry = web::Data::from(registry);
    let request_count = web::Data::new(AtomicU64::new(0));

    info!(
        name = %app_state.server_name,
        version = %app_state.server_version,
        bind = %bind_addr,
        workers = config.workers,
        "MCP server starting (HTTP mode)"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(tool_registry.clone())
            .app_data(request_count.clone())
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("X-XSS-Protection", "1; mode=block")),
            )
            // %r = request line, %s = status, %D = duration in ms
            .wrap(Logger::new("%r %s %Dms"))
            .configure(configure)
    })
    .workers(config.workers)
    .max_connections(10000)
    .max_connection_rate(1000)
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .client_disconnect_timeout(Duration::from_secs(2))
    .shutdown_timeout(10)
    .bind(&bind_addr)?
    .run()
    .await
}

/// Run the MCP server in STDIO mode: JSON-RPC requests line by line on
/// stdin, one response line per request on stdout.
pub async fn run_server_stdio(state: AppState, registry: Arc<ToolRegistry>) -> std::io::Result<()> {
    info!(
        name = %state.server_name,
        version = %state.server_version,
        "MCP server starting (STDIO mode)"
    );

    let stdin = BufReader::with_capacity(8192, tokio::io::stdin());
    let stdout = BufWriter::with_capacity(8192, tokio::io::stdout());
    serve_lines(stdin, stdout, &state, &registry).await
}

/// Line-delimited JSON-RPC loop over any reader/writer pair.
///
/// Returns when the reader is exhausted. Lines that are not UTF-8 or not JSON
/// are logged and skipped; well-formed JSON that is not a valid request is
/// answered with a parse error when it carries an `id`.
pub async fn serve_lines<R, W>(
    mut reader: R,
    mut writer: W,
    state: &AppState,
    registry: &ToolRegistry,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(8192);

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!(error = %e, "skipping non UTF-8 line on stdin");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let value = match serde_json::from_str::<Value>(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "parse error on stdin");
                continue;
            }
        };

        let response = match decode_request(value) {
            Ok(req) => match dispatch(state, registry, req) {
                Some(response) => response,
                None => continue,
            },
            Err(response) if response.id.is_none() => continue,
            Err(response) => response,
        };

        let response_json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize response");
                continue;
            }
        };

        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(())
}
