//! Secret Message Tool
//!
//! Exposes a single zero-argument tool that always answers with the same
//! secret message. The tool is pure: no state, no I/O, no failure path.

use crate::core::server::{MCPTool, ToolHandler, ToolRegistry};
use serde_json::Value;

/// Stable identifier under which the tool is registered.
pub const TOOL_NAME: &str = "getSecretMessage";

/// Description reported to hosts through `tools/list`.
pub const DESCRIPTION: &str = "Tells the secret message";

/// The message returned by every invocation.
pub const SECRET_MESSAGE: &str = "Hello, World with code 8751!";

/// Return the secret message.
pub fn get_secret_message() -> &'static str {
    SECRET_MESSAGE
}

/// Register the secret message tool with the tool registry.
///
/// The tool takes no input, so the schema is an empty object and any
/// arguments a host sends along are ignored.
pub fn register(registry: &mut ToolRegistry) {
    let tool = MCPTool {
        name: TOOL_NAME.to_string(),
        description: DESCRIPTION.to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {}
        }),
    };

    let handler: ToolHandler =
        Box::new(|_args: Value| -> Result<Value, String> { Ok(Value::from(get_secret_message())) });

    registry.register(tool, handler);
}
