//! JSON-RPC 2.0 envelope and the MCP method table.

use rmcp::model::{
    ErrorCode, ErrorData, Implementation, JsonObject, JsonRpcMessage, RequestId, ServerCapabilities,
    ServerInfo,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::DispatchError;
use crate::session::CallContext;
use crate::tools::ToolDispatcher;

/// What goes back on the stream: a result or an error, keyed by request id.
pub type Reply = JsonRpcMessage<JsonObject, Value, JsonObject>;

/// Any inbound message: request (has `id`), notification (no `id`), or a
/// stray response from the client (no `method`).
///
/// Left untyped so an unknown method still parses and can be answered with
/// `METHOD_NOT_FOUND`.
#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub jsonrpc: Option<String>,
    pub id: Option<RequestId>,
    pub method: Option<String>,
    pub params: Option<Value>,
}

/// Body for a message that could not be parsed at all, so has no id to echo.
pub fn parse_error_body(detail: impl std::fmt::Display) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": null,
        "error": ErrorData::parse_error(format!("Parse error: {detail}"), None),
    })
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

const INSTRUCTIONS: &str = "Personal notes. Use create_note to save information, \
     list_recent_notes or search_notes to find it again, and get_note, update_note, \
     append_note or delete_note to work with a note by ID.";

/// Answers MCP methods for one posted message.
#[derive(Clone)]
pub struct McpHandler {
    dispatcher: ToolDispatcher,
}

impl McpHandler {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Handle one message. Notifications and client responses produce `None`.
    pub async fn handle(&self, ctx: &CallContext, message: IncomingMessage) -> Option<Reply> {
        let Some(method) = message.method else {
            tracing::debug!(id = ?message.id, "ignoring message without a method");
            return None;
        };
        let Some(id) = message.id else {
            tracing::debug!(method = %method, "notification received");
            return None;
        };

        if message.jsonrpc.as_deref().is_some_and(|v| v != "2.0") {
            return Some(Reply::error(
                ErrorData::invalid_request("jsonrpc must be \"2.0\"", None),
                id,
            ));
        }

        tracing::debug!(method = %method, "request received");
        let result = match method.as_str() {
            "initialize" => self.initialize(message.params.as_ref()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.dispatcher.catalog() })),
            "tools/call" => self.call_tool(ctx, message.params).await,
            other => Err(ErrorData::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
                None,
            )),
        };

        Some(match result {
            Ok(value) => Reply::response(value, id),
            Err(error) => Reply::error(error, id),
        })
    }

    fn initialize(&self, params: Option<&Value>) -> Result<Value, ErrorData> {
        let mut server_info = Implementation::from_build_env();
        server_info.name = env!("CARGO_PKG_NAME").into();
        server_info.version = env!("CARGO_PKG_VERSION").into();

        let info = ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info,
            ..Default::default()
        };
        let mut value = serde_json::to_value(info)
            .map_err(|e| ErrorData::internal_error(format!("serialization failed: {e}"), None))?;

        // Speak whichever revision the client asked for.
        if let Some(requested) = params.and_then(|p| p.get("protocolVersion")).filter(|v| v.is_string()) {
            value["protocolVersion"] = requested.clone();
        }
        Ok(value)
    }

    /// Only the envelope (`name`) is checked here. `arguments` travels as-is so
    /// that a malformed argument value becomes a tool error the agent can read.
    async fn call_tool(&self, ctx: &CallContext, params: Option<Value>) -> Result<Value, ErrorData> {
        let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| ErrorData::invalid_params(format!("Invalid tools/call params: {e}"), None))?;

        match self.dispatcher.invoke(ctx, &params.name, params.arguments).await {
            Ok(result) => serde_json::to_value(result)
                .map_err(|e| ErrorData::internal_error(format!("serialization failed: {e}"), None)),
            Err(e @ DispatchError::UnknownTool(_)) => Err(ErrorData::invalid_params(e.to_string(), None)),
            Err(e @ DispatchError::Infrastructure(_)) => Err(ErrorData::internal_error(e.to_string(), None)),
        }
    }
}
