//! HTTP surface: health checks and the MCP JSON-RPC endpoint

use axum::{
    body::Bytes,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::error::ServerError;
use crate::mcp::{McpError, McpRequest, McpResponse, JSONRPC_VERSION, PROTOCOL_VERSION};
use crate::state::AppState;
use crate::tools;

/// Build the router over shared state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/mcp", post(mcp_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "jmap_initialized": state.client.is_initialized(),
    }))
}

/// MCP endpoint handler
///
/// Bodies that are not JSON get a parse error; JSON that is not a
/// request object gets an invalid-request error.
async fn mcp_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Json<McpResponse> {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("❌ Rejected unparseable MCP request: {}", e);
            return Json(McpResponse::error(
                McpError::parse_error(format!("Parse error: {}", e)),
                Value::Null,
            ));
        }
    };
    let id = raw.get("id").cloned().unwrap_or(Value::Null);
    let request: McpRequest = match serde_json::from_value(raw) {
        Ok(request) => request,
        Err(e) => {
            return Json(McpResponse::error(
                McpError::invalid_request(format!("Invalid request: {}", e)),
                id,
            ));
        }
    };

    debug!("📥 MCP request: method={}", request.method);

    if request.jsonrpc != JSONRPC_VERSION {
        return Json(McpResponse::error(
            McpError::invalid_request(format!("Unsupported jsonrpc version: {}", request.jsonrpc)),
            request.id,
        ));
    }

    let response = match request.method.as_str() {
        "initialize" => McpResponse::success(server_info(), request.id),
        "tools/list" => handle_tools_list(request.id),
        "tools/call" => handle_tools_call(&state, request.params, request.id).await,
        _ => McpResponse::error(McpError::method_not_found(&request.method), request.id),
    };

    Json(response)
}

fn server_info() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
        "capabilities": {
            "tools": { "listChanged": false }
        }
    })
}

/// Handle tools/list
fn handle_tools_list(id: Value) -> McpResponse {
    debug!("📋 Listing available tools");

    let tools: Vec<Value> = tools::catalog().iter().map(|t| t.to_schema()).collect();
    McpResponse::success(json!({ "tools": tools }), id)
}

/// Handle tools/call; tool failures are reported inside the result
async fn handle_tools_call(state: &AppState, params: Value, id: Value) -> McpResponse {
    let Some(tool_name) = params.get("name").and_then(Value::as_str) else {
        return McpResponse::error(McpError::invalid_params("Missing tool name"), id);
    };
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    match tools::call_tool(state, tool_name, arguments).await {
        Ok(payload) => McpResponse::success(payload, id),
        Err(ServerError::UnknownTool(name)) => {
            McpResponse::error(McpError::tool_not_found(&name), id)
        }
        Err(e) => {
            warn!("❌ Tool {} failed: {}", tool_name, e);
            McpResponse::success(
                json!({
                    "error": true,
                    "message": e.to_string(),
                }),
                id,
            )
        }
    }
}
