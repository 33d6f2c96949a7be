// src/server.rs
use actix_web::{web, HttpRequest, HttpResponse, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde_json::json;
use uuid::Uuid;

use crate::rpc_client::RpcClient;
use crate::types::{
    tool_call_result, InvokeRequest, McpRequest, McpResponse, INVALID_PARAMS, METHOD_NOT_FOUND, UNAUTHORIZED,
};

pub struct AppState {
    pub rpc: RpcClient,
    /// Bearer token required on `/invoke` and `/mcp` when set.
    pub auth_token: Option<String>,
    pub session_id: Uuid,
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(rpc: RpcClient, auth_token: Option<String>) -> Self {
        Self {
            rpc,
            auth_token: auth_token.filter(|t| !t.trim().is_empty()),
            session_id: Uuid::new_v4(),
            start_time: Utc::now(),
        }
    }

    fn authorized(&self, req: &HttpRequest) -> bool {
        let Some(expected) = self.auth_token.as_deref() else {
            return true;
        };
        req.headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map_or(false, |token| token == expected)
    }
}

/// Registers every route; shared by the server binary and tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/invoke", web::post().to(invoke_tool))
        .route("/tools", web::get().to(list_tools))
        .route("/health", web::get().to(health_check))
        .route("/mcp", web::post().to(handle_mcp_request))
        .default_service(web::to(cors_handler));
}

pub async fn invoke_tool(
    req: HttpRequest,
    payload: web::Json<InvokeRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !state.authorized(&req) {
        return Ok(HttpResponse::Unauthorized().json(json!({
            "error": "Unauthorized",
            "message": "Invalid or missing authorization token"
        })));
    }

    let InvokeRequest { tool, parameters } = payload.into_inner();
    match state.rpc.call_tool(&tool, parameters).await {
        Some(envelope) => Ok(HttpResponse::Ok().json(envelope)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "error": "Unknown tool",
            "tool": tool,
            "available_tools": state.rpc.list_available_tools(),
        }))),
    }
}

pub async fn list_tools(state: web::Data<AppState>) -> Result<HttpResponse> {
    let tools = state.rpc.resolver().list_tools();
    Ok(HttpResponse::Ok().json(json!({
        "tools": tools,
        "count": tools.len()
    })))
}

pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "market-data-tools",
        "version": env!("CARGO_PKG_VERSION"),
        "session_id": state.session_id,
        "uptime_seconds": (Utc::now() - state.start_time).num_seconds(),
        "available_tools": state.rpc.list_available_tools(),
    })))
}

pub async fn handle_mcp_request(
    req: HttpRequest,
    payload: web::Json<McpRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let request = payload.into_inner();
    let id = request.id.clone();

    if !state.authorized(&req) {
        return Ok(HttpResponse::Unauthorized().json(McpResponse::error(id, UNAUTHORIZED, "Unauthorized")));
    }

    let response = match request.method.as_str() {
        "initialize" => McpResponse::success(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {}},
                "serverInfo": {
                    "name": "market-data-tools",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        ),

        "tools/list" => McpResponse::success(id, json!({ "tools": state.rpc.resolver().list_tools() })),

        "tools/call" => {
            let params = request.params.unwrap_or_default();
            match params.get("name").and_then(|v| v.as_str()) {
                Some(name) => {
                    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
                    info!("📨 MCP tools/call {}", name);
                    match state.rpc.call_tool(name, arguments).await {
                        Some(envelope) => McpResponse::success(id, tool_call_result(&envelope)),
                        None => McpResponse::error(id, INVALID_PARAMS, format!("Unknown tool: {}", name)),
                    }
                }
                None => McpResponse::error(id, INVALID_PARAMS, "Missing tool name"),
            }
        }

        other => McpResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
    };

    Ok(HttpResponse::Ok().json(response))
}

pub async fn cors_handler() -> HttpResponse {
    HttpResponse::Ok()
        .insert_header(("Access-Control-Allow-Origin", "*"))
        .insert_header(("Access-Control-Allow-Methods", "POST, GET, OPTIONS"))
        .insert_header(("Access-Control-Allow-Headers", "Content-Type, Authorization"))
        .finish()
}
