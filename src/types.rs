// src/types.rs
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::envelope::ResultEnvelope;

pub const JSONRPC_VERSION: &str = "2.0";
pub const INVALID_PARAMS: i32 = -32602;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const UNAUTHORIZED: i32 = -32001;

/// Body of `POST /invoke`.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub tool: String,
    #[serde(default)]
    pub parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(McpError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// MCP-compatible content structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl McpContent {
    pub fn text(text: String) -> Self {
        Self {
            content_type: "text".to_string(),
            text,
        }
    }
}

/// `tools/call` result: the envelope as text content plus the structured
/// envelope. Degraded envelopes are flagged with `isError`.
pub fn tool_call_result(envelope: &ResultEnvelope) -> Value {
    let structured = serde_json::to_value(envelope).unwrap_or(Value::Null);
    let text = serde_json::to_string_pretty(&structured).unwrap_or_else(|_| structured.to_string());
    json!({
        "content": [McpContent::text(text)],
        "structuredContent": structured,
        "isError": !envelope.is_reliable && envelope.data.is_null(),
    })
}
