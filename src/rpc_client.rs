// src/rpc_client.rs
use log::warn;
use serde_json::Value;

use crate::envelope::ResultEnvelope;
use crate::tool::{ToolContext, ToolResolver};

/// Name-based dispatch shared by the HTTP server and the CLI.
#[derive(Clone)]
pub struct RpcClient {
    resolver: ToolResolver,
    context: ToolContext,
}

impl RpcClient {
    pub fn new(context: ToolContext) -> Self {
        Self::with_resolver(ToolResolver::default(), context)
    }

    pub fn with_resolver(resolver: ToolResolver, context: ToolContext) -> Self {
        Self { resolver, context }
    }

    pub fn resolver(&self) -> &ToolResolver {
        &self.resolver
    }

    /// Runs `tool_name` with a fresh execution id. `None` when no tool of
    /// that name is registered.
    pub async fn call_tool(&self, tool_name: &str, parameters: Value) -> Option<ResultEnvelope> {
        let Some(tool) = self.resolver.resolve(tool_name) else {
            warn!("Unknown tool requested: {}", tool_name);
            return None;
        };
        let parameters = if parameters.is_null() {
            Value::Object(Default::default())
        } else {
            parameters
        };
        Some(tool.execute(parameters, &self.context.fork()).await)
    }

    pub fn list_available_tools(&self) -> Vec<&str> {
        self.resolver.get_available_tool_names()
    }
}
