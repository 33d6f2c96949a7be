// src/tool.rs
use async_trait::async_trait;
use futures::FutureExt;
use log::{error, info};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::batch::FanOutExecutor;
use crate::client::{ReqwestTransport, RemoteClient, Transport};
use crate::config::{ProviderEndpoints, ToolsConfig};
use crate::envelope::{EnvelopeMetadata, ResultEnvelope};
use crate::error::ToolError;
use crate::providers::ProviderId;
use crate::query::OperationKind;

/// Per-invocation dependencies: read-only configuration plus the bounded
/// remote client every provider call goes through.
#[derive(Clone)]
pub struct ToolContext {
    pub config: Arc<ToolsConfig>,
    pub client: RemoteClient,
    pub execution_id: String,
}

impl ToolContext {
    pub fn new(config: Arc<ToolsConfig>) -> Self {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(config: Arc<ToolsConfig>, transport: Arc<dyn Transport>) -> Self {
        let client = RemoteClient::new(transport, config.request_timeout);
        Self {
            config,
            client,
            execution_id: Uuid::new_v4().to_string(),
        }
    }

    /// Same dependencies, fresh execution id.
    pub fn fork(&self) -> Self {
        Self {
            execution_id: Uuid::new_v4().to_string(),
            ..self.clone()
        }
    }

    pub fn endpoints(&self) -> &ProviderEndpoints {
        &self.config.endpoints
    }

    pub fn credential(&self, provider: ProviderId) -> Result<&str, ToolError> {
        self.config.require_credential(provider)
    }

    /// Succeeds when at least one of `providers` is usable, i.e. keyless or
    /// holding a credential. Otherwise reports the first missing credential.
    pub fn require_any(&self, providers: &[ProviderId]) -> Result<(), ToolError> {
        let mut first_missing = None;
        for &provider in providers {
            if provider.credential_env().is_none() {
                return Ok(());
            }
            match self.credential(provider) {
                Ok(_) => return Ok(()),
                Err(err) => {
                    first_missing.get_or_insert(err);
                }
            }
        }
        first_missing.map_or(Ok(()), Err)
    }

    pub fn fan_out(&self) -> FanOutExecutor {
        FanOutExecutor::new(self.config.max_batch_symbols)
    }
}

/// Fails with `MissingParameter` naming the first required field that is
/// absent, null, an empty string or an empty array.
pub fn validate(params: &Value, required_fields: &[&str]) -> Result<(), ToolError> {
    for field in required_fields {
        let missing = match params.get(*field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(_) => false,
        };
        if missing {
            return Err(ToolError::MissingParameter(field.to_string()));
        }
    }
    Ok(())
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Registry key, e.g. `get_stock_quote`.
    fn name(&self) -> &str;
    /// Human-readable name recorded as the envelope's `tool`.
    fn display_name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    fn kind(&self) -> OperationKind;

    fn required_fields(&self) -> &[&'static str] {
        &[]
    }

    /// Fallible body of the tool. Errors are turned into degraded envelopes
    /// by `execute`.
    async fn run(&self, params: &Value, ctx: &ToolContext) -> Result<ResultEnvelope, ToolError>;

    /// Always returns an envelope; validation errors, provider failures and
    /// panics inside `run` all become `is_reliable = false` results.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> ResultEnvelope {
        let started = Instant::now();
        info!("🔧 {} [{}] started", self.name(), ctx.execution_id);

        let outcome = match validate(&params, self.required_fields()) {
            Ok(()) => match AssertUnwindSafe(self.run(&params, ctx)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!("💥 {} [{}] panicked: {}", self.name(), ctx.execution_id, message);
                    Err(ToolError::Internal(format!("tool panicked: {}", message)))
                }
            },
            Err(err) => Err(err),
        };

        let envelope = match outcome {
            Ok(envelope) => envelope,
            Err(err) => {
                error!("❌ {} [{}] failed: {}", self.name(), ctx.execution_id, err);
                let metadata = EnvelopeMetadata::new("none", self.kind().data_type());
                ResultEnvelope::failure(self.display_name(), metadata, &err)
            }
        };

        info!(
            "🏁 {} [{}] finished in {}ms (reliable: {})",
            self.name(),
            ctx.execution_id,
            started.elapsed().as_millis(),
            envelope.is_reliable
        );
        envelope.with_execution_id(ctx.execution_id.clone())
    }

    fn schema(&self) -> Value {
        json!({
            "name": self.name(),
            "title": self.display_name(),
            "description": self.description(),
            "inputSchema": self.input_schema(),
        })
    }
}

/// Name-based registry of every tool the crate ships.
#[derive(Clone)]
pub struct ToolResolver {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl Default for ToolResolver {
    fn default() -> Self {
        let mut resolver = Self::empty();
        for tool in crate::tools::all() {
            resolver.register(tool);
        }
        resolver
    }
}

impl ToolResolver {
    pub fn empty() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn get_available_tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn list_tools(&self) -> Vec<Value> {
        self.tools.values().map(|tool| tool.schema()).collect()
    }
}
