// src/tools/key_metrics.rs
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{attempt, symbol_schema};
use crate::envelope::{Confidence, ResultEnvelope};
use crate::error::ToolError;
use crate::fallback::FallbackChain;
use crate::providers::{fmp, ProviderId};
use crate::query::{OperationKind, Query};
use crate::tool::{Tool, ToolContext};

/// Per-share and enterprise-value metrics. FMP is the only provider with a
/// comparable TTM endpoint, so the chain has a single candidate.
pub struct KeyMetricsTool;

#[async_trait]
impl Tool for KeyMetricsTool {
    fn name(&self) -> &str {
        "get_key_metrics"
    }

    fn display_name(&self) -> &str {
        "Key Metrics"
    }

    fn description(&self) -> &str {
        "Trailing-twelve-month key metrics (EV/EBITDA, per-share values, yields, ROIC, Graham number)"
    }

    fn input_schema(&self) -> Value {
        symbol_schema(json!({}))
    }

    fn kind(&self) -> OperationKind {
        OperationKind::KeyMetrics
    }

    async fn run(&self, params: &Value, ctx: &ToolContext) -> Result<ResultEnvelope, ToolError> {
        let query = Query::from_params(self.kind(), params)?;
        let key = ctx.credential(ProviderId::Fmp)?;
        let endpoints = ctx.endpoints();
        let client = &ctx.client;

        Ok(ctx
            .fan_out()
            .dispatch(self.display_name(), &query, |symbol| async move {
                let symbol = symbol.as_str();
                FallbackChain::new(format!("key metrics {}", symbol))
                    .candidate(ProviderId::Fmp.source_name(), Confidence::High, move || {
                        attempt(client, fmp::key_metrics_request(endpoints, key, symbol), move |raw| {
                            fmp::parse_key_metrics(symbol, raw)
                        })
                    })
                    .resolve()
                    .await
            })
            .await)
    }
}
