// src/tools/ratios.rs
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{attempt, symbol_schema};
use crate::envelope::{Confidence, ResultEnvelope};
use crate::error::ToolError;
use crate::fallback::{FallbackChain, Resolved};
use crate::providers::{alphavantage, fmp, ProviderId};
use crate::query::{OperationKind, Query};
use crate::tool::{Tool, ToolContext};

pub struct FinancialRatiosTool;

#[async_trait]
impl Tool for FinancialRatiosTool {
    fn name(&self) -> &str {
        "get_financial_ratios"
    }

    fn display_name(&self) -> &str {
        "Financial Ratios"
    }

    fn description(&self) -> &str {
        "Trailing-twelve-month valuation, profitability and leverage ratios (P/E, P/B, ROE, margins, debt/equity)"
    }

    fn input_schema(&self) -> Value {
        symbol_schema(json!({}))
    }

    fn kind(&self) -> OperationKind {
        OperationKind::Ratios
    }

    async fn run(&self, params: &Value, ctx: &ToolContext) -> Result<ResultEnvelope, ToolError> {
        let query = Query::from_params(self.kind(), params)?;
        ctx.require_any(&[ProviderId::Fmp, ProviderId::AlphaVantage])?;
        Ok(ctx
            .fan_out()
            .dispatch(self.display_name(), &query, |symbol| resolve_ratios(ctx, symbol))
            .await)
    }
}

async fn resolve_ratios(ctx: &ToolContext, symbol: String) -> Result<Resolved, ToolError> {
    let endpoints = ctx.endpoints();
    let client = &ctx.client;
    let symbol = symbol.as_str();

    FallbackChain::new(format!("ratios {}", symbol))
        .keyed_candidate(
            ProviderId::Fmp.source_name(),
            Confidence::High,
            ctx.credential(ProviderId::Fmp),
            move |key| {
                attempt(client, fmp::ratios_request(endpoints, key, symbol), move |raw| {
                    fmp::parse_ratios(symbol, raw)
                })
            },
        )
        .keyed_candidate(
            ProviderId::AlphaVantage.source_name(),
            Confidence::Medium,
            ctx.credential(ProviderId::AlphaVantage),
            move |key| {
                attempt(client, alphavantage::overview_request(endpoints, key, symbol), move |raw| {
                    alphavantage::parse_overview_ratios(symbol, raw)
                })
            },
        )
        .resolve()
        .await
}
