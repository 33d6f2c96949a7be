// src/tools/fundamentals.rs
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{attempt, symbol_schema};
use crate::envelope::{Confidence, ResultEnvelope};
use crate::error::ToolError;
use crate::fallback::FallbackChain;
use crate::providers::{alphavantage, finnhub, fmp, ProviderId};
use crate::query::{OperationKind, Query};
use crate::tool::{Tool, ToolContext};

/// Company profile: name, exchange, sector, industry, market cap.
pub struct FundamentalsTool;

#[async_trait]
impl Tool for FundamentalsTool {
    fn name(&self) -> &str {
        "get_fundamentals"
    }

    fn display_name(&self) -> &str {
        "Company Fundamentals"
    }

    fn description(&self) -> &str {
        "Company profile (name, exchange, sector, industry, market cap, description) for one or more tickers"
    }

    fn input_schema(&self) -> Value {
        symbol_schema(json!({}))
    }

    fn kind(&self) -> OperationKind {
        OperationKind::Fundamentals
    }

    async fn run(&self, params: &Value, ctx: &ToolContext) -> Result<ResultEnvelope, ToolError> {
        let query = Query::from_params(self.kind(), params)?;
        ctx.require_any(&[ProviderId::Fmp, ProviderId::Finnhub, ProviderId::AlphaVantage])?;

        Ok(ctx
            .fan_out()
            .dispatch(self.display_name(), &query, |symbol| async move {
                let endpoints = ctx.endpoints();
                let client = &ctx.client;
                let symbol = symbol.as_str();
                FallbackChain::new(format!("profile {}", symbol))
                    .keyed_candidate(
                        ProviderId::Fmp.source_name(),
                        Confidence::High,
                        ctx.credential(ProviderId::Fmp),
                        move |key| {
                            attempt(client, fmp::profile_request(endpoints, key, symbol), move |raw| {
                                fmp::parse_profile(symbol, raw)
                            })
                        },
                    )
                    .keyed_candidate(
                        ProviderId::Finnhub.source_name(),
                        Confidence::Medium,
                        ctx.credential(ProviderId::Finnhub),
                        move |key| {
                            attempt(client, finnhub::profile_request(endpoints, key, symbol), move |raw| {
                                finnhub::parse_profile(symbol, raw)
                            })
                        },
                    )
                    .keyed_candidate(
                        ProviderId::AlphaVantage.source_name(),
                        Confidence::Medium,
                        ctx.credential(ProviderId::AlphaVantage),
                        move |key| {
                            attempt(client, alphavantage::overview_request(endpoints, key, symbol), move |raw| {
                                alphavantage::parse_overview_profile(symbol, raw)
                            })
                        },
                    )
                    .resolve()
                    .await
            })
            .await)
    }
}
