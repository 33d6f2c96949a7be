// src/tools/quote.rs
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{attempt, symbol_schema};
use crate::envelope::{Confidence, ResultEnvelope};
use crate::error::ToolError;
use crate::fallback::{FallbackChain, Resolved};
use crate::providers::{alphavantage, finnhub, fmp, yahoo, ProviderId};
use crate::query::{OperationKind, Query};
use crate::tool::{Tool, ToolContext};

pub struct StockQuoteTool;

#[async_trait]
impl Tool for StockQuoteTool {
    fn name(&self) -> &str {
        "get_stock_quote"
    }

    fn display_name(&self) -> &str {
        "Stock Quote"
    }

    fn description(&self) -> &str {
        "Latest price, change, day range and volume for one or more tickers, with provider fallback"
    }

    fn input_schema(&self) -> Value {
        symbol_schema(json!({}))
    }

    fn kind(&self) -> OperationKind {
        OperationKind::Quote
    }

    async fn run(&self, params: &Value, ctx: &ToolContext) -> Result<ResultEnvelope, ToolError> {
        let query = Query::from_params(self.kind(), params)?;
        Ok(ctx
            .fan_out()
            .dispatch(self.display_name(), &query, |symbol| resolve_quote(ctx, symbol))
            .await)
    }
}

async fn resolve_quote(ctx: &ToolContext, symbol: String) -> Result<Resolved, ToolError> {
    let endpoints = ctx.endpoints();
    let client = &ctx.client;
    let symbol = symbol.as_str();

    FallbackChain::new(format!("quote {}", symbol))
        .keyed_candidate(
            ProviderId::Fmp.source_name(),
            Confidence::High,
            ctx.credential(ProviderId::Fmp),
            move |key| {
                attempt(client, fmp::quote_request(endpoints, key, symbol), move |raw| {
                    fmp::parse_quote(symbol, raw)
                })
            },
        )
        .keyed_candidate(
            ProviderId::Finnhub.source_name(),
            Confidence::Medium,
            ctx.credential(ProviderId::Finnhub),
            move |key| {
                attempt(client, finnhub::quote_request(endpoints, key, symbol), move |raw| {
                    finnhub::parse_quote(symbol, raw)
                })
            },
        )
        .keyed_candidate(
            ProviderId::AlphaVantage.source_name(),
            Confidence::Medium,
            ctx.credential(ProviderId::AlphaVantage),
            move |key| {
                attempt(client, alphavantage::global_quote_request(endpoints, key, symbol), move |raw| {
                    alphavantage::parse_global_quote(symbol, raw)
                })
            },
        )
        .candidate(ProviderId::Yahoo.source_name(), Confidence::Low, move || {
            attempt(client, yahoo::quote_request(endpoints, symbol), move |raw| {
                yahoo::parse_quote(symbol, raw)
            })
        })
        .resolve()
        .await
}
