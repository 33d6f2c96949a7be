// src/tools/market_news.rs
use async_trait::async_trait;
use serde_json::{json, Value};

use super::news::{company_news, feed, NewsWindow, DEFAULT_LIMIT, MAX_LIMIT};
use super::{attempt, symbol_schema};
use crate::envelope::{Confidence, ResultEnvelope};
use crate::error::ToolError;
use crate::fallback::FallbackChain;
use crate::providers::{finnhub, fmp, ProviderId};
use crate::query::{requested_symbols, OperationKind, Query};
use crate::tool::{Tool, ToolContext};

/// Label used as the feed symbol for market-wide headlines.
const MARKET: &str = "market";

/// Market-wide headlines, or company news when tickers are given.
pub struct MarketNewsTool;

#[async_trait]
impl Tool for MarketNewsTool {
    fn name(&self) -> &str {
        "get_market_news"
    }

    fn display_name(&self) -> &str {
        "Market News"
    }

    fn description(&self) -> &str {
        "General market headlines; pass a ticker to narrow them to one company"
    }

    fn input_schema(&self) -> Value {
        symbol_schema(json!({
            "ticker": {
                "type": "string",
                "description": "Optional ticker; omit for market-wide news"
            },
            "limit": {
                "type": "integer",
                "default": DEFAULT_LIMIT,
                "minimum": 1,
                "maximum": MAX_LIMIT,
                "description": "Articles to return"
            }
        }))
    }

    fn kind(&self) -> OperationKind {
        OperationKind::MarketNews
    }

    async fn run(&self, params: &Value, ctx: &ToolContext) -> Result<ResultEnvelope, ToolError> {
        let window = NewsWindow::from_params(params)?;
        ctx.require_any(&[ProviderId::Fmp, ProviderId::Finnhub])?;

        if !requested_symbols(params).is_empty() {
            let query = Query::from_params(self.kind(), params)?;
            let window = &window;
            return Ok(ctx
                .fan_out()
                .dispatch(self.display_name(), &query, |symbol| company_news(ctx, window, symbol))
                .await);
        }

        let endpoints = ctx.endpoints();
        let client = &ctx.client;
        let limit = window.limit;
        let resolved = FallbackChain::new("market news")
            .keyed_candidate(
                ProviderId::Fmp.source_name(),
                Confidence::High,
                ctx.credential(ProviderId::Fmp),
                move |key| {
                    attempt(client, fmp::general_news_request(endpoints, key), move |raw| {
                        fmp::parse_news(MARKET, raw, limit).map(|articles| feed(MARKET, articles))
                    })
                },
            )
            .keyed_candidate(
                ProviderId::Finnhub.source_name(),
                Confidence::Medium,
                ctx.credential(ProviderId::Finnhub),
                move |key| {
                    attempt(client, finnhub::market_news_request(endpoints, key), move |raw| {
                        finnhub::parse_company_news(MARKET, raw, limit).map(|articles| feed(MARKET, articles))
                    })
                },
            )
            .resolve()
            .await?;
        Ok(resolved.into_envelope(self.display_name(), self.kind().data_type()))
    }
}
