// src/tools/news.rs
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use super::{attempt, bounded_int, symbol_schema};
use crate::envelope::{Confidence, ResultEnvelope};
use crate::error::ToolError;
use crate::fallback::{FallbackChain, Resolved};
use crate::models::{NewsArticle, NewsFeed};
use crate::providers::{finnhub, fmp, ProviderId};
use crate::query::{OperationKind, Query};
use crate::tool::{Tool, ToolContext};

pub(crate) const DEFAULT_LIMIT: u32 = 10;
pub(crate) const MAX_LIMIT: u32 = 50;
const DEFAULT_DAYS: u32 = 7;
const MAX_DAYS: u32 = 30;

pub struct NewsTool;

/// Article cap plus the look-back window Finnhub needs as dates.
pub(crate) struct NewsWindow {
    pub limit: usize,
    pub from: String,
    pub to: String,
}

impl NewsWindow {
    pub(crate) fn from_params(params: &Value) -> Result<Self, ToolError> {
        let limit = bounded_int(params, "limit", DEFAULT_LIMIT, 1..=MAX_LIMIT)? as usize;
        let days = bounded_int(params, "days", DEFAULT_DAYS, 1..=MAX_DAYS)?;
        let today = Utc::now().date_naive();
        Ok(Self {
            limit,
            from: (today - Duration::days(i64::from(days))).format("%Y-%m-%d").to_string(),
            to: today.format("%Y-%m-%d").to_string(),
        })
    }
}

pub(crate) fn feed(symbol: &str, articles: Vec<NewsArticle>) -> NewsFeed {
    NewsFeed {
        symbol: symbol.to_string(),
        count: articles.len(),
        articles,
    }
}

#[async_trait]
impl Tool for NewsTool {
    fn name(&self) -> &str {
        "get_news"
    }

    fn display_name(&self) -> &str {
        "Company News"
    }

    fn description(&self) -> &str {
        "Recent news headlines for one or more tickers"
    }

    fn input_schema(&self) -> Value {
        symbol_schema(json!({
            "limit": {
                "type": "integer",
                "default": DEFAULT_LIMIT,
                "minimum": 1,
                "maximum": MAX_LIMIT,
                "description": "Articles per ticker"
            },
            "days": {
                "type": "integer",
                "default": DEFAULT_DAYS,
                "minimum": 1,
                "maximum": MAX_DAYS,
                "description": "Look-back window in days"
            }
        }))
    }

    fn kind(&self) -> OperationKind {
        OperationKind::News
    }

    async fn run(&self, params: &Value, ctx: &ToolContext) -> Result<ResultEnvelope, ToolError> {
        let window = NewsWindow::from_params(params)?;
        let query = Query::from_params(self.kind(), params)?;
        ctx.require_any(&[ProviderId::Fmp, ProviderId::Finnhub])?;
        let window = &window;
        Ok(ctx
            .fan_out()
            .dispatch(self.display_name(), &query, |symbol| company_news(ctx, window, symbol))
            .await)
    }
}

/// FMP stock news, then Finnhub company news over the window.
pub(crate) async fn company_news(ctx: &ToolContext, window: &NewsWindow, symbol: String) -> Result<Resolved, ToolError> {
    let endpoints = ctx.endpoints();
    let client = &ctx.client;
    let symbol = symbol.as_str();
    let (limit, from, to) = (window.limit, window.from.as_str(), window.to.as_str());

    FallbackChain::new(format!("news {}", symbol))
        .keyed_candidate(
            ProviderId::Fmp.source_name(),
            Confidence::High,
            ctx.credential(ProviderId::Fmp),
            move |key| {
                attempt(client, fmp::news_request(endpoints, key, symbol, limit), move |raw| {
                    fmp::parse_news(symbol, raw, limit).map(|articles| feed(symbol, articles))
                })
            },
        )
        .keyed_candidate(
            ProviderId::Finnhub.source_name(),
            Confidence::Medium,
            ctx.credential(ProviderId::Finnhub),
            move |key| {
                attempt(
                    client,
                    finnhub::company_news_request(endpoints, key, symbol, from, to),
                    move |raw| finnhub::parse_company_news(symbol, raw, limit).map(|articles| feed(symbol, articles)),
                )
            },
        )
        .resolve()
        .await
}
