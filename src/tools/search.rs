// src/tools/search.rs
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{attempt, bounded_int};
use crate::envelope::{Confidence, ResultEnvelope};
use crate::error::ToolError;
use crate::fallback::FallbackChain;
use crate::models::TickerSearch;
use crate::providers::{finnhub, fmp, ProviderId};
use crate::query::OperationKind;
use crate::tool::{Tool, ToolContext};

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 50;
const MAX_QUERY_LEN: usize = 100;

/// Finds listed symbols by company name or partial ticker.
pub struct TickerSearchTool;

fn search_query(params: &Value) -> Result<&str, ToolError> {
    let query = params
        .get("query")
        .and_then(Value::as_str)
        .map(str::trim)
        .ok_or_else(|| ToolError::invalid("query", "must be a string"))?;
    if query.is_empty() {
        return Err(ToolError::MissingParameter("query".into()));
    }
    if query.chars().count() > MAX_QUERY_LEN {
        return Err(ToolError::invalid(
            "query",
            format!("must be at most {} characters", MAX_QUERY_LEN),
        ));
    }
    Ok(query)
}

#[async_trait]
impl Tool for TickerSearchTool {
    fn name(&self) -> &str {
        "search_ticker"
    }

    fn display_name(&self) -> &str {
        "Ticker Search"
    }

    fn description(&self) -> &str {
        "Look up ticker symbols by company name"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Company name or partial ticker, e.g. Apple"
                },
                "limit": {
                    "type": "integer",
                    "default": DEFAULT_LIMIT,
                    "minimum": 1,
                    "maximum": MAX_LIMIT,
                    "description": "Maximum matches"
                }
            },
            "required": ["query"]
        })
    }

    fn kind(&self) -> OperationKind {
        OperationKind::TickerSearch
    }

    fn required_fields(&self) -> &[&'static str] {
        &["query"]
    }

    async fn run(&self, params: &Value, ctx: &ToolContext) -> Result<ResultEnvelope, ToolError> {
        let query = search_query(params)?;
        let limit = bounded_int(params, "limit", DEFAULT_LIMIT, 1..=MAX_LIMIT)? as usize;
        ctx.require_any(&[ProviderId::Fmp, ProviderId::Finnhub])?;
        let endpoints = ctx.endpoints();
        let client = &ctx.client;

        let resolved = FallbackChain::new(format!("search '{}'", query))
            .keyed_candidate(
                ProviderId::Fmp.source_name(),
                Confidence::High,
                ctx.credential(ProviderId::Fmp),
                move |key| {
                    attempt(client, fmp::search_request(endpoints, key, query, limit), move |raw| {
                        fmp::parse_search(query, raw, limit).map(|results| TickerSearch::new(query, results))
                    })
                },
            )
            .keyed_candidate(
                ProviderId::Finnhub.source_name(),
                Confidence::Medium,
                ctx.credential(ProviderId::Finnhub),
                move |key| {
                    attempt(client, finnhub::symbol_search_request(endpoints, key, query), move |raw| {
                        finnhub::parse_symbol_search(query, raw, limit).map(|results| TickerSearch::new(query, results))
                    })
                },
            )
            .resolve()
            .await?;
        Ok(resolved.into_envelope(self.display_name(), self.kind().data_type()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_query_is_trimmed_and_bounded() {
        assert_eq!(search_query(&json!({"query": "  Apple "})).unwrap(), "Apple");
        let err = search_query(&json!({"query": 42})).unwrap_err();
        assert_eq!(err.kind().as_str(), "validation");
        let long = "x".repeat(MAX_QUERY_LEN + 1);
        assert!(search_query(&json!({ "query": long })).is_err());
    }
}
