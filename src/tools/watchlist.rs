// src/tools/watchlist.rs
use async_trait::async_trait;
use serde_json::{json, Value};

use super::attempt;
use crate::envelope::{Confidence, ResultEnvelope};
use crate::error::ToolError;
use crate::fallback::FallbackChain;
use crate::models::{Watchlist, WatchlistEntry};
use crate::providers::{watchlist, ProviderId};
use crate::query::OperationKind;
use crate::tool::{Tool, ToolContext};

const DEFAULT_LIST: &str = "default";
const STATIC_SOURCE: &str = "static_watchlist";

/// Tickers the operator tracks. Served by the remote watchlist service when
/// one is configured, otherwise by the static `WATCHLIST_TICKERS` list.
pub struct WatchlistTool;

#[async_trait]
impl Tool for WatchlistTool {
    fn name(&self) -> &str {
        "get_watchlist"
    }

    fn display_name(&self) -> &str {
        "Watchlist"
    }

    fn description(&self) -> &str {
        "Tickers on a named watchlist, from the watchlist service or the configured static list"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "list": {
                    "type": "string",
                    "default": DEFAULT_LIST,
                    "description": "Watchlist name"
                }
            }
        })
    }

    fn kind(&self) -> OperationKind {
        OperationKind::Watchlist
    }

    async fn run(&self, params: &Value, ctx: &ToolContext) -> Result<ResultEnvelope, ToolError> {
        let list = params
            .get("list")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_LIST);
        let endpoints = ctx.endpoints();
        let client = &ctx.client;
        let token = ctx.config.credentials.get(ProviderId::Watchlist);
        let fallback = &ctx.config.static_watchlist;

        if endpoints.watchlist.is_none() && fallback.is_empty() {
            return Err(ToolError::not_configured(
                ProviderId::Watchlist.source_name(),
                "WATCHLIST_API_URL",
            ));
        }

        let mut chain = FallbackChain::new(format!("watchlist {}", list));
        if endpoints.watchlist.is_some() {
            chain = chain.candidate(ProviderId::Watchlist.source_name(), Confidence::High, move || {
                attempt(client, watchlist::list_request(endpoints, token, list), move |raw| {
                    watchlist::parse_entries(list, raw).map(|entries| Watchlist::new(list, entries))
                })
            });
        }
        if !fallback.is_empty() {
            let entries: Vec<WatchlistEntry> = fallback
                .iter()
                .map(|ticker| WatchlistEntry {
                    ticker: ticker.clone(),
                    name: None,
                })
                .collect();
            chain = chain.with_default(
                STATIC_SOURCE,
                &Watchlist::new(list, entries),
                "Serving the static WATCHLIST_TICKERS list",
            )?;
        }

        let resolved = chain.resolve().await?;
        Ok(resolved.into_envelope(self.display_name(), self.kind().data_type()))
    }
}
