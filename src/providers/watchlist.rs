// src/providers/watchlist.rs
//! Remote watchlist service. The service is operator-provided, so several
//! common response shapes are accepted.

use serde_json::Value;

use super::{build_url, text, unexpected_shape, ProviderId};
use crate::client::RemoteRequest;
use crate::config::ProviderEndpoints;
use crate::error::ToolError;
use crate::models::WatchlistEntry;
use crate::symbols::normalize_symbol;

const PROVIDER: ProviderId = ProviderId::Watchlist;

pub fn list_request(
    endpoints: &ProviderEndpoints,
    token: Option<&str>,
    list: &str,
) -> Result<RemoteRequest, ToolError> {
    let base = endpoints
        .watchlist
        .as_deref()
        .ok_or_else(|| ToolError::not_configured(PROVIDER.source_name(), "WATCHLIST_API_URL"))?;
    let url = build_url(PROVIDER, base, "", &[("list", list)])?;
    let request = RemoteRequest::get(PROVIDER.source_name(), url);
    Ok(match token {
        Some(token) => request.with_bearer(token),
        None => request,
    })
}

/// Accepts `["AAPL", ...]`, `[{"ticker": .., "name": ..}, ...]`, or either
/// of those wrapped in `{"tickers": ..}` / `{"data": ..}`.
pub fn parse_entries(list: &str, raw: &Value) -> Result<Vec<WatchlistEntry>, ToolError> {
    let items = match raw {
        Value::Array(items) => items,
        Value::Object(map) => ["tickers", "data", "items"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .ok_or_else(|| unexpected_shape(PROVIDER, "watchlist"))?,
        _ => return Err(unexpected_shape(PROVIDER, "watchlist")),
    };

    let mut entries: Vec<WatchlistEntry> = Vec::with_capacity(items.len());
    for item in items {
        let entry = match item {
            Value::String(ticker) => WatchlistEntry {
                ticker: ticker.clone(),
                name: None,
            },
            Value::Object(_) => match text(item, "ticker").or_else(|| text(item, "symbol")) {
                Some(ticker) => WatchlistEntry {
                    ticker,
                    name: text(item, "company_name").or_else(|| text(item, "name")),
                },
                None => continue,
            },
            _ => continue,
        };
        // Malformed tickers from the service are skipped rather than failing the list.
        let Ok(ticker) = normalize_symbol(&entry.ticker, "ticker") else {
            log::debug!("Skipping malformed watchlist ticker '{}'", entry.ticker);
            continue;
        };
        if entries.iter().all(|e| e.ticker != ticker) {
            entries.push(WatchlistEntry { ticker, ..entry });
        }
    }

    if entries.is_empty() {
        return Err(ToolError::not_found(
            PROVIDER.source_name(),
            format!("watchlist '{}' is empty", list),
        ));
    }
    Ok(entries)
}
