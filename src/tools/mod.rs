// src/tools/mod.rs
pub mod asset_type;
pub mod calculator;
pub mod earnings;
pub mod fundamentals;
pub mod key_metrics;
pub mod market_news;
pub mod news;
pub mod quote;
pub mod ratios;
pub mod search;
pub mod technical;
pub mod watchlist;

use serde_json::{json, Value};
use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::client::{RemoteClient, RemoteRequest};
use crate::error::ToolError;
use crate::providers::fetch;
use crate::tool::Tool;

pub fn all() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(quote::StockQuoteTool),
        Arc::new(fundamentals::FundamentalsTool),
        Arc::new(ratios::FinancialRatiosTool),
        Arc::new(key_metrics::KeyMetricsTool),
        Arc::new(technical::TechnicalIndicatorTool),
        Arc::new(news::NewsTool),
        Arc::new(market_news::MarketNewsTool),
        Arc::new(search::TickerSearchTool),
        Arc::new(asset_type::AssetTypeTool),
        Arc::new(watchlist::WatchlistTool),
        Arc::new(earnings::EarningsCalendarTool),
        Arc::new(calculator::CalculateMetricTool),
    ]
}

/// One provider attempt: build the request, send it, parse the body.
/// Request construction errors surface before any I/O.
pub(crate) async fn attempt<T, P>(
    client: &RemoteClient,
    request: Result<RemoteRequest, ToolError>,
    parse: P,
) -> Result<T, ToolError>
where
    P: FnOnce(&Value) -> Result<T, ToolError>,
{
    fetch(client, request?, parse).await
}

/// Schema fragment shared by every symbol-driven tool.
pub(crate) fn symbol_properties() -> Value {
    json!({
        "symbol": {
            "type": "string",
            "description": "Ticker symbol, e.g. AAPL or BRK.B"
        },
        "symbols": {
            "type": "array",
            "items": {"type": "string"},
            "description": "Several tickers fetched concurrently (capped per request)"
        },
        "all_tickers": {
            "type": "array",
            "items": {"type": "string"},
            "description": "Alias of symbols"
        }
    })
}

/// Merges `extra` properties into the shared symbol schema.
pub(crate) fn symbol_schema(extra: Value) -> Value {
    let mut properties = symbol_properties();
    if let (Some(target), Value::Object(extra)) = (properties.as_object_mut(), extra) {
        target.extend(extra);
    }
    json!({
        "type": "object",
        "properties": properties
    })
}

/// Optional integer parameter, defaulted and range checked. Numeric strings
/// are accepted.
pub(crate) fn bounded_int(
    params: &Value,
    name: &str,
    default: u32,
    range: RangeInclusive<u32>,
) -> Result<u32, ToolError> {
    let value = match params.get(name) {
        None | Some(Value::Null) => return Ok(default),
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(_) => None,
    };
    match value {
        Some(v) if v >= u64::from(*range.start()) && v <= u64::from(*range.end()) => Ok(v as u32),
        _ => Err(ToolError::invalid(
            name,
            format!("must be an integer between {} and {}", range.start(), range.end()),
        )),
    }
}

/// Optional string parameter restricted to `allowed`, lower-cased.
pub(crate) fn one_of(params: &Value, name: &str, default: &str, allowed: &[&str]) -> Result<String, ToolError> {
    let value = match params.get(name) {
        None | Some(Value::Null) => return Ok(default.to_string()),
        Some(Value::String(s)) => s.trim().to_lowercase(),
        Some(other) => other.to_string(),
    };
    if allowed.contains(&value.as_str()) {
        Ok(value)
    } else {
        Err(ToolError::invalid(
            name,
            format!("'{}' is not one of {}", value, allowed.join(", ")),
        ))
    }
}
