// src/query.rs
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::error::ToolError;
use crate::symbols::normalize_symbol;

/// Parameter names that may carry a symbol list, in precedence order.
const LIST_FIELDS: [&str; 3] = ["all_tickers", "symbols", "tickers"];
/// Parameter names that may carry a single symbol, in precedence order.
const SINGLE_FIELDS: [&str; 2] = ["symbol", "ticker"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Quote,
    Fundamentals,
    Ratios,
    KeyMetrics,
    TechnicalIndicator,
    News,
    MarketNews,
    TickerSearch,
    AssetType,
    Watchlist,
    EarningsCalendar,
    Calculation,
}

impl OperationKind {
    /// `data_type` tag recorded on single-symbol envelopes.
    pub const fn data_type(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Fundamentals => "company_profile",
            Self::Ratios => "financial_ratios_ttm",
            Self::KeyMetrics => "key_metrics_ttm",
            Self::TechnicalIndicator => "technical_indicator",
            Self::News => "news",
            Self::MarketNews => "market_news",
            Self::TickerSearch => "ticker_search",
            Self::AssetType => "asset_type",
            Self::Watchlist => "watchlist",
            Self::EarningsCalendar => "earnings_calendar",
            Self::Calculation => "calculation",
        }
    }

    /// Batch category: names the `<category>_by_ticker` map.
    pub const fn category(self) -> &'static str {
        match self {
            Self::Quote => "quotes",
            Self::Fundamentals => "fundamentals",
            Self::Ratios => "ratios",
            Self::KeyMetrics => "metrics",
            Self::TechnicalIndicator => "indicators",
            Self::News | Self::MarketNews => "news",
            Self::TickerSearch => "searches",
            Self::AssetType => "asset_types",
            Self::Watchlist => "watchlist",
            Self::EarningsCalendar => "earnings",
            Self::Calculation => "calculations",
        }
    }

    pub fn batch_data_type(self) -> String {
        format!("{}_multi_ticker", self.data_type())
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.data_type())
    }
}

/// One caller request: an operation over an ordered, de-duplicated,
/// upper-cased list of requested symbols. The fan-out executor applies the
/// batch cap and then validates each symbol it keeps.
#[derive(Debug, Clone)]
pub struct Query {
    pub kind: OperationKind,
    pub symbols: Vec<String>,
}

impl Query {
    pub fn from_params(kind: OperationKind, params: &Value) -> Result<Self, ToolError> {
        let symbols = requested_symbols(params);
        if symbols.is_empty() {
            return Err(ToolError::MissingParameter("symbol".to_string()));
        }
        debug!("{} query for {}", kind, symbols.join(","));
        Ok(Self { kind, symbols })
    }
}

/// Symbols named by `params`, trimmed, upper-cased and de-duplicated but not
/// yet validated. List fields win over single fields.
pub fn requested_symbols(params: &Value) -> Vec<String> {
    for field in LIST_FIELDS {
        let raw: Vec<&str> = match params.get(field) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(list)) => list.split(',').collect(),
            _ => continue,
        };
        let symbols = dedupe(raw);
        if !symbols.is_empty() {
            return symbols;
        }
    }

    SINGLE_FIELDS
        .iter()
        .filter_map(|field| params.get(*field).and_then(Value::as_str))
        .map(|raw| dedupe(vec![raw]))
        .find(|symbols| !symbols.is_empty())
        .unwrap_or_default()
}

/// Requested symbols, every one validated. Used where symbols filter a
/// result rather than drive a fan-out.
pub fn extract_symbols(params: &Value) -> Result<Vec<String>, ToolError> {
    let symbols = requested_symbols(params);
    if symbols.is_empty() {
        return Err(ToolError::MissingParameter("symbol".to_string()));
    }
    symbols
        .iter()
        .map(|symbol| normalize_symbol(symbol, "symbols"))
        .collect()
}

fn dedupe(raw: Vec<&str>) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for item in raw {
        let symbol = item.trim().to_uppercase();
        if !symbol.is_empty() && !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_fields_take_precedence_and_dedupe() {
        let params = json!({"all_tickers": ["aapl", "msft", "AAPL"], "ticker": "TSLA"});
        assert_eq!(extract_symbols(&params).unwrap(), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn accepts_comma_separated_strings() {
        let params = json!({"symbols": "nvda, amd ,"});
        assert_eq!(extract_symbols(&params).unwrap(), vec!["NVDA", "AMD"]);
    }

    #[test]
    fn falls_back_to_single_symbol() {
        let params = json!({"all_tickers": [], "ticker": " shop.to "});
        assert_eq!(extract_symbols(&params).unwrap(), vec!["SHOP.TO"]);
    }

    #[test]
    fn no_symbol_is_a_missing_parameter() {
        let err = extract_symbols(&json!({"limit": 3})).unwrap_err();
        assert_eq!(err, ToolError::MissingParameter("symbol".into()));
    }

    #[test]
    fn requested_symbols_are_not_validated() {
        let params = json!({"symbols": ["aapl", "bad ticker!", "AAPL"]});
        assert_eq!(requested_symbols(&params), vec!["AAPL", "BAD TICKER!"]);
        let query = Query::from_params(OperationKind::Quote, &params).unwrap();
        assert_eq!(query.symbols.len(), 2);
    }

    #[test]
    fn invalid_entry_names_its_field() {
        let err = extract_symbols(&json!({"symbols": ["AAPL", "not a ticker"]})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameter { name, .. } if name == "symbols"));
    }
}
