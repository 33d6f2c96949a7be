// src/providers/yahoo.rs
//! Yahoo Finance quote endpoint. Keyless; used as the low-confidence quote
//! source and as the primary quote-type classifier.

use serde_json::Value;

use super::{build_url, first_record, num, require_num, text, unexpected_shape, ProviderId};
use crate::client::RemoteRequest;
use crate::config::ProviderEndpoints;
use crate::error::ToolError;
use crate::models::{AssetClassification, Quote};
use crate::symbols::provider_symbol;

const PROVIDER: ProviderId = ProviderId::Yahoo;

pub fn quote_request(endpoints: &ProviderEndpoints, symbol: &str) -> Result<RemoteRequest, ToolError> {
    let ticker = provider_symbol(PROVIDER, symbol);
    let url = build_url(
        PROVIDER,
        &endpoints.yahoo,
        "/v7/finance/quote",
        &[("symbols", ticker.as_str())],
    )?;
    Ok(RemoteRequest::get(PROVIDER.source_name(), url))
}

/// Accepts the `quoteResponse.result[]` envelope or a bare quote object.
fn quote_record<'a>(symbol: &str, raw: &'a Value) -> Result<&'a Value, ToolError> {
    match raw.get("quoteResponse") {
        Some(response) => {
            let result = response
                .get("result")
                .ok_or_else(|| unexpected_shape(PROVIDER, "quote response"))?;
            first_record(PROVIDER, result, &format!("quote for {}", symbol))
        }
        None => first_record(PROVIDER, raw, &format!("quote for {}", symbol)),
    }
}

pub fn parse_quote(symbol: &str, raw: &Value) -> Result<Quote, ToolError> {
    let record = quote_record(symbol, raw)?;
    let mut quote = Quote::new(symbol, require_num(PROVIDER, record, "regularMarketPrice")?);
    quote.change = num(record, "regularMarketChange");
    quote.change_percent = num(record, "regularMarketChangePercent");
    quote.open = num(record, "regularMarketOpen");
    quote.day_high = num(record, "regularMarketDayHigh");
    quote.day_low = num(record, "regularMarketDayLow");
    quote.previous_close = num(record, "regularMarketPreviousClose");
    quote.volume = num(record, "regularMarketVolume");
    quote.market_cap = num(record, "marketCap");
    quote.name = text(record, "longName").or_else(|| text(record, "shortName"));
    quote.exchange = text(record, "fullExchangeName").or_else(|| text(record, "exchange"));
    quote.currency = text(record, "currency");
    Ok(quote)
}

/// Product type, category and analysis framework for a Yahoo `quoteType`.
fn quote_type_mapping(quote_type: &str) -> Option<(&'static str, &'static str, &'static str)> {
    let mapping = match quote_type {
        "EQUITY" => ("Common Stock", "Equity", "stock_analysis"),
        "ETF" => ("ETF", "Exchange Traded Fund", "etf_analysis"),
        "MUTUALFUND" => ("Mutual Fund", "Fund", "fund_analysis"),
        "INDEX" => ("Index", "Index", "index_analysis"),
        "CRYPTOCURRENCY" => ("Cryptocurrency", "Digital Asset", "crypto_analysis"),
        "CURRENCY" => ("Currency", "Foreign Exchange", "fx_analysis"),
        "FUTURE" => ("Future", "Derivative", "derivatives_analysis"),
        "OPTION" => ("Option", "Derivative", "derivatives_analysis"),
        _ => return None,
    };
    Some(mapping)
}

pub fn parse_classification(symbol: &str, raw: &Value) -> Result<AssetClassification, ToolError> {
    let record = quote_record(symbol, raw)?;
    let quote_type = text(record, "quoteType")
        .map(|t| t.to_uppercase())
        .ok_or_else(|| ToolError::incomplete(PROVIDER.source_name(), "quoteType"))?;
    // An unrecognised type cannot disambiguate the symbol either.
    let (product_type, product_category, framework) =
        quote_type_mapping(&quote_type).ok_or_else(|| ToolError::incomplete(PROVIDER.source_name(), "quoteType"))?;
    Ok(AssetClassification {
        symbol: symbol.to_string(),
        name: text(record, "longName").or_else(|| text(record, "shortName")),
        product_type: product_type.to_string(),
        product_category: product_category.to_string(),
        analysis_framework: framework.to_string(),
        quote_type: Some(quote_type),
        exchange: text(record, "fullExchangeName").or_else(|| text(record, "exchange")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equity_is_common_stock() {
        let raw = json!({"quoteType": "EQUITY", "longName": "ZZZZ Inc"});
        let class = parse_classification("ZZZZ", &raw).unwrap();
        assert_eq!(class.product_type, "Common Stock");
        assert_eq!(class.analysis_framework, "stock_analysis");
        assert_eq!(class.name.as_deref(), Some("ZZZZ Inc"));
    }

    #[test]
    fn envelope_form_is_unwrapped() {
        let raw = json!({"quoteResponse": {"result": [{"quoteType": "ETF", "symbol": "SPY"}], "error": null}});
        let class = parse_classification("SPY", &raw).unwrap();
        assert_eq!(class.analysis_framework, "etf_analysis");
    }

    #[test]
    fn missing_quote_type_is_incomplete() {
        let raw = json!({"longName": "Mystery Corp"});
        let err = parse_classification("MYST", &raw).unwrap_err();
        assert_eq!(err.kind().as_str(), "incomplete_payload");
        assert!(err.triggers_fallback());
    }

    #[test]
    fn empty_result_is_not_found() {
        let raw = json!({"quoteResponse": {"result": []}});
        assert!(matches!(parse_quote("ZZZZ", &raw), Err(ToolError::NotFound { .. })));
    }

    #[test]
    fn class_shares_use_dashes() {
        let request = quote_request(&ProviderEndpoints::default(), "BRK.B").unwrap();
        assert!(request.url.ends_with("symbols=BRK-B"));
    }
}
