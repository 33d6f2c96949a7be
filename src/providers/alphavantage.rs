// src/providers/alphavantage.rs
//! Alpha Vantage adapter. Throttling and usage notices arrive as HTTP 200
//! bodies and are surfaced as rejections.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::{as_number, build_url, first_record, num, num_any, rejected, require_num, require_text, text, unexpected_shape, ProviderId};
use crate::client::RemoteRequest;
use crate::config::ProviderEndpoints;
use crate::error::ToolError;
use crate::models::{CompanyProfile, FinancialRatios, IndicatorPoint, IndicatorSeries, Quote};
use crate::symbols::provider_symbol;

const PROVIDER: ProviderId = ProviderId::AlphaVantage;

fn request(endpoints: &ProviderEndpoints, key: &str, params: &[(&str, &str)]) -> Result<RemoteRequest, ToolError> {
    let mut query = params.to_vec();
    query.push(("apikey", key));
    let url = build_url(PROVIDER, &endpoints.alphavantage, "/query", &query)?;
    Ok(RemoteRequest::get(PROVIDER.source_name(), url))
}

pub fn global_quote_request(endpoints: &ProviderEndpoints, key: &str, symbol: &str) -> Result<RemoteRequest, ToolError> {
    let ticker = provider_symbol(PROVIDER, symbol);
    request(endpoints, key, &[("function", "GLOBAL_QUOTE"), ("symbol", ticker.as_str())])
}

pub fn overview_request(endpoints: &ProviderEndpoints, key: &str, symbol: &str) -> Result<RemoteRequest, ToolError> {
    let ticker = provider_symbol(PROVIDER, symbol);
    request(endpoints, key, &[("function", "OVERVIEW"), ("symbol", ticker.as_str())])
}

/// `interval` is one of daily / weekly / monthly.
pub fn indicator_request(
    endpoints: &ProviderEndpoints,
    key: &str,
    symbol: &str,
    indicator: &str,
    interval: &str,
    period: u32,
) -> Result<RemoteRequest, ToolError> {
    let ticker = provider_symbol(PROVIDER, symbol);
    let function = indicator.to_uppercase();
    let period = period.to_string();
    let mut params = vec![
        ("function", function.as_str()),
        ("symbol", ticker.as_str()),
        ("interval", interval),
        ("series_type", "close"),
    ];
    if function != "MACD" {
        params.push(("time_period", period.as_str()));
    }
    request(endpoints, key, &params)
}

fn check_notice(raw: &Value) -> Result<(), ToolError> {
    for field in ["Note", "Information"] {
        if let Some(message) = raw.get(field).and_then(Value::as_str) {
            return Err(rejected(PROVIDER, message));
        }
    }
    Ok(())
}

pub fn parse_global_quote(symbol: &str, raw: &Value) -> Result<Quote, ToolError> {
    check_notice(raw)?;
    let body = raw
        .get("Global Quote")
        .ok_or_else(|| unexpected_shape(PROVIDER, "global quote"))?;
    let record = first_record(PROVIDER, body, &format!("quote for {}", symbol))?;
    let mut quote = Quote::new(symbol, require_num(PROVIDER, record, "05. price")?);
    quote.open = num(record, "02. open");
    quote.day_high = num(record, "03. high");
    quote.day_low = num(record, "04. low");
    quote.volume = num(record, "06. volume");
    quote.as_of = text(record, "07. latest trading day");
    quote.previous_close = num(record, "08. previous close");
    quote.change = num(record, "09. change");
    quote.change_percent = num(record, "10. change percent");
    Ok(quote)
}

pub fn parse_overview_profile(symbol: &str, raw: &Value) -> Result<CompanyProfile, ToolError> {
    check_notice(raw)?;
    let record = first_record(PROVIDER, raw, &format!("overview for {}", symbol))?;
    Ok(CompanyProfile {
        symbol: symbol.to_string(),
        name: require_text(PROVIDER, record, "Name")?,
        exchange: text(record, "Exchange"),
        currency: text(record, "Currency"),
        country: text(record, "Country"),
        sector: text(record, "Sector"),
        industry: text(record, "Industry"),
        market_cap: num(record, "MarketCapitalization"),
        beta: num(record, "Beta"),
        employees: num(record, "FullTimeEmployees").map(|n| n as u64),
        ipo_date: None,
        website: text(record, "OfficialSite"),
        description: text(record, "Description"),
    })
}

pub fn parse_overview_ratios(symbol: &str, raw: &Value) -> Result<FinancialRatios, ToolError> {
    check_notice(raw)?;
    let r = first_record(PROVIDER, raw, &format!("overview for {}", symbol))?;
    require_text(PROVIDER, r, "Symbol")?;
    Ok(FinancialRatios {
        symbol: symbol.to_string(),
        pe_ratio: num_any(r, &["PERatio", "TrailingPE"]),
        peg_ratio: num(r, "PEGRatio"),
        price_to_book: num(r, "PriceToBookRatio"),
        price_to_sales: num(r, "PriceToSalesRatioTTM"),
        dividend_yield: num(r, "DividendYield"),
        payout_ratio: None,
        return_on_equity: num(r, "ReturnOnEquityTTM"),
        return_on_assets: num(r, "ReturnOnAssetsTTM"),
        gross_margin: None,
        operating_margin: num(r, "OperatingMarginTTM"),
        net_margin: num(r, "ProfitMargin"),
        debt_to_equity: None,
        current_ratio: None,
        quick_ratio: None,
        interest_coverage: None,
    })
}

pub fn parse_indicator(
    symbol: &str,
    indicator: &str,
    interval: &str,
    period: u32,
    limit: usize,
    raw: &Value,
) -> Result<IndicatorSeries, ToolError> {
    check_notice(raw)?;
    if let Some(message) = raw.get("Error Message").and_then(Value::as_str) {
        return Err(ToolError::not_found(PROVIDER.source_name(), message));
    }
    let series = raw
        .as_object()
        .and_then(|map| {
            map.iter()
                .find(|(key, _)| key.starts_with("Technical Analysis"))
                .and_then(|(_, value)| value.as_object())
        })
        .ok_or_else(|| {
            ToolError::not_found(
                PROVIDER.source_name(),
                format!("no {} series for {}", indicator, symbol),
            )
        })?;

    let mut dates: Vec<&String> = series.keys().collect();
    // ISO dates sort lexicographically.
    dates.sort_unstable_by(|a, b| b.cmp(a));
    let points: Vec<IndicatorPoint> = dates
        .into_iter()
        .filter_map(|date| {
            let values = numeric_fields(series.get(date)?.as_object()?);
            (!values.is_empty()).then(|| IndicatorPoint {
                datetime: date.clone(),
                values,
            })
        })
        .take(limit)
        .collect();

    if points.is_empty() {
        return Err(ToolError::not_found(
            PROVIDER.source_name(),
            format!("no {} values for {}", indicator, symbol),
        ));
    }
    Ok(IndicatorSeries {
        symbol: symbol.to_string(),
        indicator: indicator.to_string(),
        interval: interval.to_string(),
        period,
        points,
    })
}

fn numeric_fields(map: &Map<String, Value>) -> BTreeMap<String, f64> {
    map.iter()
        .filter_map(|(key, value)| as_number(value).map(|n| (key.to_lowercase(), n)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn throttle_note_is_a_rejection() {
        let raw = json!({"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."});
        let err = parse_global_quote("AAPL", &raw).unwrap_err();
        assert_eq!(err.kind().as_str(), "provider_rejected");
    }

    #[test]
    fn empty_global_quote_is_not_found() {
        let err = parse_global_quote("ZZZZ", &json!({"Global Quote": {}})).unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[test]
    fn global_quote_parses_string_numbers() {
        let raw = json!({"Global Quote": {"01. symbol": "IBM", "05. price": "171.2300", "10. change percent": "0.5012%"}});
        let quote = parse_global_quote("IBM", &raw).unwrap();
        assert_eq!(quote.price, 171.23);
        assert_eq!(quote.change_percent, Some(0.5012));
    }

    #[test]
    fn indicator_series_is_newest_first_and_limited() {
        let raw = json!({
            "Meta Data": {"1: Symbol": "IBM"},
            "Technical Analysis: RSI": {
                "2024-01-03": {"RSI": "51.0"},
                "2024-01-05": {"RSI": "55.5"},
                "2024-01-04": {"RSI": "53.2"}
            }
        });
        let series = parse_indicator("IBM", "rsi", "daily", 14, 2, &raw).unwrap();
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.latest().unwrap().datetime, "2024-01-05");
        assert_eq!(series.points[0].values.get("rsi"), Some(&55.5));
    }

    #[test]
    fn macd_request_omits_time_period() {
        let request = indicator_request(&ProviderEndpoints::default(), "k", "IBM", "macd", "daily", 14).unwrap();
        assert!(request.url.contains("function=MACD"));
        assert!(!request.url.contains("time_period"));
    }
}
