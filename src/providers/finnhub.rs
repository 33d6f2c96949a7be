// src/providers/finnhub.rs
//! Finnhub adapter. Credentials travel in the `X-Finnhub-Token` header.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{build_url, first_record, num, records, require_num, require_text, text, unexpected_shape, ProviderId};
use crate::client::RemoteRequest;
use crate::config::ProviderEndpoints;
use crate::error::ToolError;
use crate::models::{CompanyProfile, EarningsEvent, NewsArticle, Quote, TickerMatch};
use crate::symbols::provider_symbol;

const PROVIDER: ProviderId = ProviderId::Finnhub;

fn request(
    endpoints: &ProviderEndpoints,
    key: &str,
    path: &str,
    params: &[(&str, &str)],
) -> Result<RemoteRequest, ToolError> {
    let url = build_url(PROVIDER, &endpoints.finnhub, path, params)?;
    Ok(RemoteRequest::get(PROVIDER.source_name(), url).with_header("X-Finnhub-Token", key))
}

pub fn quote_request(endpoints: &ProviderEndpoints, key: &str, symbol: &str) -> Result<RemoteRequest, ToolError> {
    let ticker = provider_symbol(PROVIDER, symbol);
    request(endpoints, key, "/api/v1/quote", &[("symbol", ticker.as_str())])
}

pub fn profile_request(endpoints: &ProviderEndpoints, key: &str, symbol: &str) -> Result<RemoteRequest, ToolError> {
    let ticker = provider_symbol(PROVIDER, symbol);
    request(endpoints, key, "/api/v1/stock/profile2", &[("symbol", ticker.as_str())])
}

pub fn company_news_request(
    endpoints: &ProviderEndpoints,
    key: &str,
    symbol: &str,
    from: &str,
    to: &str,
) -> Result<RemoteRequest, ToolError> {
    let ticker = provider_symbol(PROVIDER, symbol);
    request(
        endpoints,
        key,
        "/api/v1/company-news",
        &[("symbol", ticker.as_str()), ("from", from), ("to", to)],
    )
}

pub fn market_news_request(endpoints: &ProviderEndpoints, key: &str) -> Result<RemoteRequest, ToolError> {
    request(endpoints, key, "/api/v1/news", &[("category", "general")])
}

pub fn symbol_search_request(endpoints: &ProviderEndpoints, key: &str, query: &str) -> Result<RemoteRequest, ToolError> {
    request(endpoints, key, "/api/v1/search", &[("q", query)])
}

pub fn earnings_calendar_request(
    endpoints: &ProviderEndpoints,
    key: &str,
    from: &str,
    to: &str,
) -> Result<RemoteRequest, ToolError> {
    request(endpoints, key, "/api/v1/calendar/earnings", &[("from", from), ("to", to)])
}

/// Finnhub answers unknown symbols with an all-zero quote.
pub fn parse_quote(symbol: &str, raw: &Value) -> Result<Quote, ToolError> {
    let record = first_record(PROVIDER, raw, &format!("quote for {}", symbol))?;
    let price = require_num(PROVIDER, record, "c")?;
    let timestamp = num(record, "t").unwrap_or(0.0);
    if price == 0.0 && timestamp == 0.0 {
        return Err(ToolError::not_found(
            PROVIDER.source_name(),
            format!("no quote found for {}", symbol),
        ));
    }
    let mut quote = Quote::new(symbol, price);
    quote.change = num(record, "d");
    quote.change_percent = num(record, "dp");
    quote.open = num(record, "o");
    quote.day_high = num(record, "h");
    quote.day_low = num(record, "l");
    quote.previous_close = num(record, "pc");
    quote.as_of = unix_to_rfc3339(timestamp as i64);
    Ok(quote)
}

pub fn parse_profile(symbol: &str, raw: &Value) -> Result<CompanyProfile, ToolError> {
    let record = first_record(PROVIDER, raw, &format!("profile for {}", symbol))?;
    Ok(CompanyProfile {
        symbol: symbol.to_string(),
        name: require_text(PROVIDER, record, "name")?,
        exchange: text(record, "exchange"),
        currency: text(record, "currency"),
        country: text(record, "country"),
        sector: None,
        industry: text(record, "finnhubIndustry"),
        // Reported in millions.
        market_cap: num(record, "marketCapitalization").map(|m| m * 1_000_000.0),
        beta: None,
        employees: None,
        ipo_date: text(record, "ipo"),
        website: text(record, "weburl"),
        description: None,
    })
}

pub fn parse_company_news(symbol: &str, raw: &Value, limit: usize) -> Result<Vec<NewsArticle>, ToolError> {
    let items = records(PROVIDER, raw, &format!("news for {}", symbol))?;
    let articles: Vec<NewsArticle> = items
        .iter()
        .filter_map(|item| {
            Some(NewsArticle {
                title: text(item, "headline")?,
                url: text(item, "url"),
                site: text(item, "source"),
                published_at: item.get("datetime").and_then(Value::as_i64).and_then(unix_to_rfc3339),
                summary: text(item, "summary"),
                image: text(item, "image"),
            })
        })
        .take(limit)
        .collect();
    if articles.is_empty() {
        return Err(ToolError::not_found(
            PROVIDER.source_name(),
            format!("no usable news for {}", symbol),
        ));
    }
    Ok(articles)
}

/// Symbol lookup answers `{count, result: [...]}`; an empty `result` means
/// nothing matched.
pub fn parse_symbol_search(query: &str, raw: &Value, limit: usize) -> Result<Vec<TickerMatch>, ToolError> {
    let items = raw
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| unexpected_shape(PROVIDER, "symbol search"))?;
    let matches: Vec<TickerMatch> = items
        .iter()
        .filter_map(|item| {
            Some(TickerMatch {
                symbol: text(item, "symbol")?.to_uppercase(),
                name: text(item, "description"),
                exchange: None,
                asset_type: text(item, "type"),
            })
        })
        .take(limit)
        .collect();
    if matches.is_empty() {
        return Err(ToolError::not_found(
            PROVIDER.source_name(),
            format!("no listing matches '{}'", query),
        ));
    }
    Ok(matches)
}

pub fn parse_earnings(raw: &Value) -> Result<Vec<EarningsEvent>, ToolError> {
    let calendar = raw
        .get("earningsCalendar")
        .ok_or_else(|| unexpected_shape(PROVIDER, "earnings calendar"))?;
    let items = records(PROVIDER, calendar, "earnings events")?;
    Ok(items
        .iter()
        .filter_map(|item| {
            Some(EarningsEvent {
                symbol: text(item, "symbol")?.to_uppercase(),
                date: text(item, "date")?,
                time: text(item, "hour"),
                eps_estimate: num(item, "epsEstimate"),
                eps_actual: num(item, "epsActual"),
                revenue_estimate: num(item, "revenueEstimate"),
                revenue_actual: num(item, "revenueActual"),
            })
        })
        .collect())
}

fn unix_to_rfc3339(secs: i64) -> Option<String> {
    if secs <= 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp(secs, 0).map(|ts| ts.to_rfc3339())
}
