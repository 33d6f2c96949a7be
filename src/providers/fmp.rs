// src/providers/fmp.rs
//! Financial Modeling Prep adapter.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{build_url, first_record, flag, num, num_any, path_segment, records, require_num, require_text, text, ProviderId};
use crate::client::RemoteRequest;
use crate::config::ProviderEndpoints;
use crate::error::ToolError;
use crate::models::{
    AssetClassification, CompanyProfile, EarningsEvent, FinancialRatios, KeyMetrics, NewsArticle, Quote,
    TickerMatch,
};
use crate::symbols::provider_symbol;

const PROVIDER: ProviderId = ProviderId::Fmp;

fn request(
    endpoints: &ProviderEndpoints,
    key: &str,
    path: &str,
    params: &[(&str, &str)],
) -> Result<RemoteRequest, ToolError> {
    let mut query = params.to_vec();
    query.push(("apikey", key));
    let url = build_url(PROVIDER, &endpoints.fmp, path, &query)?;
    Ok(RemoteRequest::get(PROVIDER.source_name(), url))
}

fn symbol_path(prefix: &str, symbol: &str) -> String {
    format!("{}/{}", prefix, path_segment(&provider_symbol(PROVIDER, symbol)))
}

pub fn quote_request(endpoints: &ProviderEndpoints, key: &str, symbol: &str) -> Result<RemoteRequest, ToolError> {
    request(endpoints, key, &symbol_path("/api/v3/quote", symbol), &[])
}

pub fn profile_request(endpoints: &ProviderEndpoints, key: &str, symbol: &str) -> Result<RemoteRequest, ToolError> {
    request(endpoints, key, &symbol_path("/api/v3/profile", symbol), &[])
}

pub fn ratios_request(endpoints: &ProviderEndpoints, key: &str, symbol: &str) -> Result<RemoteRequest, ToolError> {
    request(endpoints, key, &symbol_path("/api/v3/ratios-ttm", symbol), &[])
}

pub fn key_metrics_request(endpoints: &ProviderEndpoints, key: &str, symbol: &str) -> Result<RemoteRequest, ToolError> {
    request(endpoints, key, &symbol_path("/api/v3/key-metrics-ttm", symbol), &[])
}

pub fn news_request(
    endpoints: &ProviderEndpoints,
    key: &str,
    symbol: &str,
    limit: usize,
) -> Result<RemoteRequest, ToolError> {
    let ticker = provider_symbol(PROVIDER, symbol);
    let limit = limit.to_string();
    request(
        endpoints,
        key,
        "/api/v3/stock_news",
        &[("tickers", ticker.as_str()), ("limit", limit.as_str())],
    )
}

/// Market-wide headlines, newest first.
pub fn general_news_request(endpoints: &ProviderEndpoints, key: &str) -> Result<RemoteRequest, ToolError> {
    request(endpoints, key, "/api/v4/general_news", &[("page", "0")])
}

pub fn search_request(
    endpoints: &ProviderEndpoints,
    key: &str,
    query: &str,
    limit: usize,
) -> Result<RemoteRequest, ToolError> {
    let limit = limit.to_string();
    request(endpoints, key, "/api/v3/search", &[("query", query), ("limit", limit.as_str())])
}

/// Dedicated fund-metadata endpoint: answers only for ETFs.
pub fn etf_info_request(endpoints: &ProviderEndpoints, key: &str, symbol: &str) -> Result<RemoteRequest, ToolError> {
    let ticker = provider_symbol(PROVIDER, symbol);
    request(endpoints, key, "/api/v4/etf-info", &[("symbol", ticker.as_str())])
}

pub fn earnings_calendar_request(
    endpoints: &ProviderEndpoints,
    key: &str,
    from: &str,
    to: &str,
) -> Result<RemoteRequest, ToolError> {
    request(endpoints, key, "/api/v3/earning_calendar", &[("from", from), ("to", to)])
}

pub fn parse_quote(symbol: &str, raw: &Value) -> Result<Quote, ToolError> {
    let record = first_record(PROVIDER, raw, &format!("quote for {}", symbol))?;
    let mut quote = Quote::new(symbol, require_num(PROVIDER, record, "price")?);
    quote.change = num(record, "change");
    quote.change_percent = num(record, "changesPercentage");
    quote.open = num(record, "open");
    quote.day_high = num(record, "dayHigh");
    quote.day_low = num(record, "dayLow");
    quote.previous_close = num(record, "previousClose");
    quote.volume = num(record, "volume");
    quote.market_cap = num(record, "marketCap");
    quote.name = text(record, "name");
    quote.exchange = text(record, "exchange");
    quote.as_of = record
        .get("timestamp")
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|ts| ts.to_rfc3339());
    Ok(quote)
}

pub fn parse_profile(symbol: &str, raw: &Value) -> Result<CompanyProfile, ToolError> {
    let record = first_record(PROVIDER, raw, &format!("profile for {}", symbol))?;
    Ok(CompanyProfile {
        symbol: symbol.to_string(),
        name: require_text(PROVIDER, record, "companyName")?,
        exchange: text(record, "exchangeShortName").or_else(|| text(record, "exchange")),
        currency: text(record, "currency"),
        country: text(record, "country"),
        sector: text(record, "sector"),
        industry: text(record, "industry"),
        market_cap: num_any(record, &["mktCap", "marketCap"]),
        beta: num(record, "beta"),
        employees: num(record, "fullTimeEmployees").map(|n| n as u64),
        ipo_date: text(record, "ipoDate"),
        website: text(record, "website"),
        description: text(record, "description"),
    })
}

/// Classification from profile flags; weaker than a dedicated endpoint.
pub fn parse_profile_classification(symbol: &str, raw: &Value) -> Result<AssetClassification, ToolError> {
    let record = first_record(PROVIDER, raw, &format!("profile for {}", symbol))?;
    let name = require_text(PROVIDER, record, "companyName")?;
    let (product_type, product_category, framework) = if flag(record, "isEtf") {
        ("ETF", "Exchange Traded Fund", "etf_analysis")
    } else if flag(record, "isFund") {
        ("Mutual Fund", "Fund", "fund_analysis")
    } else if flag(record, "isAdr") {
        ("ADR", "Equity", "stock_analysis")
    } else {
        ("Common Stock", "Equity", "stock_analysis")
    };
    Ok(AssetClassification {
        symbol: symbol.to_string(),
        name: Some(name),
        product_type: product_type.to_string(),
        product_category: product_category.to_string(),
        analysis_framework: framework.to_string(),
        quote_type: None,
        exchange: text(record, "exchangeShortName"),
    })
}

pub fn parse_fund_metadata(symbol: &str, raw: &Value) -> Result<AssetClassification, ToolError> {
    let record = first_record(PROVIDER, raw, &format!("fund metadata for {}", symbol))?;
    Ok(AssetClassification {
        symbol: symbol.to_string(),
        name: text(record, "name"),
        product_type: "ETF".to_string(),
        product_category: text(record, "assetClass").unwrap_or_else(|| "Exchange Traded Fund".to_string()),
        analysis_framework: "etf_analysis".to_string(),
        quote_type: Some("ETF".to_string()),
        exchange: text(record, "exchange"),
    })
}

pub fn parse_ratios(symbol: &str, raw: &Value) -> Result<FinancialRatios, ToolError> {
    let r = first_record(PROVIDER, raw, &format!("ratios for {}", symbol))?;
    Ok(FinancialRatios {
        symbol: symbol.to_string(),
        pe_ratio: num_any(r, &["peRatioTTM", "priceEarningsRatioTTM"]),
        peg_ratio: num_any(r, &["pegRatioTTM", "priceEarningsToGrowthRatioTTM"]),
        price_to_book: num_any(r, &["priceToBookRatioTTM", "priceBookValueRatioTTM"]),
        price_to_sales: num(r, "priceToSalesRatioTTM"),
        dividend_yield: num_any(r, &["dividendYielTTM", "dividendYieldTTM"]),
        payout_ratio: num(r, "payoutRatioTTM"),
        return_on_equity: num(r, "returnOnEquityTTM"),
        return_on_assets: num(r, "returnOnAssetsTTM"),
        gross_margin: num(r, "grossProfitMarginTTM"),
        operating_margin: num(r, "operatingProfitMarginTTM"),
        net_margin: num(r, "netProfitMarginTTM"),
        debt_to_equity: num(r, "debtEquityRatioTTM"),
        current_ratio: num(r, "currentRatioTTM"),
        quick_ratio: num(r, "quickRatioTTM"),
        interest_coverage: num(r, "interestCoverageTTM"),
    })
}

pub fn parse_key_metrics(symbol: &str, raw: &Value) -> Result<KeyMetrics, ToolError> {
    let m = first_record(PROVIDER, raw, &format!("key metrics for {}", symbol))?;
    Ok(KeyMetrics {
        symbol: symbol.to_string(),
        market_cap: num(m, "marketCapTTM"),
        enterprise_value: num(m, "enterpriseValueTTM"),
        revenue_per_share: num(m, "revenuePerShareTTM"),
        net_income_per_share: num(m, "netIncomePerShareTTM"),
        operating_cash_flow_per_share: num(m, "operatingCashFlowPerShareTTM"),
        free_cash_flow_per_share: num(m, "freeCashFlowPerShareTTM"),
        book_value_per_share: num(m, "bookValuePerShareTTM"),
        tangible_book_value_per_share: num(m, "tangibleBookValuePerShareTTM"),
        ev_to_sales: num(m, "evToSalesTTM"),
        ev_to_ebitda: num_any(m, &["enterpriseValueOverEBITDATTM", "evToEBITDATTM"]),
        earnings_yield: num(m, "earningsYieldTTM"),
        free_cash_flow_yield: num(m, "freeCashFlowYieldTTM"),
        debt_to_equity: num(m, "debtToEquityTTM"),
        debt_to_market_cap: num(m, "debtToMarketCapTTM"),
        roe: num(m, "roeTTM"),
        roic: num(m, "roicTTM"),
        graham_number: num(m, "grahamNumberTTM"),
        dividend_yield: num(m, "dividendYieldTTM"),
    })
}

pub fn parse_news(symbol: &str, raw: &Value, limit: usize) -> Result<Vec<NewsArticle>, ToolError> {
    let items = records(PROVIDER, raw, &format!("news for {}", symbol))?;
    let articles: Vec<NewsArticle> = items
        .iter()
        .filter_map(|item| {
            Some(NewsArticle {
                title: text(item, "title")?,
                url: text(item, "url"),
                site: text(item, "site"),
                published_at: text(item, "publishedDate"),
                summary: text(item, "text"),
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

pub fn parse_search(query: &str, raw: &Value, limit: usize) -> Result<Vec<TickerMatch>, ToolError> {
    let items = records(PROVIDER, raw, &format!("listings matching '{}'", query))?;
    let matches: Vec<TickerMatch> = items
        .iter()
        .filter_map(|item| {
            Some(TickerMatch {
                symbol: text(item, "symbol")?.to_uppercase(),
                name: text(item, "name"),
                exchange: text(item, "exchangeShortName").or_else(|| text(item, "stockExchange")),
                asset_type: None,
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
    let items = records(PROVIDER, raw, "earnings events")?;
    Ok(items
        .iter()
        .filter_map(|item| {
            Some(EarningsEvent {
                symbol: text(item, "symbol")?.to_uppercase(),
                date: text(item, "date")?,
                time: text(item, "time"),
                eps_estimate: num(item, "epsEstimated"),
                eps_actual: num(item, "eps"),
                revenue_estimate: num(item, "revenueEstimated"),
                revenue_actual: num(item, "revenue"),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quote_maps_fields_and_tolerates_missing_optionals() {
        let raw = json!([{"symbol": "AAPL", "price": 189.5, "changesPercentage": 1.2, "name": "Apple Inc."}]);
        let quote = parse_quote("AAPL", &raw).unwrap();
        assert_eq!(quote.price, 189.5);
        assert_eq!(quote.change_percent, Some(1.2));
        assert_eq!(quote.day_high, None);
        assert_eq!(quote.name.as_deref(), Some("Apple Inc."));
    }

    #[test]
    fn quote_without_price_is_incomplete() {
        let err = parse_quote("AAPL", &json!([{"symbol": "AAPL"}])).unwrap_err();
        assert_eq!(err, ToolError::incomplete("financialmodelingprep.com", "price"));
    }

    #[test]
    fn empty_key_metrics_is_not_found() {
        let err = parse_key_metrics("ZZZZ", &json!([])).unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[test]
    fn profile_flags_drive_classification() {
        let raw = json!([{"companyName": "SPDR S&P 500", "isEtf": true, "isFund": false}]);
        let classification = parse_profile_classification("SPY", &raw).unwrap();
        assert_eq!(classification.product_type, "ETF");
        assert_eq!(classification.analysis_framework, "etf_analysis");
    }

    #[test]
    fn class_share_symbols_use_dashes_in_path() {
        let request = quote_request(&ProviderEndpoints::default(), "k", "BRK.B").unwrap();
        assert!(request.url.contains("/api/v3/quote/BRK-B?apikey=k"));
    }

    #[test]
    fn news_skips_untitled_items_and_respects_limit() {
        let raw = json!([
            {"title": "", "url": "https://a"},
            {"title": "One", "site": "Reuters"},
            {"title": "Two"},
            {"title": "Three"}
        ]);
        let articles = parse_news("AAPL", &raw, 2).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "One");
    }

    #[test]
    fn search_prefers_short_exchange_names() {
        let raw = json!([
            {"symbol": "AAPL", "name": "Apple Inc.", "exchangeShortName": "NASDAQ", "stockExchange": "NASDAQ Global Select"},
            {"symbol": "APLE", "name": "Apple Hospitality REIT", "stockExchange": "New York Stock Exchange"},
            {"name": "no symbol"}
        ]);
        let matches = parse_search("apple", &raw, 10).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].exchange.as_deref(), Some("NASDAQ"));
        assert_eq!(matches[1].exchange.as_deref(), Some("New York Stock Exchange"));
    }

    #[test]
    fn empty_search_is_not_found() {
        assert!(matches!(parse_search("zzzz", &json!([]), 10), Err(ToolError::NotFound { .. })));
    }

    #[test]
    fn search_request_encodes_the_query() {
        let request = search_request(&ProviderEndpoints::default(), "k", "procter & gamble", 5).unwrap();
        assert!(request.url.contains("/api/v3/search?query=procter+%26+gamble&limit=5"));
    }
}
