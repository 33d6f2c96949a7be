// src/models.rs
//! Canonical payloads. Provider adapters map their wire formats into these
//! shapes; optional fields stay `None` when a provider does not report them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::ToolError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    pub open: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub previous_close: Option<f64>,
    pub volume: Option<f64>,
    pub market_cap: Option<f64>,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    pub as_of: Option<String>,
}

impl Quote {
    pub fn new(symbol: &str, price: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            price,
            change: None,
            change_percent: None,
            open: None,
            day_high: None,
            day_low: None,
            previous_close: None,
            volume: None,
            market_cap: None,
            name: None,
            exchange: None,
            currency: None,
            as_of: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub symbol: String,
    pub name: String,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    pub country: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub beta: Option<f64>,
    pub employees: Option<u64>,
    pub ipo_date: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialRatios {
    pub symbol: String,
    pub pe_ratio: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub price_to_book: Option<f64>,
    pub price_to_sales: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub payout_ratio: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub gross_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_margin: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub interest_coverage: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyMetrics {
    pub symbol: String,
    pub market_cap: Option<f64>,
    pub enterprise_value: Option<f64>,
    pub revenue_per_share: Option<f64>,
    pub net_income_per_share: Option<f64>,
    pub operating_cash_flow_per_share: Option<f64>,
    pub free_cash_flow_per_share: Option<f64>,
    pub book_value_per_share: Option<f64>,
    pub tangible_book_value_per_share: Option<f64>,
    pub ev_to_sales: Option<f64>,
    pub ev_to_ebitda: Option<f64>,
    pub earnings_yield: Option<f64>,
    pub free_cash_flow_yield: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub debt_to_market_cap: Option<f64>,
    pub roe: Option<f64>,
    pub roic: Option<f64>,
    pub graham_number: Option<f64>,
    pub dividend_yield: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub datetime: String,
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub symbol: String,
    pub indicator: String,
    pub interval: String,
    pub period: u32,
    /// Most recent reading first.
    pub points: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn latest(&self) -> Option<&IndicatorPoint> {
        self.points.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub url: Option<String>,
    pub site: Option<String>,
    pub published_at: Option<String>,
    pub summary: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsFeed {
    pub symbol: String,
    pub count: usize,
    pub articles: Vec<NewsArticle>,
}

/// One candidate listing for a company-name lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerMatch {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub asset_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSearch {
    pub query: String,
    pub count: usize,
    pub results: Vec<TickerMatch>,
}

impl TickerSearch {
    pub fn new(query: &str, results: Vec<TickerMatch>) -> Self {
        Self {
            query: query.to_string(),
            count: results.len(),
            results,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetClassification {
    pub symbol: String,
    pub name: Option<String>,
    pub product_type: String,
    pub product_category: String,
    pub analysis_framework: String,
    pub quote_type: Option<String>,
    pub exchange: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub ticker: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watchlist {
    pub list: String,
    pub count: usize,
    pub tickers: Vec<String>,
    pub entries: Vec<WatchlistEntry>,
}

impl Watchlist {
    pub fn new(list: &str, entries: Vec<WatchlistEntry>) -> Self {
        Self {
            list: list.to_string(),
            count: entries.len(),
            tickers: entries.iter().map(|e| e.ticker.clone()).collect(),
            entries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsEvent {
    pub symbol: String,
    pub date: String,
    pub time: Option<String>,
    pub eps_estimate: Option<f64>,
    pub eps_actual: Option<f64>,
    pub revenue_estimate: Option<f64>,
    pub revenue_actual: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsCalendar {
    pub from: String,
    pub to: String,
    pub count: usize,
    pub events: Vec<EarningsEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    pub operation: String,
    pub result: f64,
    pub unit: String,
    pub inputs: BTreeMap<String, f64>,
}

/// Serializes a canonical payload for the envelope.
pub fn to_payload<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Internal(format!("payload encoding: {}", e)))
}
