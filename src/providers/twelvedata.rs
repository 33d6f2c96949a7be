// src/providers/twelvedata.rs
//! Twelve Data adapter for technical indicators.

use serde_json::Value;
use std::collections::BTreeMap;

use super::{as_number, build_url, path_segment, rejected, text, unexpected_shape, ProviderId};
use crate::client::RemoteRequest;
use crate::config::ProviderEndpoints;
use crate::error::ToolError;
use crate::models::{IndicatorPoint, IndicatorSeries};
use crate::symbols::provider_symbol;

const PROVIDER: ProviderId = ProviderId::TwelveData;

fn interval_code(interval: &str) -> &'static str {
    match interval {
        "weekly" => "1week",
        "monthly" => "1month",
        _ => "1day",
    }
}

pub fn indicator_request(
    endpoints: &ProviderEndpoints,
    key: &str,
    symbol: &str,
    indicator: &str,
    interval: &str,
    period: u32,
    limit: usize,
) -> Result<RemoteRequest, ToolError> {
    let ticker = provider_symbol(PROVIDER, symbol);
    let period = period.to_string();
    let limit = limit.to_string();
    let mut params = vec![
        ("symbol", ticker.as_str()),
        ("interval", interval_code(interval)),
        ("outputsize", limit.as_str()),
        ("apikey", key),
    ];
    if indicator != "macd" {
        params.push(("time_period", period.as_str()));
    }
    let path = format!("/{}", path_segment(indicator));
    let url = build_url(PROVIDER, &endpoints.twelvedata, &path, &params)?;
    Ok(RemoteRequest::get(PROVIDER.source_name(), url))
}

pub fn parse_indicator(
    symbol: &str,
    indicator: &str,
    interval: &str,
    period: u32,
    limit: usize,
    raw: &Value,
) -> Result<IndicatorSeries, ToolError> {
    if raw.get("status").and_then(Value::as_str) == Some("error") {
        let message = text(raw, "message").unwrap_or_else(|| "request failed".to_string());
        return match raw.get("code").and_then(Value::as_i64) {
            Some(404) => Err(ToolError::not_found(PROVIDER.source_name(), message)),
            _ => Err(rejected(PROVIDER, &message)),
        };
    }
    let values = raw
        .get("values")
        .and_then(Value::as_array)
        .ok_or_else(|| unexpected_shape(PROVIDER, "indicator values"))?;

    // Twelve Data already returns newest first.
    let points: Vec<IndicatorPoint> = values
        .iter()
        .filter_map(|row| {
            let datetime = text(row, "datetime")?;
            let values: BTreeMap<String, f64> = row
                .as_object()?
                .iter()
                .filter(|(key, _)| key.as_str() != "datetime")
                .filter_map(|(key, value)| as_number(value).map(|n| (key.to_lowercase(), n)))
                .collect();
            (!values.is_empty()).then(|| IndicatorPoint { datetime, values })
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_status_404_is_not_found() {
        let raw = json!({"code": 404, "message": "symbol not found", "status": "error"});
        let err = parse_indicator("ZZZZ", "rsi", "daily", 14, 30, &raw).unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }

    #[test]
    fn other_error_status_is_rejection() {
        let raw = json!({"code": 429, "message": "run out of API credits", "status": "error"});
        let err = parse_indicator("AAPL", "rsi", "daily", 14, 30, &raw).unwrap_err();
        assert_eq!(err.kind().as_str(), "provider_rejected");
    }

    #[test]
    fn macd_rows_keep_every_line() {
        let raw = json!({
            "meta": {"symbol": "AAPL"},
            "values": [
                {"datetime": "2024-01-05", "macd": "1.2", "macd_signal": "0.9", "macd_hist": "0.3"},
                {"datetime": "2024-01-04", "macd": "1.0", "macd_signal": "0.8", "macd_hist": "0.2"}
            ],
            "status": "ok"
        });
        let series = parse_indicator("AAPL", "macd", "daily", 14, 30, &raw).unwrap();
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.latest().unwrap().values.len(), 3);
    }

    #[test]
    fn request_maps_interval_codes() {
        let request =
            indicator_request(&ProviderEndpoints::default(), "k", "AAPL", "sma", "weekly", 20, 10).unwrap();
        assert!(request.url.contains("/sma?"));
        assert!(request.url.contains("interval=1week"));
        assert!(request.url.contains("time_period=20"));
    }
}
