// src/providers/mod.rs
//! Per-provider adapters. Each adapter builds `RemoteRequest`s from endpoint
//! templates and maps the provider's raw JSON into a canonical payload or a
//! typed `ToolError`, so orchestration never sees wire formats.

pub mod alphavantage;
pub mod finnhub;
pub mod fmp;
pub mod twelvedata;
pub mod watchlist;
pub mod yahoo;

use serde_json::Value;
use std::fmt;
use url::Url;

use crate::client::{RemoteClient, RemoteRequest};
use crate::error::{ProviderError, ToolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Fmp,
    Finnhub,
    AlphaVantage,
    TwelveData,
    Yahoo,
    Watchlist,
}

impl ProviderId {
    pub const ALL: [ProviderId; 6] = [
        Self::Fmp,
        Self::Finnhub,
        Self::AlphaVantage,
        Self::TwelveData,
        Self::Yahoo,
        Self::Watchlist,
    ];

    pub const fn source_name(self) -> &'static str {
        match self {
            Self::Fmp => "financialmodelingprep.com",
            Self::Finnhub => "finnhub.io",
            Self::AlphaVantage => "alphavantage.co",
            Self::TwelveData => "twelvedata.com",
            Self::Yahoo => "finance.yahoo.com",
            Self::Watchlist => "watchlist_service",
        }
    }

    pub const fn credential_env(self) -> Option<&'static str> {
        match self {
            Self::Fmp => Some("FMP_API_KEY"),
            Self::Finnhub => Some("FINNHUB_API_KEY"),
            Self::AlphaVantage => Some("ALPHAVANTAGE_API_KEY"),
            Self::TwelveData => Some("TWELVEDATA_API_KEY"),
            Self::Watchlist => Some("WATCHLIST_API_TOKEN"),
            Self::Yahoo => None,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source_name())
    }
}

/// Issues `request` and hands the decoded body to `parse`.
pub async fn fetch<T, P>(client: &RemoteClient, request: RemoteRequest, parse: P) -> Result<T, ToolError>
where
    P: FnOnce(&Value) -> Result<T, ToolError>,
{
    let raw = client.get_json(request).await?;
    parse(&raw)
}

pub(crate) fn build_url(
    provider: ProviderId,
    base: &str,
    path: &str,
    query: &[(&str, &str)],
) -> Result<String, ToolError> {
    let mut url = Url::parse(&format!("{}{}", base.trim_end_matches('/'), path)).map_err(|e| {
        ToolError::InvalidEndpoint {
            provider: provider.source_name().to_string(),
            message: e.to_string(),
        }
    })?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }
    Ok(url.into())
}

pub(crate) fn path_segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// First record of an array payload, or the payload itself when it is a
/// non-empty object. Empty results mean the symbol is unknown to the provider.
pub(crate) fn first_record<'a>(
    provider: ProviderId,
    raw: &'a Value,
    what: &str,
) -> Result<&'a Value, ToolError> {
    match raw {
        Value::Array(items) => items
            .first()
            .ok_or_else(|| ToolError::not_found(provider.source_name(), format!("no {} found", what))),
        Value::Object(map) if map.is_empty() => Err(ToolError::not_found(
            provider.source_name(),
            format!("no {} found", what),
        )),
        Value::Object(map) => match map.get("Error Message").and_then(Value::as_str) {
            Some(message) => Err(rejected(provider, message)),
            None => Ok(raw),
        },
        _ => Err(unexpected_shape(provider, what)),
    }
}

/// Non-empty array payload.
pub(crate) fn records<'a>(
    provider: ProviderId,
    raw: &'a Value,
    what: &str,
) -> Result<&'a Vec<Value>, ToolError> {
    match raw {
        Value::Array(items) if items.is_empty() => Err(ToolError::not_found(
            provider.source_name(),
            format!("no {} found", what),
        )),
        Value::Array(items) => Ok(items),
        Value::Object(map) if map.contains_key("Error Message") => Err(rejected(
            provider,
            map.get("Error Message").and_then(Value::as_str).unwrap_or_default(),
        )),
        _ => Err(unexpected_shape(provider, what)),
    }
}

pub(crate) fn rejected(provider: ProviderId, message: &str) -> ToolError {
    ToolError::Provider(ProviderError::Rejected {
        provider: provider.source_name().to_string(),
        message: message.to_string(),
    })
}

pub(crate) fn unexpected_shape(provider: ProviderId, what: &str) -> ToolError {
    ToolError::Provider(ProviderError::Decode {
        provider: provider.source_name().to_string(),
        message: format!("unexpected payload shape for {}", what),
    })
}

/// Numeric field tolerant of string-encoded numbers and percent suffixes.
pub(crate) fn num(record: &Value, key: &str) -> Option<f64> {
    as_number(record.get(key)?)
}

pub(crate) fn as_number(value: &Value) -> Option<f64> {
    let value = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = s.trim().trim_end_matches('%').replace(',', "");
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }?;
    value.is_finite().then_some(value)
}

pub(crate) fn num_any(record: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| num(record, key))
}

pub(crate) fn text(record: &Value, key: &str) -> Option<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "None" && *s != "-")
        .map(str::to_string)
}

pub(crate) fn flag(record: &Value, key: &str) -> bool {
    record.get(key).and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn require_num(provider: ProviderId, record: &Value, key: &str) -> Result<f64, ToolError> {
    num(record, key).ok_or_else(|| ToolError::incomplete(provider.source_name(), key))
}

pub(crate) fn require_text(provider: ProviderId, record: &Value, key: &str) -> Result<String, ToolError> {
    text(record, key).ok_or_else(|| ToolError::incomplete(provider.source_name(), key))
}
