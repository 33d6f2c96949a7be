// src/symbols/stock_symbol.rs

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ToolError;
use crate::providers::ProviderId;

static TICKER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9^][A-Z0-9.\-=^]{0,14}$").expect("ticker pattern is valid"));

/// Trims and upper-cases a caller supplied ticker, rejecting anything that
/// cannot be a listed symbol.
///
/// # Arguments
///
/// * `raw` - The ticker as the caller typed it (`" brk.b "`, `"aapl"`).
/// * `field` - Parameter name reported in the validation error.
pub fn normalize_symbol(raw: &str, field: &str) -> Result<String, ToolError> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(ToolError::MissingParameter(field.to_string()));
    }
    if !TICKER_PATTERN.is_match(&symbol) {
        return Err(ToolError::invalid(
            field,
            format!("'{}' is not a valid ticker symbol", raw.trim()),
        ));
    }
    Ok(symbol)
}

/// Spelling of a normalized ticker expected by `provider`.
///
/// Class shares are dotted for most providers (`BRK.B`) but dashed for
/// FMP and Yahoo (`BRK-B`).
pub fn provider_symbol(provider: ProviderId, symbol: &str) -> String {
    match provider {
        ProviderId::Fmp | ProviderId::Yahoo if is_class_share(symbol) => symbol.replace('.', "-"),
        _ => symbol.to_string(),
    }
}

fn is_class_share(symbol: &str) -> bool {
    match symbol.rsplit_once('.') {
        Some((base, class)) => !base.is_empty() && class.len() == 1,
        None => false,
    }
}
