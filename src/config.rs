// src/config.rs
use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;

use crate::error::ToolError;
use crate::providers::ProviderId;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_BATCH_SYMBOLS: usize = 5;
pub const DEFAULT_UNCLASSIFIED_FRAMEWORK: &str = "stock_analysis";

/// Base URLs that provider request paths are appended to.
#[derive(Clone, Debug)]
pub struct ProviderEndpoints {
    pub fmp: String,
    pub finnhub: String,
    pub alphavantage: String,
    pub twelvedata: String,
    pub yahoo: String,
    pub watchlist: Option<String>,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            fmp: "https://financialmodelingprep.com".to_string(),
            finnhub: "https://finnhub.io".to_string(),
            alphavantage: "https://www.alphavantage.co".to_string(),
            twelvedata: "https://api.twelvedata.com".to_string(),
            yahoo: "https://query1.finance.yahoo.com".to_string(),
            watchlist: None,
        }
    }
}

impl ProviderEndpoints {
    pub fn base(&self, provider: ProviderId) -> Option<&str> {
        match provider {
            ProviderId::Fmp => Some(&self.fmp),
            ProviderId::Finnhub => Some(&self.finnhub),
            ProviderId::AlphaVantage => Some(&self.alphavantage),
            ProviderId::TwelveData => Some(&self.twelvedata),
            ProviderId::Yahoo => Some(&self.yahoo),
            ProviderId::Watchlist => self.watchlist.as_deref(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ProviderCredentials {
    pub fmp: Option<String>,
    pub finnhub: Option<String>,
    pub alphavantage: Option<String>,
    pub twelvedata: Option<String>,
    pub watchlist: Option<String>,
}

impl ProviderCredentials {
    fn slot(&mut self, provider: ProviderId) -> Option<&mut Option<String>> {
        match provider {
            ProviderId::Fmp => Some(&mut self.fmp),
            ProviderId::Finnhub => Some(&mut self.finnhub),
            ProviderId::AlphaVantage => Some(&mut self.alphavantage),
            ProviderId::TwelveData => Some(&mut self.twelvedata),
            ProviderId::Watchlist => Some(&mut self.watchlist),
            ProviderId::Yahoo => None,
        }
    }

    pub fn get(&self, provider: ProviderId) -> Option<&str> {
        let value = match provider {
            ProviderId::Fmp => &self.fmp,
            ProviderId::Finnhub => &self.finnhub,
            ProviderId::AlphaVantage => &self.alphavantage,
            ProviderId::TwelveData => &self.twelvedata,
            ProviderId::Watchlist => &self.watchlist,
            ProviderId::Yahoo => return None,
        };
        value.as_deref().filter(|key| !key.trim().is_empty())
    }
}

/// Immutable settings shared by every tool invocation.
#[derive(Clone, Debug)]
pub struct ToolsConfig {
    pub request_timeout: Duration,
    pub max_batch_symbols: usize,
    /// Analysis framework reported when no provider can classify a symbol.
    pub unclassified_framework: String,
    pub endpoints: ProviderEndpoints,
    pub credentials: ProviderCredentials,
    pub static_watchlist: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_batch_symbols: DEFAULT_MAX_BATCH_SYMBOLS,
            unclassified_framework: DEFAULT_UNCLASSIFIED_FRAMEWORK.to_string(),
            endpoints: ProviderEndpoints::default(),
            credentials: ProviderCredentials::default(),
            static_watchlist: Vec::new(),
        }
    }
}

impl ToolsConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(secs) = read_number::<u64>("MDT_REQUEST_TIMEOUT_SECS")? {
            if secs == 0 {
                bail!("MDT_REQUEST_TIMEOUT_SECS must be greater than zero");
            }
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(cap) = read_number::<usize>("MDT_MAX_BATCH_SYMBOLS")? {
            if cap == 0 {
                bail!("MDT_MAX_BATCH_SYMBOLS must be at least 1");
            }
            config.max_batch_symbols = cap;
        }
        if let Ok(framework) = env::var("MDT_UNCLASSIFIED_FRAMEWORK") {
            config.unclassified_framework = framework;
        }

        let endpoints = &mut config.endpoints;
        override_from_env(&mut endpoints.fmp, "FMP_BASE_URL");
        override_from_env(&mut endpoints.finnhub, "FINNHUB_BASE_URL");
        override_from_env(&mut endpoints.alphavantage, "ALPHAVANTAGE_BASE_URL");
        override_from_env(&mut endpoints.twelvedata, "TWELVEDATA_BASE_URL");
        override_from_env(&mut endpoints.yahoo, "YAHOO_BASE_URL");
        endpoints.watchlist = env::var("WATCHLIST_API_URL").ok();

        for provider in ProviderId::ALL {
            if let (Some(var), Some(slot)) =
                (provider.credential_env(), config.credentials.slot(provider))
            {
                *slot = env::var(var).ok();
            }
        }

        config.static_watchlist = env::var("WATCHLIST_TICKERS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(config)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_batch_symbols(mut self, cap: usize) -> Self {
        self.max_batch_symbols = cap.max(1);
        self
    }

    pub fn with_credential(mut self, provider: ProviderId, key: impl Into<String>) -> Self {
        if let Some(slot) = self.credentials.slot(provider) {
            *slot = Some(key.into());
        }
        self
    }

    pub fn with_watchlist_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoints.watchlist = Some(url.into());
        self
    }

    pub fn with_static_watchlist(mut self, tickers: &[&str]) -> Self {
        self.static_watchlist = tickers.iter().map(|t| t.to_uppercase()).collect();
        self
    }

    pub fn with_unclassified_framework(mut self, framework: impl Into<String>) -> Self {
        self.unclassified_framework = framework.into();
        self
    }

    /// Credential for `provider`, or the named "not configured" condition.
    pub fn require_credential(&self, provider: ProviderId) -> Result<&str, ToolError> {
        self.credentials.get(provider).ok_or_else(|| {
            ToolError::not_configured(
                provider.source_name(),
                provider.credential_env().unwrap_or("<none>"),
            )
        })
    }
}

fn read_number<T>(var: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("{var} must be a number, got '{raw}'")),
        Err(_) => Ok(None),
    }
}

fn override_from_env(target: &mut String, var: &str) {
    if let Ok(value) = env::var(var) {
        let trimmed = value.trim().trim_end_matches('/');
        if !trimmed.is_empty() {
            *target = trimmed.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults_match_documented_values() {
        let config = ToolsConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.max_batch_symbols, 5);
        assert_eq!(config.unclassified_framework, "stock_analysis");
    }

    #[test]
    fn missing_credential_names_env_var() {
        let config = ToolsConfig::default();
        let err = config.require_credential(ProviderId::Fmp).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("FMP_API_KEY"));
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        let config = ToolsConfig::default().with_credential(ProviderId::Finnhub, "  ");
        assert!(config.require_credential(ProviderId::Finnhub).is_err());

        let config = config.with_credential(ProviderId::Finnhub, "abc");
        assert_eq!(config.require_credential(ProviderId::Finnhub).unwrap(), "abc");
    }

    #[test]
    fn batch_cap_never_drops_below_one() {
        assert_eq!(ToolsConfig::default().with_max_batch_symbols(0).max_batch_symbols, 1);
    }
}
