// src/tools/technical.rs
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{attempt, bounded_int, one_of, symbol_schema};
use crate::envelope::{Confidence, ResultEnvelope};
use crate::error::ToolError;
use crate::fallback::FallbackChain;
use crate::providers::{alphavantage, twelvedata, ProviderId};
use crate::query::{OperationKind, Query};
use crate::tool::{Tool, ToolContext};

const INDICATORS: [&str; 4] = ["rsi", "sma", "ema", "macd"];
const INTERVALS: [&str; 3] = ["daily", "weekly", "monthly"];
const DEFAULT_PERIOD: u32 = 14;
const DEFAULT_LIMIT: u32 = 30;

pub struct TechnicalIndicatorTool;

/// Indicator settings shared by every symbol of one request.
struct IndicatorRequest {
    indicator: String,
    interval: String,
    period: u32,
    limit: usize,
}

impl IndicatorRequest {
    fn from_params(params: &Value) -> Result<Self, ToolError> {
        Ok(Self {
            indicator: one_of(params, "indicator", "rsi", &INDICATORS)?,
            interval: one_of(params, "interval", "daily", &INTERVALS)?,
            period: bounded_int(params, "period", DEFAULT_PERIOD, 1..=200)?,
            limit: bounded_int(params, "limit", DEFAULT_LIMIT, 1..=100)? as usize,
        })
    }
}

#[async_trait]
impl Tool for TechnicalIndicatorTool {
    fn name(&self) -> &str {
        "get_technical_indicator"
    }

    fn display_name(&self) -> &str {
        "Technical Indicator"
    }

    fn description(&self) -> &str {
        "RSI, SMA, EMA or MACD series for one or more tickers, most recent reading first"
    }

    fn input_schema(&self) -> Value {
        let mut schema = symbol_schema(json!({
            "indicator": {
                "type": "string",
                "enum": INDICATORS,
                "description": "Indicator to compute"
            },
            "interval": {
                "type": "string",
                "enum": INTERVALS,
                "default": "daily"
            },
            "period": {
                "type": "integer",
                "default": DEFAULT_PERIOD,
                "minimum": 1,
                "maximum": 200,
                "description": "Look-back window (ignored for MACD)"
            },
            "limit": {
                "type": "integer",
                "default": DEFAULT_LIMIT,
                "minimum": 1,
                "maximum": 100,
                "description": "Number of readings to return"
            }
        }));
        schema["required"] = json!(["indicator"]);
        schema
    }

    fn kind(&self) -> OperationKind {
        OperationKind::TechnicalIndicator
    }

    fn required_fields(&self) -> &[&'static str] {
        &["indicator"]
    }

    async fn run(&self, params: &Value, ctx: &ToolContext) -> Result<ResultEnvelope, ToolError> {
        let settings = IndicatorRequest::from_params(params)?;
        let query = Query::from_params(self.kind(), params)?;
        ctx.require_any(&[ProviderId::TwelveData, ProviderId::AlphaVantage])?;
        let endpoints = ctx.endpoints();
        let client = &ctx.client;
        let settings = &settings;

        Ok(ctx
            .fan_out()
            .dispatch(self.display_name(), &query, |symbol| async move {
                let symbol = symbol.as_str();
                let IndicatorRequest {
                    indicator,
                    interval,
                    period,
                    limit,
                } = settings;
                let (indicator, interval, period, limit) = (indicator.as_str(), interval.as_str(), *period, *limit);

                FallbackChain::new(format!("{} {}", indicator, symbol))
                    .keyed_candidate(
                        ProviderId::TwelveData.source_name(),
                        Confidence::High,
                        ctx.credential(ProviderId::TwelveData),
                        move |key| {
                            attempt(
                                client,
                                twelvedata::indicator_request(endpoints, key, symbol, indicator, interval, period, limit),
                                move |raw| twelvedata::parse_indicator(symbol, indicator, interval, period, limit, raw),
                            )
                        },
                    )
                    .keyed_candidate(
                        ProviderId::AlphaVantage.source_name(),
                        Confidence::Medium,
                        ctx.credential(ProviderId::AlphaVantage),
                        move |key| {
                            attempt(
                                client,
                                alphavantage::indicator_request(endpoints, key, symbol, indicator, interval, period),
                                move |raw| alphavantage::parse_indicator(symbol, indicator, interval, period, limit, raw),
                            )
                        },
                    )
                    .resolve()
                    .await
            })
            .await)
    }
}
