// src/tools/earnings.rs
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};

use super::{attempt, symbol_properties};
use crate::envelope::{Confidence, ResultEnvelope};
use crate::error::ToolError;
use crate::fallback::FallbackChain;
use crate::models::{EarningsCalendar, EarningsEvent};
use crate::providers::{finnhub, fmp, ProviderId};
use crate::query::{extract_symbols, OperationKind};
use crate::tool::{Tool, ToolContext};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_WINDOW_DAYS: i64 = 7;
const MAX_WINDOW_DAYS: i64 = 90;

pub struct EarningsCalendarTool;

#[derive(Debug, PartialEq)]
struct DateWindow {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateWindow {
    /// `date` pins a single day; otherwise `from`/`to`, defaulting to the
    /// coming week.
    fn from_params(params: &Value, today: NaiveDate) -> Result<Self, ToolError> {
        if let Some(day) = parse_date(params, "date")? {
            return Ok(Self { from: day, to: day });
        }
        let from = parse_date(params, "from")?.unwrap_or(today);
        let to = parse_date(params, "to")?.unwrap_or(from + Duration::days(DEFAULT_WINDOW_DAYS));
        if to < from {
            return Err(ToolError::invalid("to", "must not be before 'from'"));
        }
        if (to - from).num_days() > MAX_WINDOW_DAYS {
            return Err(ToolError::invalid(
                "to",
                format!("window is limited to {} days", MAX_WINDOW_DAYS),
            ));
        }
        Ok(Self { from, to })
    }
}

fn parse_date(params: &Value, name: &str) -> Result<Option<NaiveDate>, ToolError> {
    match params.get(name).and_then(Value::as_str).map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map(Some)
            .map_err(|_| ToolError::invalid(name, format!("'{}' is not a YYYY-MM-DD date", raw))),
    }
}

/// Keeps events for `symbols` (all when empty) and orders them by date.
fn calendar(
    from: &str,
    to: &str,
    symbols: &[String],
    events: Vec<EarningsEvent>,
    provider: ProviderId,
) -> Result<EarningsCalendar, ToolError> {
    let mut events: Vec<EarningsEvent> = events
        .into_iter()
        .filter(|e| symbols.is_empty() || symbols.contains(&e.symbol))
        .collect();
    if events.is_empty() {
        return Err(ToolError::not_found(
            provider.source_name(),
            format!("no earnings between {} and {}", from, to),
        ));
    }
    events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.symbol.cmp(&b.symbol)));
    Ok(EarningsCalendar {
        from: from.to_string(),
        to: to.to_string(),
        count: events.len(),
        events,
    })
}

#[async_trait]
impl Tool for EarningsCalendarTool {
    fn name(&self) -> &str {
        "get_earnings_calendar"
    }

    fn display_name(&self) -> &str {
        "Earnings Calendar"
    }

    fn description(&self) -> &str {
        "Upcoming or recent earnings releases with EPS and revenue estimates, optionally filtered by ticker"
    }

    fn input_schema(&self) -> Value {
        let mut properties = symbol_properties();
        properties["date"] = json!({"type": "string", "format": "date", "description": "Single day (YYYY-MM-DD)"});
        properties["from"] = json!({"type": "string", "format": "date", "description": "Window start, default today"});
        properties["to"] = json!({"type": "string", "format": "date", "description": "Window end, default from + 7 days"});
        json!({
            "type": "object",
            "properties": properties
        })
    }

    fn kind(&self) -> OperationKind {
        OperationKind::EarningsCalendar
    }

    async fn run(&self, params: &Value, ctx: &ToolContext) -> Result<ResultEnvelope, ToolError> {
        let window = DateWindow::from_params(params, Utc::now().date_naive())?;
        let symbols = match extract_symbols(params) {
            Ok(symbols) => symbols,
            Err(ToolError::MissingParameter(_)) => Vec::new(),
            Err(err) => return Err(err),
        };
        ctx.require_any(&[ProviderId::Fmp, ProviderId::Finnhub])?;

        let from = window.from.format(DATE_FORMAT).to_string();
        let to = window.to.format(DATE_FORMAT).to_string();
        let (from, to, symbols) = (from.as_str(), to.as_str(), symbols.as_slice());
        let endpoints = ctx.endpoints();
        let client = &ctx.client;

        let resolved = FallbackChain::new(format!("earnings {}..{}", from, to))
            .keyed_candidate(
                ProviderId::Fmp.source_name(),
                Confidence::High,
                ctx.credential(ProviderId::Fmp),
                move |key| {
                    attempt(client, fmp::earnings_calendar_request(endpoints, key, from, to), move |raw| {
                        calendar(from, to, symbols, fmp::parse_earnings(raw)?, ProviderId::Fmp)
                    })
                },
            )
            .keyed_candidate(
                ProviderId::Finnhub.source_name(),
                Confidence::Medium,
                ctx.credential(ProviderId::Finnhub),
                move |key| {
                    attempt(
                        client,
                        finnhub::earnings_calendar_request(endpoints, key, from, to),
                        move |raw| calendar(from, to, symbols, finnhub::parse_earnings(raw)?, ProviderId::Finnhub),
                    )
                },
            )
            .resolve()
            .await?;
        Ok(resolved.into_envelope(self.display_name(), self.kind().data_type()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, DATE_FORMAT).unwrap()
    }

    #[test]
    fn window_defaults_to_the_coming_week() {
        let window = DateWindow::from_params(&json!({}), day("2024-03-01")).unwrap();
        assert_eq!(window, DateWindow { from: day("2024-03-01"), to: day("2024-03-08") });
    }

    #[test]
    fn single_date_pins_both_ends() {
        let window = DateWindow::from_params(&json!({"date": "2024-04-25"}), day("2024-03-01")).unwrap();
        assert_eq!(window.from, window.to);
    }

    #[test]
    fn reversed_or_malformed_windows_are_rejected() {
        let today = day("2024-03-01");
        assert!(DateWindow::from_params(&json!({"from": "2024-03-10", "to": "2024-03-01"}), today).is_err());
        assert!(DateWindow::from_params(&json!({"date": "25/04/2024"}), today).is_err());
    }

    #[test]
    fn filter_keeps_requested_symbols_sorted_by_date() {
        let event = |symbol: &str, date: &str| EarningsEvent {
            symbol: symbol.to_string(),
            date: date.to_string(),
            time: None,
            eps_estimate: None,
            eps_actual: None,
            revenue_estimate: None,
            revenue_actual: None,
        };
        let events = vec![event("MSFT", "2024-03-05"), event("AAPL", "2024-03-04"), event("IBM", "2024-03-02")];
        let symbols = vec!["AAPL".to_string(), "MSFT".to_string()];
        let cal = calendar("2024-03-01", "2024-03-08", &symbols, events, ProviderId::Fmp).unwrap();
        assert_eq!(cal.count, 2);
        assert_eq!(cal.events[0].symbol, "AAPL");

        let err = calendar("2024-03-01", "2024-03-08", &["TSLA".to_string()], vec![], ProviderId::Fmp).unwrap_err();
        assert!(matches!(err, ToolError::NotFound { .. }));
    }
}
