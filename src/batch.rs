// src/batch.rs
//! Concurrent per-symbol execution with partial-failure tolerance.

use chrono::Utc;
use futures::future::join_all;
use log::{info, warn};
use serde_json::{json, Map, Value};
use std::future::Future;

use crate::envelope::{Confidence, EnvelopeMetadata, ResultEnvelope};
use crate::error::ToolError;
use crate::fallback::Resolved;
use crate::query::{OperationKind, Query};
use crate::symbols::normalize_symbol;

/// Runs one operation per symbol concurrently and collects every outcome.
#[derive(Debug, Clone, Copy)]
pub struct FanOutExecutor {
    cap: usize,
}

impl FanOutExecutor {
    pub fn new(cap: usize) -> Self {
        Self { cap: cap.max(1) }
    }

    /// First `cap` symbols; the rest are dropped with a warning.
    pub fn capped(&self, symbols: &[String]) -> Vec<String> {
        if symbols.len() > self.cap {
            warn!(
                "✂️ Batch of {} symbols truncated to {}; dropped {}",
                symbols.len(),
                self.cap,
                symbols[self.cap..].join(", ")
            );
        }
        symbols.iter().take(self.cap).cloned().collect()
    }

    /// Launches `op` for every capped symbol at once and waits for all of
    /// them. Symbols failing validation are reported as failures without
    /// running `op`. Results are reported in the caller's symbol order.
    pub async fn run<F, Fut>(&self, symbols: &[String], op: F) -> BatchAggregate
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Resolved, ToolError>>,
    {
        let tickers = self.capped(symbols);
        let op = &op;
        let outcomes = join_all(tickers.iter().map(|ticker| async move {
            match normalize_symbol(ticker, "symbols") {
                Ok(symbol) => op(symbol).await,
                Err(err) => Err(err),
            }
        }))
        .await;

        let mut entries = Vec::new();
        let mut failures = Vec::new();
        for (ticker, outcome) in tickers.iter().zip(outcomes) {
            match outcome {
                Ok(resolved) => entries.push((ticker.clone(), resolved)),
                Err(err) => {
                    warn!("⚠️ {} failed in batch: {}", ticker, err);
                    failures.push((ticker.clone(), err));
                }
            }
        }
        info!(
            "📦 Batch finished: {}/{} symbols with data",
            entries.len(),
            tickers.len()
        );

        BatchAggregate {
            tickers,
            entries,
            failures,
        }
    }

    /// Arity dispatch: one symbol yields its own envelope, several yield a
    /// batch envelope keyed by symbol. When no kept symbol is a valid
    /// ticker the whole query is rejected.
    pub async fn dispatch<F, Fut>(&self, tool: &str, query: &Query, op: F) -> ResultEnvelope
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Resolved, ToolError>>,
    {
        let data_type = query.kind.data_type();
        let symbols = self.capped(&query.symbols);
        let checked: Vec<Result<String, ToolError>> = symbols
            .iter()
            .map(|symbol| normalize_symbol(symbol, "symbols"))
            .collect();

        if checked.iter().all(Result::is_err) {
            if let Some(Err(err)) = checked.first() {
                return ResultEnvelope::failure(tool, EnvelopeMetadata::new("none", data_type), err);
            }
        }
        if let [Ok(symbol)] = checked.as_slice() {
            return match op(symbol.clone()).await {
                Ok(resolved) => resolved.into_envelope(tool, data_type),
                Err(err) => ResultEnvelope::failure(tool, EnvelopeMetadata::new("none", data_type), &err),
            };
        }
        self.run(&symbols, op).await.into_envelope(tool, query.kind)
    }
}

#[derive(Debug)]
pub struct BatchAggregate {
    /// Symbols actually processed, after the cap.
    pub tickers: Vec<String>,
    pub entries: Vec<(String, Resolved)>,
    pub failures: Vec<(String, ToolError)>,
}

impl BatchAggregate {
    pub fn tickers_with_data(&self) -> Vec<String> {
        self.entries.iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn failed_tickers(&self) -> Vec<String> {
        self.failures.iter().map(|(t, _)| t.clone()).collect()
    }

    fn failure_summary(&self) -> String {
        self.failures
            .iter()
            .map(|(ticker, err)| format!("{}: {}", ticker, err))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn into_envelope(self, tool: &str, kind: OperationKind) -> ResultEnvelope {
        let data_type = kind.batch_data_type();

        if self.entries.is_empty() {
            warn!("❌ No symbol in [{}] returned data", self.tickers.join(", "));
            let err = ToolError::Exhausted {
                attempted: self.tickers.clone(),
                last_error: self.failure_summary(),
            };
            let mut metadata = EnvelopeMetadata::new("none", data_type);
            metadata.failed_tickers = Some(self.failed_tickers());
            return ResultEnvelope::failure(tool, metadata, &err);
        }

        let mut sources: Vec<&str> = Vec::new();
        for (_, resolved) in &self.entries {
            if !sources.contains(&resolved.source.as_str()) {
                sources.push(&resolved.source);
            }
        }
        let confidence = self
            .entries
            .iter()
            .map(|(_, r)| r.confidence)
            .min()
            .unwrap_or(Confidence::Low);
        let degraded: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, r)| !r.reliable)
            .map(|(t, r)| format!("{}: {}", t, r.note.as_deref().unwrap_or("degraded source")))
            .collect();

        let mut metadata = EnvelopeMetadata::new(sources.join(","), data_type).with_confidence(confidence);
        let mut notes: Vec<String> = Vec::new();
        if !self.failures.is_empty() {
            metadata.failed_tickers = Some(self.failed_tickers());
            notes.push(format!("No data for {}", self.failure_summary()));
        }
        if !degraded.is_empty() {
            notes.push(format!("Degraded results for {}", degraded.join("; ")));
        }

        let category = kind.category();
        let tickers_with_data = self.tickers_with_data();
        let mut by_ticker = Map::new();
        for (ticker, resolved) in self.entries {
            by_ticker.insert(ticker, resolved.data);
        }
        let mut payload = Map::new();
        payload.insert("tickers".to_string(), json!(self.tickers));
        payload.insert("tickers_with_data".to_string(), json!(tickers_with_data));
        payload.insert(format!("{}_count", category), json!(tickers_with_data.len()));
        payload.insert(format!("{}_by_ticker", category), Value::Object(by_ticker));
        payload.insert("last_updated".to_string(), json!(Utc::now().to_rfc3339()));

        if degraded.is_empty() {
            if !notes.is_empty() {
                metadata = metadata.with_note(notes.join(". "));
            }
            ResultEnvelope::reliable(tool, Value::Object(payload), metadata)
        } else {
            ResultEnvelope::best_effort(tool, Value::Object(payload), metadata, notes.join(". "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::{AttemptOutcome, ProviderAttempt};
    use crate::query::OperationKind;

    fn resolved(source: &str, confidence: Confidence, reliable: bool) -> Resolved {
        Resolved {
            data: json!({"price": 10.0}),
            source: source.to_string(),
            confidence,
            reliable,
            note: (!reliable).then(|| "static guess".to_string()),
            attempts: vec![ProviderAttempt {
                source: source.to_string(),
                confidence,
                outcome: AttemptOutcome::Success,
            }],
        }
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn partial_failures_keep_successful_symbols() {
        let executor = FanOutExecutor::new(5);
        let aggregate = executor
            .run(&symbols(&["S1", "S2", "S3", "S4", "S5"]), |ticker| async move {
                match ticker.as_str() {
                    "S1" | "S3" => Err(ToolError::not_found("p", "none")),
                    _ => Ok(resolved("p", Confidence::High, true)),
                }
            })
            .await;
        assert_eq!(aggregate.tickers_with_data(), vec!["S2", "S4", "S5"]);
        assert_eq!(aggregate.failed_tickers(), vec!["S1", "S3"]);

        let envelope = aggregate.into_envelope("Stock Quote", OperationKind::Quote);
        assert!(envelope.is_reliable);
        assert_eq!(envelope.data["tickers"].as_array().unwrap().len(), 5);
        assert_eq!(envelope.data["quotes_count"], json!(3));
        assert!(envelope.data["quotes_by_ticker"].get("S1").is_none());
        assert!(envelope.metadata.note.as_deref().unwrap().contains("S1"));
    }

    #[tokio::test]
    async fn invalid_symbol_is_a_per_symbol_failure() {
        let aggregate = FanOutExecutor::new(5)
            .run(&symbols(&["A", "NOT VALID!", "B"]), |_| async {
                Ok(resolved("p", Confidence::High, true))
            })
            .await;
        assert_eq!(aggregate.tickers_with_data(), vec!["A", "B"]);
        assert_eq!(aggregate.failed_tickers(), vec!["NOT VALID!"]);
        assert_eq!(aggregate.failures[0].1.kind(), crate::error::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn query_of_only_invalid_symbols_is_rejected() {
        let query = Query {
            kind: OperationKind::Quote,
            symbols: symbols(&["BAD ONE", "BAD TWO"]),
        };
        let envelope = FanOutExecutor::new(5)
            .dispatch("Stock Quote", &query, |_| async {
                Ok(resolved("p", Confidence::High, true))
            })
            .await;
        assert!(!envelope.is_reliable);
        assert_eq!(envelope.metadata.error_kind.as_deref(), Some("validation"));
    }

    #[test]
    fn capped_keeps_caller_order() {
        let executor = FanOutExecutor::new(2);
        assert_eq!(executor.capped(&symbols(&["C", "A", "B"])), vec!["C", "A"]);
    }

    #[tokio::test]
    async fn all_failed_batch_is_a_failure_envelope() {
        let aggregate = FanOutExecutor::new(5)
            .run(&symbols(&["A", "B"]), |_| async { Err(ToolError::not_found("p", "none")) })
            .await;
        let envelope = aggregate.into_envelope("Stock Quote", OperationKind::Quote);
        assert!(!envelope.is_reliable);
        assert!(envelope.data.is_null());
        assert_eq!(envelope.metadata.error_kind.as_deref(), Some("exhausted"));
        assert_eq!(envelope.metadata.failed_tickers, Some(symbols(&["A", "B"])));
    }

    #[tokio::test]
    async fn degraded_entries_make_the_batch_unreliable() {
        let aggregate = FanOutExecutor::new(5)
            .run(&symbols(&["A", "B"]), |ticker| async move {
                Ok(if ticker == "A" {
                    resolved("fmp", Confidence::High, true)
                } else {
                    resolved("static_default", Confidence::Low, false)
                })
            })
            .await;
        let envelope = aggregate.into_envelope("Asset Type", OperationKind::AssetType);
        assert!(!envelope.is_reliable);
        assert_eq!(envelope.metadata.source, "fmp,static_default");
        assert_eq!(envelope.metadata.confidence, Some(Confidence::Low));
        assert!(envelope.is_explained());
    }
}
