// src/tests/support.rs
//! In-memory transport that answers by URL fragment and records every call.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::client::{RemoteRequest, RemoteResponse, Transport};
use crate::config::ToolsConfig;
use crate::error::ProviderError;
use crate::providers::ProviderId;
use crate::tool::ToolContext;

#[derive(Clone, Debug)]
pub enum Reply {
    Json(u16, Value),
    Raw(u16, String),
    Fail(String),
    Delay(Duration, Box<Reply>),
}

pub fn ok(body: Value) -> Reply {
    Reply::Json(200, body)
}

pub fn status(code: u16) -> Reply {
    Reply::Json(code, serde_json::json!({"error": "scripted failure"}))
}

#[derive(Default)]
pub struct ScriptedTransport {
    routes: Vec<(String, Reply)>,
    calls: Mutex<Vec<String>>,
    abandoned: Arc<AtomicUsize>,
}

/// Counts a delayed reply as abandoned if its future is dropped mid-wait.
struct InFlight {
    abandoned: Arc<AtomicUsize>,
    finished: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.finished {
            self.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// First route whose fragment occurs in the request URL wins.
    /// Unmatched requests get a 404.
    pub fn route(mut self, fragment: &str, reply: Reply) -> Self {
        self.routes.push((fragment.to_string(), reply));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Delayed replies whose caller stopped waiting before they finished.
    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    pub fn called(&self, fragment: &str) -> bool {
        self.calls().iter().any(|url| url.contains(fragment))
    }

    fn lookup(&self, url: &str) -> Reply {
        self.routes
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| status(404))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.url.clone());
        }
        let mut reply = self.lookup(&request.url);
        loop {
            match reply {
                Reply::Delay(wait, next) => {
                    let mut in_flight = InFlight {
                        abandoned: Arc::clone(&self.abandoned),
                        finished: false,
                    };
                    tokio::time::sleep(wait).await;
                    in_flight.finished = true;
                    reply = *next;
                }
                Reply::Json(status, body) => {
                    return Ok(RemoteResponse {
                        status,
                        body: body.to_string(),
                    })
                }
                Reply::Raw(status, body) => return Ok(RemoteResponse { status, body }),
                Reply::Fail(message) => {
                    return Err(ProviderError::Transport {
                        provider: request.provider.clone(),
                        message,
                    })
                }
            }
        }
    }
}

/// Config with every credential set.
pub fn full_config() -> ToolsConfig {
    ToolsConfig::default()
        .with_credential(ProviderId::Fmp, "test-fmp")
        .with_credential(ProviderId::Finnhub, "test-finnhub")
        .with_credential(ProviderId::AlphaVantage, "test-av")
        .with_credential(ProviderId::TwelveData, "test-td")
}

pub fn context_with(config: ToolsConfig, transport: &Arc<ScriptedTransport>) -> ToolContext {
    ToolContext::with_transport(Arc::new(config), transport.clone())
}

pub fn context(transport: &Arc<ScriptedTransport>) -> ToolContext {
    context_with(full_config(), transport)
}

// Route fragments for the default public endpoints.
pub fn fmp_quote(symbol: &str) -> String {
    format!("financialmodelingprep.com/api/v3/quote/{}?", symbol)
}

pub fn finnhub_quote(symbol: &str) -> String {
    format!("finnhub.io/api/v1/quote?symbol={}", symbol)
}

pub fn av_function(function: &str, symbol: &str) -> String {
    format!("alphavantage.co/query?function={}&symbol={}&", function, symbol)
}

pub fn yahoo_quote(symbol: &str) -> String {
    format!("finance.yahoo.com/v7/finance/quote?symbols={}", symbol)
}
