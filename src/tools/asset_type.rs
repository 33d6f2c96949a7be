// src/tools/asset_type.rs
//! Asset-type classification. The dedicated fund endpoint only answers for
//! ETFs, so a hit there is authoritative; Yahoo's quote type covers the
//! remaining asset classes; FMP profile flags are the weakest signal.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{attempt, symbol_schema};
use crate::envelope::{Confidence, ResultEnvelope};
use crate::error::ToolError;
use crate::fallback::{FallbackChain, Resolved, STATIC_DEFAULT_SOURCE};
use crate::models::AssetClassification;
use crate::providers::{fmp, yahoo, ProviderId};
use crate::query::{OperationKind, Query};
use crate::tool::{Tool, ToolContext};

pub struct AssetTypeTool;

/// Classification reported when no provider recognises the symbol.
pub fn unclassified(symbol: &str, framework: &str) -> AssetClassification {
    AssetClassification {
        symbol: symbol.to_string(),
        name: None,
        product_type: "Unknown".to_string(),
        product_category: "Unclassified".to_string(),
        analysis_framework: framework.to_string(),
        quote_type: None,
        exchange: None,
    }
}

#[async_trait]
impl Tool for AssetTypeTool {
    fn name(&self) -> &str {
        "classify_asset_type"
    }

    fn display_name(&self) -> &str {
        "Asset Type Classification"
    }

    fn description(&self) -> &str {
        "Classify tickers as stock, ETF, fund, index, crypto, currency or derivative and pick the matching analysis framework"
    }

    fn input_schema(&self) -> Value {
        symbol_schema(json!({}))
    }

    fn kind(&self) -> OperationKind {
        OperationKind::AssetType
    }

    async fn run(&self, params: &Value, ctx: &ToolContext) -> Result<ResultEnvelope, ToolError> {
        let query = Query::from_params(self.kind(), params)?;
        Ok(ctx
            .fan_out()
            .dispatch(self.display_name(), &query, |symbol| classify(ctx, symbol))
            .await)
    }
}

async fn classify(ctx: &ToolContext, symbol: String) -> Result<Resolved, ToolError> {
    let endpoints = ctx.endpoints();
    let client = &ctx.client;
    let framework = ctx.config.unclassified_framework.as_str();
    let symbol = symbol.as_str();

    FallbackChain::new(format!("asset type {}", symbol))
        .keyed_candidate("fmp_etf_info", Confidence::High, ctx.credential(ProviderId::Fmp), move |key| {
            attempt(client, fmp::etf_info_request(endpoints, key, symbol), move |raw| {
                fmp::parse_fund_metadata(symbol, raw)
            })
        })
        .candidate(ProviderId::Yahoo.source_name(), Confidence::High, move || {
            attempt(client, yahoo::quote_request(endpoints, symbol), move |raw| {
                yahoo::parse_classification(symbol, raw)
            })
        })
        .keyed_candidate("fmp_profile", Confidence::Medium, ctx.credential(ProviderId::Fmp), move |key| {
            attempt(client, fmp::profile_request(endpoints, key, symbol), move |raw| {
                fmp::parse_profile_classification(symbol, raw)
            })
        })
        .with_default(
            STATIC_DEFAULT_SOURCE,
            &unclassified(symbol, framework),
            format!("No provider could classify {}; assuming {}", symbol, framework),
        )?
        .resolve()
        .await
}
