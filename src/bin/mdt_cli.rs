// src/bin/mdt_cli.rs
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::{json, Value};
use std::sync::Arc;

use market_data_tools::{RpcClient, ToolContext, ToolsConfig};

#[derive(Parser)]
#[command(name = "mdt-cli")]
#[command(about = "Market data tools CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Latest quote for one or more tickers
    Quote { symbols: Vec<String> },
    /// Company profile
    Fundamentals { symbols: Vec<String> },
    /// TTM financial ratios
    Ratios { symbols: Vec<String> },
    /// TTM key metrics
    Metrics { symbols: Vec<String> },
    /// Technical indicator series
    Indicator {
        symbols: Vec<String>,
        #[arg(short, long, default_value = "rsi")]
        indicator: String,
        #[arg(short, long, default_value_t = 14)]
        period: u32,
        #[arg(long, default_value = "daily")]
        interval: String,
        #[arg(short, long, default_value_t = 30)]
        limit: u32,
    },
    /// Recent news
    News {
        symbols: Vec<String>,
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
        #[arg(short, long, default_value_t = 7)]
        days: u32,
    },
    /// Market-wide news, or company news for the given tickers
    MarketNews {
        symbols: Vec<String>,
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
    /// Ticker lookup by company name
    Search {
        query: String,
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
    /// Asset-type classification
    AssetType { symbols: Vec<String> },
    /// Watchlist tickers
    Watchlist {
        #[arg(short, long, default_value = "default")]
        list: String,
    },
    /// Earnings calendar, optionally filtered by ticker
    Earnings {
        symbols: Vec<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Derived metric, e.g. `calc pe_ratio '{"price": 150, "eps": 6}'`
    Calc { operation: String, values: String },
    /// List registered tools
    Tools,
    /// Call any tool with raw JSON parameters
    Call { tool: String, parameters: Option<String> },
}

fn parse_json(raw: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("not valid JSON: {}", raw))
}

fn with_symbols(symbols: Vec<String>, mut params: Value) -> Value {
    if !symbols.is_empty() {
        params["symbols"] = json!(symbols);
    }
    params
}

fn request(command: Commands) -> anyhow::Result<(&'static str, Value)> {
    let call = match command {
        Commands::Quote { symbols } => ("get_stock_quote", with_symbols(symbols, json!({}))),
        Commands::Fundamentals { symbols } => ("get_fundamentals", with_symbols(symbols, json!({}))),
        Commands::Ratios { symbols } => ("get_financial_ratios", with_symbols(symbols, json!({}))),
        Commands::Metrics { symbols } => ("get_key_metrics", with_symbols(symbols, json!({}))),
        Commands::Indicator {
            symbols,
            indicator,
            period,
            interval,
            limit,
        } => (
            "get_technical_indicator",
            with_symbols(
                symbols,
                json!({"indicator": indicator, "period": period, "interval": interval, "limit": limit}),
            ),
        ),
        Commands::News { symbols, limit, days } => (
            "get_news",
            with_symbols(symbols, json!({"limit": limit, "days": days})),
        ),
        Commands::MarketNews { symbols, limit } => {
            ("get_market_news", with_symbols(symbols, json!({ "limit": limit })))
        }
        Commands::Search { query, limit } => ("search_ticker", json!({"query": query, "limit": limit})),
        Commands::AssetType { symbols } => ("classify_asset_type", with_symbols(symbols, json!({}))),
        Commands::Watchlist { list } => ("get_watchlist", json!({ "list": list })),
        Commands::Earnings { symbols, from, to } => (
            "get_earnings_calendar",
            with_symbols(symbols, json!({"from": from, "to": to})),
        ),
        Commands::Calc { operation, values } => (
            "calculate_metric",
            json!({"operation": operation, "values": parse_json(&values)?}),
        ),
        Commands::Tools | Commands::Call { .. } => bail!("not a direct tool command"),
    };
    Ok(call)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let config = ToolsConfig::from_env().context("invalid configuration")?;
    let rpc = RpcClient::new(ToolContext::new(Arc::new(config)));

    let envelope = match cli.command {
        Commands::Tools => {
            println!("{}", serde_json::to_string_pretty(&rpc.resolver().list_tools())?);
            return Ok(());
        }
        Commands::Call { tool, parameters } => {
            let parameters = match parameters {
                Some(raw) => parse_json(&raw)?,
                None => json!({}),
            };
            match rpc.call_tool(&tool, parameters).await {
                Some(envelope) => envelope,
                None => bail!(
                    "unknown tool '{}'; available: {}",
                    tool,
                    rpc.list_available_tools().join(", ")
                ),
            }
        }
        command => {
            let (tool, parameters) = request(command)?;
            rpc.call_tool(tool, parameters)
                .await
                .with_context(|| format!("tool '{}' is not registered", tool))?
        }
    };

    println!("{}", serde_json::to_string_pretty(&envelope)?);
    if !envelope.is_reliable && envelope.data.is_null() {
        std::process::exit(1);
    }
    Ok(())
}
