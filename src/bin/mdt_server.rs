// src/bin/mdt_server.rs
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use log::info;
use std::env;
use std::sync::Arc;

use market_data_tools::{configure, AppState, RpcClient, ToolContext, ToolsConfig};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = ToolsConfig::from_env().context("invalid configuration")?;
    let rpc = RpcClient::new(ToolContext::new(Arc::new(config)));
    let tool_names = rpc.list_available_tools().join(", ");
    let state = web::Data::new(AppState::new(rpc, env::var("MDT_AUTH_TOKEN").ok()));

    let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let bind_address = format!("0.0.0.0:{}", port);

    info!("🚀 Market data tool server running on http://{}", bind_address);
    info!("📋 Endpoints: POST /invoke, GET /tools, GET /health, POST /mcp");
    info!("📚 Tools: {}", tool_names);
    if state.auth_token.is_none() {
        info!("🔓 MDT_AUTH_TOKEN not set, endpoints are unauthenticated");
    }

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {}", bind_address))?
    .run()
    .await?;

    Ok(())
}
