// src/tests/server_tests.rs
use actix_web::{test, web, App};
use serde_json::{json, Value};
use std::sync::Arc;

use super::support::{context, ScriptedTransport};
use crate::rpc_client::RpcClient;
use crate::server::{configure, AppState};

fn state(token: Option<&str>) -> web::Data<AppState> {
    let transport = Arc::new(ScriptedTransport::new());
    let rpc = RpcClient::new(context(&transport));
    web::Data::new(AppState::new(rpc, token.map(str::to_string)))
}

fn calculation() -> Value {
    json!({"operation": "pe_ratio", "values": {"price": 150, "eps": 6}})
}

#[actix_web::test]
async fn health_reports_every_tool() {
    let app = test::init_service(App::new().app_data(state(None)).configure(configure)).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["available_tools"].as_array().unwrap().len(), 12);
}

#[actix_web::test]
async fn tools_lists_schemas() {
    let app = test::init_service(App::new().app_data(state(None)).configure(configure)).await;
    let req = test::TestRequest::get().uri("/tools").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["count"], 12);
    let first = &body["tools"][0];
    assert!(first["name"].is_string());
    assert!(first["inputSchema"].is_object());
}

#[actix_web::test]
async fn invoke_runs_a_tool() {
    let app = test::init_service(App::new().app_data(state(None)).configure(configure)).await;
    let req = test::TestRequest::post()
        .uri("/invoke")
        .set_json(json!({"tool": "calculate_metric", "parameters": calculation()}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["is_reliable"], true);
    assert_eq!(body["tool"], "Financial Calculator");
    assert_eq!(body["data"]["result"], json!(25.0));
    assert!(body["metadata"]["execution_id"].is_string());
}

#[actix_web::test]
async fn invoke_unknown_tool_is_404() {
    let app = test::init_service(App::new().app_data(state(None)).configure(configure)).await;
    let req = test::TestRequest::post()
        .uri("/invoke")
        .set_json(json!({"tool": "scrape_website"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["available_tools"]
        .as_array()
        .unwrap()
        .contains(&json!("get_stock_quote")));
}

#[actix_web::test]
async fn bearer_token_is_enforced() {
    let app = test::init_service(App::new().app_data(state(Some("s3cret"))).configure(configure)).await;

    let req = test::TestRequest::post()
        .uri("/invoke")
        .set_json(json!({"tool": "calculate_metric", "parameters": calculation()}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status().as_u16(), 401);

    let req = test::TestRequest::post()
        .uri("/invoke")
        .insert_header(("Authorization", "Bearer s3cret"))
        .set_json(json!({"tool": "calculate_metric", "parameters": calculation()}))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = test::TestRequest::get().uri("/health").to_request();
    assert!(test::call_service(&app, req).await.status().is_success());
}

#[actix_web::test]
async fn mcp_lists_and_calls_tools() {
    let app = test::init_service(App::new().app_data(state(None)).configure(configure)).await;

    let req = test::TestRequest::post()
        .uri("/mcp")
        .set_json(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["id"], 1);
    assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 12);

    let req = test::TestRequest::post()
        .uri("/mcp")
        .set_json(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {"name": "calculate_metric", "arguments": calculation()}
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["result"]["isError"], false);
    assert_eq!(body["result"]["structuredContent"]["data"]["result"], json!(25.0));
    assert!(body["result"]["content"][0]["text"].is_string());
}

#[actix_web::test]
async fn mcp_reports_protocol_errors() {
    let app = test::init_service(App::new().app_data(state(None)).configure(configure)).await;

    let req = test::TestRequest::post()
        .uri("/mcp")
        .set_json(json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["error"]["code"], -32601);

    let req = test::TestRequest::post()
        .uri("/mcp")
        .set_json(json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {"name": "nope"}}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["error"]["code"], -32602);
    assert!(body.get("result").is_none());
}
