//! End-to-end tests driving the router with `tower::ServiceExt::oneshot`.
//!
//! One small curriculum, one session header, no network.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use waybook_engine::{ConnectionRow, EngineConfig, PiiCodec, WorkbookDb};
use waybook_server::{router, AppState};
use waybook_types::{
    Block, BlockContent, BlockKind, ContentBody, PromptBody, SessionId, ToolBody, UserId,
};

/// Test codec: encrypt prefixes `enc:`, decrypt strips it or fails.
struct PrefixCodec;

impl PiiCodec for PrefixCodec {
    fn encrypt(&self, _session: SessionId, plaintext: &str) -> Option<String> {
        Some(format!("enc:{plaintext}"))
    }

    fn decrypt(&self, _session: SessionId, ciphertext: &str) -> Option<String> {
        ciphertext.strip_prefix("enc:").map(str::to_string)
    }
}

fn block(seq: u64, ex: &str, kind: BlockKind, content: BlockContent) -> Block {
    Block {
        id: seq as i64,
        sequence: seq,
        exercise: ex.parse().unwrap(),
        activity: 1,
        kind,
        connection_id: None,
        content,
    }
}

fn content(id: i64, kind: &str, text: &str) -> BlockContent {
    BlockContent::Content(ContentBody {
        id,
        kind: kind.into(),
        text: text.into(),
    })
}

fn prompt(id: i64, text: &str) -> BlockContent {
    BlockContent::Prompt(PromptBody {
        id,
        prompt_text: text.into(),
        input_type: Some("textarea".into()),
        input_config: None,
    })
}

fn tool(id: i64, name: &str) -> BlockContent {
    BlockContent::Tool(ToolBody {
        id,
        name: name.into(),
        description: None,
        instructions: None,
    })
}

/// Five blocks across two exercises, two connections, one session.
fn test_app(cfg: EngineConfig) -> (Router, String) {
    let db = WorkbookDb::in_memory().unwrap();
    db.insert_block(&block(1, "1.1.1", BlockKind::Content, content(101, "heading", "Energy")))
        .unwrap();
    db.insert_block(&block(2, "1.1.1", BlockKind::Content, content(102, "paragraph", "Read.")))
        .unwrap();
    db.insert_block(&block(3, "1.1.1", BlockKind::Prompt, prompt(11, "What energizes you?")))
        .unwrap();
    db.insert_block(&block(4, "1.1.2", BlockKind::Prompt, prompt(12, "And why?")))
        .unwrap();
    db.insert_block(&block(5, "1.1.2", BlockKind::Tool, tool(21, "journal")))
        .unwrap();
    db.insert_connection(&ConnectionRow {
        id: 1,
        name: "budget recap".into(),
        connection_type: "internal".into(),
        method: "auto_populate".into(),
        params: r#"{"source": "budget"}"#.into(),
    })
    .unwrap();
    db.insert_connection(&ConnectionRow {
        id: 2,
        name: "broken framework".into(),
        connection_type: "framework".into(),
        method: "custom".into(),
        params: "{{{not json".into(),
    })
    .unwrap();

    let session = db.create_session(UserId::new()).unwrap();
    let state = AppState::new(db, cfg, Arc::new(PrefixCodec));
    (router(state), session.to_string())
}

async fn send(
    app: &Router,
    method: Method,
    path: &str,
    session: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(session) = session {
        builder = builder.header("x-session-id", session);
    }
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn get(app: &Router, path: &str, session: Option<&str>) -> (StatusCode, Value) {
    send(app, Method::GET, path, session, None).await
}

fn answer(prompt_id: i64, exercise: &str, text: &str) -> Value {
    json!({ "promptId": prompt_id, "exerciseId": exercise, "responseText": text })
}

#[tokio::test]
async fn test_requests_without_valid_session_are_unauthorized() {
    let (app, _session) = test_app(EngineConfig::default());

    let (status, body) = get(&app, "/workbook", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing session");

    let bogus = SessionId::new().to_string();
    let (status, _) = get(&app, "/workbook", Some(&bogus)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get(&app, "/workbook", Some("not-a-session")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_is_accepted() {
    let (app, session) = test_app(EngineConfig::default());
    let request = Request::builder()
        .uri("/workbook")
        .header("cookie", format!("theme=dark; wb_session={session}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_new_user_gets_first_block_only() {
    let (app, session) = test_app(EngineConfig::default());
    let (status, body) = get(&app, "/workbook", Some(&session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progress"], 0);
    assert_eq!(body["hasMore"], true);
    let blocks = body["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0]["sequence"], 1);
    assert_eq!(blocks[0]["blockType"], "content");
    assert_eq!(blocks[0]["response"], Value::Null);
}

#[tokio::test]
async fn test_answering_advances_delivery() {
    let (app, session) = test_app(EngineConfig::default());
    let (status, ack) = send(
        &app,
        Method::POST,
        "/workbook/response",
        Some(&session),
        Some(answer(11, "1.1.1", "dancing")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["updated"], false);
    assert_eq!(ack["newProgress"], 3);
    assert_eq!(ack["nextBlock"]["sequence"], 4);
    assert_eq!(ack["nextBlock"]["response"], Value::Null);
    assert_eq!(ack["hasMore"], true);

    let (_, page) = get(&app, "/workbook", Some(&session)).await;
    assert_eq!(page["progress"], 3);
    let blocks = page["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 4);
    assert_eq!(blocks[2]["response"], "dancing");
}

#[tokio::test]
async fn test_edit_updates_without_moving_progress() {
    let (app, session) = test_app(EngineConfig::default());
    send(
        &app,
        Method::POST,
        "/workbook/response",
        Some(&session),
        Some(answer(11, "1.1.1", "v1")),
    )
    .await;

    let (status, ack) = send(
        &app,
        Method::PUT,
        "/workbook/response",
        Some(&session),
        Some(answer(11, "1.1.1", "v2")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["updated"], true);

    let (_, page) = get(&app, "/workbook", Some(&session)).await;
    assert_eq!(page["progress"], 3);
    assert_eq!(page["blocks"][2]["response"], "v2");
}

#[tokio::test]
async fn test_put_without_existing_response_is_404() {
    let (app, session) = test_app(EngineConfig::default());
    let (status, _) = send(
        &app,
        Method::PUT,
        "/workbook/response",
        Some(&session),
        Some(answer(11, "1.1.1", "never created")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_structurally_invalid_saves_are_400() {
    let (app, session) = test_app(EngineConfig::default());

    let (status, body) = send(
        &app,
        Method::POST,
        "/workbook/response",
        Some(&session),
        Some(json!({ "promptId": 11, "toolId": 21, "exerciseId": "1.1.1", "responseText": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("both"));

    let (status, _) = send(
        &app,
        Method::POST,
        "/workbook/response",
        Some(&session),
        Some(answer(11, "1.2", "x")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/workbook/response",
        Some(&session),
        Some(json!({ "exerciseId": "1.1.1", "responseText": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_windows_paginate_over_covered_material() {
    let (app, session) = test_app(EngineConfig::default());
    send(
        &app,
        Method::POST,
        "/workbook/response",
        Some(&session),
        Some(answer(11, "1.1.1", "a")),
    )
    .await;

    let (status, first) = get(&app, "/workbook/history?limit=2", Some(&session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["pagination"]["fromSequence"], 1);
    assert_eq!(first["pagination"]["toSequence"], 2);
    assert_eq!(first["pagination"]["hasMore"], true);
    assert_eq!(first["pagination"]["hasPrevious"], false);
    assert_eq!(first["pagination"]["totalBlocks"], 3);
    assert_eq!(first["blocks"].as_array().unwrap().len(), 2);
    assert_eq!(first["exerciseBoundaries"][0]["title"], "Energy");

    let (_, second) = get(&app, "/workbook/history?fromSequence=3&limit=2", Some(&session)).await;
    assert_eq!(second["pagination"]["toSequence"], 4);
    assert_eq!(second["pagination"]["hasMore"], false);
    assert_eq!(second["pagination"]["hasPrevious"], true);
    // Window past progress spills into the ahead allowance.
    assert_eq!(second["blocks"].as_array().unwrap().len(), 2);
    assert_eq!(second["exerciseBoundaries"][1]["title"], "Exercise 1.1.2");
}

#[tokio::test]
async fn test_connection_endpoint_soft_failures() {
    let (app, session) = test_app(EngineConfig::default());

    let (status, _) = get(&app, "/data/connection", Some(&session)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Empty budget: empty data, not an error.
    let (status, body) = get(&app, "/data/connection?connectionId=1", Some(&session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isEmpty"], true);
    assert_eq!(body["data"], json!([]));
    assert!(body.get("error").is_none());

    // Malformed params degrade to the default object.
    let (_, body) = get(&app, "/data/connection?connectionId=2", Some(&session)).await;
    assert_eq!(body["method"], "custom");
    assert_eq!(body["data"], json!({"instructions": []}));

    // Missing connection reports itself in-band.
    let (status, body) = get(&app, "/data/connection?connectionId=99", Some(&session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], "connection 99 not found");
}

#[tokio::test]
async fn test_sensitive_tool_responses_roundtrip_decrypted() {
    let mut cfg = EngineConfig::default();
    cfg.sensitive_tool_ids.insert(21);
    let (app, session) = test_app(cfg);

    let (status, _) = send(
        &app,
        Method::POST,
        "/workbook/response",
        Some(&session),
        Some(json!({ "toolId": 21, "exerciseId": "1.1.2", "responseText": "private notes" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Listing decrypts.
    let (status, listed) =
        get(&app, "/workbook/response?exerciseId=1.1.2", Some(&session)).await;
    assert_eq!(status, StatusCode::OK);
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["responseText"], "private notes");
    assert_eq!(listed[0]["toolId"], 21);

    // Merge decrypts too.
    let (_, page) = get(&app, "/workbook", Some(&session)).await;
    assert_eq!(page["blocks"][4]["response"], "private notes");
}

#[tokio::test]
async fn test_response_listing_requires_exercise_id() {
    let (app, session) = test_app(EngineConfig::default());
    let (status, _) = get(&app, "/workbook/response", Some(&session)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&app, "/workbook/response?exerciseId=nope", Some(&session)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("segment"));
}
