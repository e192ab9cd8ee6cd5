// HTTP surface: health and the interactivity endpoint, driven through the router

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use engage_server::api::router;
use engage_server::state::AppState;
use engage_server::worker::{DecisionJob, DecisionQueue};
use engage_types::MessageRef;

use common::memory_db;

fn app(capacity: usize) -> (Router, mpsc::Receiver<DecisionJob>) {
    let (queue, rx) = DecisionQueue::new(capacity);
    (router(AppState::new(memory_db(), queue)), rx)
}

fn interaction(payload: &Value) -> Request<Body> {
    let body = format!(
        "payload={}",
        urlencoding::encode(&payload.to_string())
    );
    Request::builder()
        .method("POST")
        .uri("/slack/actions")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn click(action_id: &str, social_id: &str) -> Value {
    json!({
        "type": "block_actions",
        "trigger_id": "trig-1",
        "channel": { "id": "D42" },
        "message": { "ts": "1700000000.000100", "blocks": [] },
        "actions": [{ "action_id": action_id, "value": social_id }]
    })
}

#[tokio::test]
async fn test_health_check() {
    let (app, _rx) = app(4);
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_approve_click_is_acked_and_queued() {
    let (app, mut rx) = app(4);
    let response = app
        .oneshot(interaction(&click("approve_comment", "urn:li:activity:1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "ok": true }));
    assert_eq!(
        rx.try_recv().unwrap(),
        DecisionJob::Approve {
            social_id: "urn:li:activity:1".to_string(),
            message: Some(MessageRef::new("D42", "1700000000.000100")),
        }
    );
}

#[tokio::test]
async fn test_edit_submission_clears_the_view() {
    let (app, mut rx) = app(4);
    let payload = json!({
        "type": "view_submission",
        "view": {
            "callback_id": "edit_comment_submit",
            "private_metadata": "urn:li:activity:7",
            "state": { "values": { "comment_block": { "comment_input": { "value": "Sharper take" } } } }
        }
    });

    let response = app.oneshot(interaction(&payload)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "response_action": "clear" }));
    assert_eq!(
        rx.try_recv().unwrap(),
        DecisionJob::Edit {
            social_id: "urn:li:activity:7".to_string(),
            text: "Sharper take".to_string(),
            message: None,
        }
    );
}

#[tokio::test]
async fn test_garbage_payloads_are_acked_without_work() {
    let (app, mut rx) = app(4);

    let not_json = Request::builder()
        .method("POST")
        .uri("/slack/actions")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("payload=%7Bnot-json"))
        .unwrap();
    let response = app.clone().oneshot(not_json).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let unknown_action = click("launch_rockets", "urn:li:activity:1");
    let response = app.oneshot(interaction(&unknown_action)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_full_queue_reports_unavailable() {
    let (app, _rx) = app(1);

    let first = app
        .clone()
        .oneshot(interaction(&click("skip_comment", "urn:li:activity:1")))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(interaction(&click("skip_comment", "urn:li:activity:2")))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(json_body(second).await.get("error").is_some());
}
