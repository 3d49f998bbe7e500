mod common;

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use common::{body_bytes, body_json, build_test_app, post_json, spawn_stub, Behavior};

#[tokio::test]
async fn e2e_paraphrase_returns_first_choice() {
    let (url, stub) = spawn_stub(Behavior::Reply("Kindly consider the following.".to_string())).await;
    let app = build_test_app(&url, 5_000);

    let response = app
        .oneshot(post_json("/api/paraphrase", r#"{"goal": "make this sound formal"}"#))
        .await
        .expect("oneshot");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        &body_bytes(response).await[..],
        br#"{"result":"Kindly consider the following."}"#
    );

    assert_eq!(stub.calls(), 1);
    let (auth, body) = stub.last_request();
    assert_eq!(auth.as_deref(), Some("Bearer test-key"));
    assert_eq!(body["model"], "llama3-70b-8192");
    assert_eq!(
        body["messages"],
        json!([{"role": "user", "content": "Paraphrase the following: make this sound formal"}])
    );
}

#[tokio::test]
async fn e2e_paraphrase_result_is_unaltered() {
    let text = "  Spaced out,\n with \"quotes\" and ünïcödé  ";
    let (url, _stub) = spawn_stub(Behavior::Reply(text.to_string())).await;
    let app = build_test_app(&url, 5_000);

    let response = app
        .oneshot(post_json("/api/paraphrase", r#"{"goal": "  trim me  "}"#))
        .await
        .expect("oneshot");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["result"], text);
}

#[tokio::test]
async fn e2e_empty_goal_makes_no_upstream_call() {
    let (url, stub) = spawn_stub(Behavior::Reply("unused".to_string())).await;
    let app = build_test_app(&url, 5_000);

    for body in [r#"{}"#, r#"{"goal": ""}"#, r#"{"goal": "   "}"#] {
        let response = app
            .clone()
            .oneshot(post_json("/api/paraphrase", body))
            .await
            .expect("oneshot");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body={}", body);
        assert_eq!(body_json(response).await["error"], "goal must not be empty");
    }

    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn e2e_malformed_json_makes_no_upstream_call() {
    let (url, stub) = spawn_stub(Behavior::Reply("unused".to_string())).await;
    let app = build_test_app(&url, 5_000);

    let response = app
        .oneshot(post_json("/api/paraphrase", "{goal: not json"))
        .await
        .expect("oneshot");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn e2e_upstream_500_maps_to_502() {
    let (url, stub) = spawn_stub(Behavior::Status(500)).await;
    let app = build_test_app(&url, 5_000);

    let response = app
        .clone()
        .oneshot(post_json("/api/paraphrase", r#"{"goal": "hello"}"#))
        .await
        .expect("oneshot");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["error"], "upstream completion failed");
    assert!(!json.to_string().contains("upstream exploded"));

    // 服务仍可继续处理请求
    let response = app
        .oneshot(post_json("/api/paraphrase", r#"{"goal": "again"}"#))
        .await
        .expect("oneshot");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(stub.calls(), 2);
}

#[tokio::test]
async fn e2e_slow_upstream_times_out_with_502() {
    let (url, _stub) = spawn_stub(Behavior::Slow(Duration::from_secs(5))).await;
    let app = build_test_app(&url, 200);

    let started = Instant::now();
    let response = app
        .oneshot(post_json("/api/paraphrase", r#"{"goal": "hello"}"#))
        .await
        .expect("oneshot");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn e2e_unparsable_upstream_body_maps_to_502() {
    for raw in ["not json at all", r#"{"choices": []}"#, r#"{"data": 1}"#] {
        let (url, _stub) = spawn_stub(Behavior::Raw(raw.to_string())).await;
        let app = build_test_app(&url, 5_000);
        let response = app
            .oneshot(post_json("/api/paraphrase", r#"{"goal": "hello"}"#))
            .await
            .expect("oneshot");
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY, "raw={}", raw);
    }
}

#[tokio::test]
async fn e2e_same_goal_twice_calls_upstream_twice() {
    let (url, stub) = spawn_stub(Behavior::Reply("Same answer.".to_string())).await;
    let app = build_test_app(&url, 5_000);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_json("/api/paraphrase", r#"{"goal": "repeat me"}"#))
            .await
            .expect("oneshot");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["result"], "Same answer.");
    }

    assert_eq!(stub.calls(), 2);
}
