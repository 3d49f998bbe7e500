#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use goalcraft_core_sdk::{
    config::{AllowedOrigins, AppConfig},
    models::UpstreamConfig,
    server::build_app,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};

#[derive(Clone)]
pub enum Behavior {
    Reply(String),
    Status(u16),
    Slow(Duration),
    Raw(String),
}

#[derive(Clone)]
pub struct Stub {
    pub behavior: Behavior,
    pub calls: Arc<AtomicUsize>,
    pub last: Arc<Mutex<Option<(Option<String>, Value)>>>,
}

impl Stub {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> (Option<String>, Value) {
        self.last
            .lock()
            .expect("lock")
            .clone()
            .expect("stub saw no request")
    }
}

pub fn completion(text: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": text}, "finish_reason": "stop"}
        ]
    })
}

async fn mock_completions(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    stub.calls.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    *stub.last.lock().expect("lock") = Some((auth, body));

    match stub.behavior {
        Behavior::Reply(text) => Json(completion(&text)).into_response(),
        Behavior::Status(code) => (
            StatusCode::from_u16(code).expect("status"),
            Json(json!({"error": {"message": "upstream exploded"}})),
        )
            .into_response(),
        Behavior::Slow(delay) => {
            tokio::time::sleep(delay).await;
            Json(completion("too late")).into_response()
        }
        Behavior::Raw(raw) => (
            StatusCode::OK,
            [("content-type", "application/json")],
            raw,
        )
            .into_response(),
    }
}

pub async fn spawn_stub(behavior: Behavior) -> (String, Stub) {
    let stub = Stub {
        behavior,
        calls: Arc::new(AtomicUsize::new(0)),
        last: Arc::new(Mutex::new(None)),
    };
    let app = Router::new()
        .route("/openai/v1/chat/completions", post(mock_completions))
        .with_state(stub.clone());
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });

    (format!("http://{}/openai/v1/chat/completions", addr), stub)
}

pub fn build_test_app(url: &str, timeout_ms: u64) -> Router {
    build_app(&AppConfig {
        addr: "127.0.0.1:0".to_string(),
        upstream: UpstreamConfig {
            url: url.to_string(),
            api_key: "test-key".to_string(),
            model: "llama3-70b-8192".to_string(),
            timeout_ms,
        },
        allowed_origins: AllowedOrigins::Any,
        ui_dir: None,
        telemetry_enabled: false,
        log_dir: PathBuf::from("logs"),
    })
    .expect("build app")
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}

