//! Providers exercised against local stub servers.

use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use npc_core::{ParameterType, ToolDeclaration};
use npc_llm::{
    LlmProvider, LlmRequest, LmStudioProvider, OllamaProvider, ProviderErrorKind,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn ollama(base_url: &str) -> OllamaProvider {
    OllamaProvider::new(base_url, "test-model", Duration::from_secs(5)).unwrap()
}

fn request() -> LlmRequest {
    LlmRequest::new("You are a blacksmith.", "A customer walks in.")
}

async fn ollama_status(status: StatusCode) -> ProviderErrorKind {
    let base = spawn(Router::new().route(
        "/api/chat",
        post(move || async move { (status, "backend said no") }),
    ))
    .await;
    ollama(&base).generate(&request()).await.unwrap_err().kind
}

// ── Ollama ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_ollama_successful_response() {
    let base = spawn(Router::new().route(
        "/api/chat",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["model"], "test-model");
            assert_eq!(body["stream"], false);
            assert!(body.get("tools").is_none());
            Json(json!({
                "model": "test-model",
                "message": { "role": "assistant", "content": "Welcome, traveler." },
                "done": true,
                "done_reason": "stop"
            }))
        }),
    ))
    .await;

    let resp = ollama(&base).generate(&request()).await.unwrap();
    assert_eq!(resp.text, "Welcome, traveler.");
    assert!(resp.tool_uses.is_empty());
}

#[tokio::test]
async fn test_ollama_with_tool_call() {
    let base = spawn(Router::new().route(
        "/api/chat",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["tools"][0]["function"]["name"], "speak");
            Json(json!({
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [
                        { "function": { "name": "speak", "arguments": { "message": "Need a sword?" } } }
                    ]
                },
                "done": true
            }))
        }),
    ))
    .await;

    let tool = ToolDeclaration::new("speak", "Say something").with_parameter(
        "message",
        ParameterType::String,
        "what to say",
        true,
    );
    let resp = ollama(&base)
        .generate(&request().with_tools(vec![tool]))
        .await
        .unwrap();

    assert_eq!(resp.tool_uses.len(), 1);
    assert_eq!(resp.tool_uses[0].tool_name, "speak");
    assert_eq!(resp.tool_uses[0].args["message"], "Need a sword?");
}

#[tokio::test]
async fn test_ollama_model_not_found() {
    let base = spawn(Router::new().route(
        "/api/chat",
        post(|| async { (StatusCode::NOT_FOUND, "model not found") }),
    ))
    .await;

    let err = ollama(&base).generate(&request()).await.unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::ModelNotFound);
    assert_eq!(err.provider, "ollama");
    assert_eq!(err.model, "test-model");
    assert!(err.to_string().contains("model 'test-model' not found"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_ollama_status_mapping() {
    assert_eq!(ollama_status(StatusCode::BAD_REQUEST).await, ProviderErrorKind::BadRequest);
    assert_eq!(ollama_status(StatusCode::UNAUTHORIZED).await, ProviderErrorKind::Unauthorized);
    assert_eq!(
        ollama_status(StatusCode::TOO_MANY_REQUESTS).await,
        ProviderErrorKind::RateLimited
    );
    assert_eq!(
        ollama_status(StatusCode::SERVICE_UNAVAILABLE).await,
        ProviderErrorKind::Unavailable
    );
    assert_eq!(ollama_status(StatusCode::GATEWAY_TIMEOUT).await, ProviderErrorKind::Timeout);
}

#[tokio::test]
async fn test_ollama_unexpected_status_keeps_body() {
    let base = spawn(Router::new().route(
        "/api/chat",
        post(|| async { (StatusCode::IM_A_TEAPOT, "short and stout") }),
    ))
    .await;

    let err = ollama(&base).generate(&request()).await.unwrap_err();
    assert!(matches!(err.kind, ProviderErrorKind::Other(_)));
    assert_eq!(err.message.as_deref(), Some("short and stout"));
}

#[tokio::test]
async fn test_ollama_timeout() {
    let base = spawn(Router::new().route(
        "/api/chat",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({ "message": { "content": "too late" } }))
        }),
    ))
    .await;

    let provider = OllamaProvider::new(&base, "test-model", Duration::from_millis(100)).unwrap();
    let err = provider.generate(&request()).await.unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::Timeout);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_ollama_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = ollama(&format!("http://{addr}"))
        .generate(&request())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::Unavailable);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_ollama_malformed_body() {
    let base = spawn(Router::new().route("/api/chat", post(|| async { "not json" }))).await;

    let err = ollama(&base).generate(&request()).await.unwrap_err();
    assert!(matches!(err.kind, ProviderErrorKind::Other(_)));
    assert!(!err.is_retryable());
}

// ── LM Studio ──────────────────────────────────────────────────

#[tokio::test]
async fn test_lmstudio_generate() {
    let base = spawn(Router::new().route(
        "/v1/chat/completions",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            assert_eq!(
                headers.get("authorization").and_then(|v| v.to_str().ok()),
                Some("Bearer lm-studio")
            );
            assert_eq!(body["messages"][0]["role"], "system");
            assert_eq!(body["messages"][1]["role"], "user");
            Json(json!({
                "id": "chatcmpl-1",
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": "Hmm, a customer." },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
            }))
        }),
    ))
    .await;

    let provider = LmStudioProvider::new(&base, "local-model", None, Duration::from_secs(5)).unwrap();
    let resp = provider.generate(&request()).await.unwrap();
    assert_eq!(resp.text, "Hmm, a customer.");
    assert!(resp.tool_uses.is_empty());
}

#[tokio::test]
async fn test_lmstudio_generate_with_tools() {
    let base = spawn(Router::new().route(
        "/v1/chat/completions",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["tools"][0]["type"], "function");
            Json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [
                            { "id": "c1", "type": "function",
                              "function": { "name": "speak", "arguments": "{\"message\":\"Hello\"}" } },
                            { "id": "c2", "type": "function",
                              "function": { "name": "bad", "arguments": "{oops" } }
                        ]
                    },
                    "finish_reason": "tool_calls"
                }]
            }))
        }),
    ))
    .await;

    let provider =
        LmStudioProvider::new(&base, "local-model", Some("key".into()), Duration::from_secs(5)).unwrap();
    let resp = provider
        .generate(&request().with_tools(vec![ToolDeclaration::new("speak", "Say something")]))
        .await
        .unwrap();

    assert_eq!(resp.text, "");
    assert_eq!(resp.tool_uses.len(), 1);
    assert_eq!(resp.tool_uses[0].args["message"], "Hello");
}

#[tokio::test]
async fn test_lmstudio_generate_error() {
    let base = spawn(Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
    ))
    .await;

    let provider = LmStudioProvider::new(&base, "local-model", None, Duration::from_secs(5)).unwrap();
    let err = provider.generate(&request()).await.unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::Unavailable);
    assert_eq!(err.provider, "lmstudio");
}

#[tokio::test]
async fn test_lmstudio_empty_choices() {
    let base = spawn(Router::new().route(
        "/v1/chat/completions",
        post(|| async { Json(json!({ "choices": [] })) }),
    ))
    .await;

    let provider = LmStudioProvider::new(&base, "local-model", None, Duration::from_secs(5)).unwrap();
    let err = provider.generate(&request()).await.unwrap_err();
    assert!(matches!(err.kind, ProviderErrorKind::Other(_)));
}
