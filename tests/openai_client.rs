// tests/openai_client.rs
use std::time::Duration;

use activity_digest::digest::{LlmClient, OpenAiClient};
use activity_digest::error::BackendError;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, timeout: Duration) -> OpenAiClient {
    OpenAiClient::new("sk-test", server.uri(), "gpt-4o-mini", timeout).unwrap()
}

#[tokio::test]
async fn sends_template_as_system_and_content_as_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "messages": [
                { "role": "system", "content": "SYS" },
                { "role": "user", "content": "raw activity" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "the digest" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = client(&server, Duration::from_secs(5))
        .complete("SYS", "raw activity")
        .await
        .unwrap();
    assert_eq!(out, "the digest");
}

#[tokio::test]
async fn api_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
        })))
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_secs(5))
        .complete("s", "u")
        .await
        .unwrap_err();
    match err {
        BackendError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn blank_completion_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "   " } }]
        })))
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_secs(5))
        .complete("s", "u")
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::EmptyCompletion));
}

#[tokio::test]
async fn slow_backend_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let err = client(&server, Duration::from_millis(200))
        .complete("s", "u")
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Timeout));
}
