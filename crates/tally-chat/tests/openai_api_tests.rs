//! HTTP-level tests for the OpenAI provider against a wiremock server.

use std::time::Duration;

use tally_chat::config::OpenAiConfig;
use tally_chat::error::ChatError;
use tally_chat::openai_api::OpenAiProvider;
use tally_chat::provider::{ChatProvider, CompletionRequest, FinishReason};
use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

fn provider_for(base_url: String) -> OpenAiProvider {
    let config = OpenAiConfig {
        api_base_url: base_url,
        timeout_secs: 5,
        ..Default::default()
    };
    OpenAiProvider::with_api_key(config, "test-key").unwrap()
}

fn completion_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "model": "gpt-4",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 8, "completion_tokens": 2, "total_tokens": 10}
    })
}

#[tokio::test]
async fn test_completion_success() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1/chat/completions"))
        .and(matchers::header("authorization", "Bearer test-key"))
        .and(matchers::body_partial_json(serde_json::json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "Hello"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Hi there")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(server.uri());
    let response = provider
        .complete(&CompletionRequest::prompt("gpt-4", "Hello"))
        .await
        .unwrap();

    assert_eq!(response.text, "Hi there");
    assert_eq!(response.finish_reason, FinishReason::Stop);
    let usage = response.usage.unwrap();
    assert_eq!(usage.input_tokens, 8);
    assert_eq!(usage.output_tokens, 2);
}

#[tokio::test]
async fn test_base_url_with_v1_suffix() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(format!("{}/v1", server.uri()));
    let response = provider
        .complete(&CompletionRequest::prompt("gpt-4", "ping"))
        .await
        .unwrap();
    assert_eq!(response.text, "ok");
}

#[tokio::test]
async fn test_sampling_options_are_sent() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::body_partial_json(serde_json::json!({
            "temperature": 0.25,
            "max_tokens": 64
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let config = OpenAiConfig {
        api_base_url: server.uri(),
        temperature: Some(0.25),
        max_tokens: Some(64),
        ..Default::default()
    };
    let provider = OpenAiProvider::with_api_key(config, "test-key").unwrap();
    provider
        .complete(&CompletionRequest::prompt("gpt-4", "ping"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_length_finish_reason() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "choices": [{
            "message": {"role": "assistant", "content": "cut sh"},
            "finish_reason": "length"
        }]
    });
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let response = provider_for(server.uri())
        .complete(&CompletionRequest::prompt("gpt-4", "long"))
        .await
        .unwrap();
    assert_eq!(response.finish_reason, FinishReason::MaxTokens);
    assert!(response.usage.is_none());
}

#[tokio::test]
async fn test_unauthorized_is_permanent_error() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {
                "message": "Incorrect API key provided",
                "type": "invalid_request_error"
            }
        })))
        .mount(&server)
        .await;

    let err = provider_for(server.uri())
        .complete(&CompletionRequest::prompt("gpt-4", "Hello"))
        .await
        .unwrap_err();

    match &err {
        ChatError::ApiError(msg) => {
            assert!(msg.contains("401"));
            assert!(msg.contains("Incorrect API key provided"));
        }
        other => panic!("Expected ApiError, got {:?}", other),
    }
    assert!(!err.is_retryable());
    assert_eq!(err.suggested_action(), "Check your API key configuration.");
}

#[tokio::test]
async fn test_rate_limit_reads_retry_after() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_json(serde_json::json!({"error": {"message": "Rate limit reached"}})),
        )
        .mount(&server)
        .await;

    let err = provider_for(server.uri())
        .complete(&CompletionRequest::prompt("gpt-4", "Hello"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ChatError::ApiRateLimited {
            retry_after_secs: Some(7)
        }
    ));
    assert!(err.friendly_message().contains("7 seconds"));
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = provider_for(server.uri())
        .complete(&CompletionRequest::prompt("gpt-4", "Hello"))
        .await
        .unwrap_err();

    match &err {
        ChatError::ApiTransientError(msg) => assert!(msg.contains("upstream unavailable")),
        other => panic!("Expected ApiTransientError, got {:?}", other),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_empty_choices() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
        .mount(&server)
        .await;

    let err = provider_for(server.uri())
        .complete(&CompletionRequest::prompt("gpt-4", "Hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::EmptyResponse));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("late"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = OpenAiConfig {
        api_base_url: server.uri(),
        timeout_secs: 1,
        ..Default::default()
    };
    let provider = OpenAiProvider::with_api_key(config, "test-key").unwrap();
    let err = provider
        .complete(&CompletionRequest::prompt("gpt-4", "Hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::Timeout(1, _)), "got {:?}", err);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_connection_refused() {
    // Nothing listens on port 1
    let err = provider_for("http://127.0.0.1:1".to_string())
        .complete(&CompletionRequest::prompt("gpt-4", "Hello"))
        .await
        .unwrap_err();

    assert!(
        matches!(err, ChatError::ConnectionFailed(_) | ChatError::HttpError(_)),
        "got {:?}",
        err
    );
}
