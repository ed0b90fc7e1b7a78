//! Regression tests for crewmaster-llm: provider config and HTTP backends.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crewmaster_core::CrewmasterError;
use crewmaster_llm::{LlmBackend, LlmClient, LlmProvider, ModelConfig, RetryPolicy};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(provider: LlmProvider, base_url: &str) -> ModelConfig {
    ModelConfig {
        provider,
        model_id: "test-model".to_string(),
        api_key: "test-key".to_string(),
        api_base_url: Some(base_url.to_string()),
        temperature: 0.0,
        max_tokens: 256,
        timeout_secs: 5,
        retry_policy: RetryPolicy {
            max_retries: 2,
            backoff_base_ms: 0,
            backoff_max_ms: 0,
        },
        fallback_models: Vec::new(),
    }
}

// --- ModelConfig & LlmProvider ---

#[test]
fn test_llm_provider_serialization() {
    assert_eq!(serde_json::to_string(&LlmProvider::Claude).unwrap(), "\"claude\"");
    assert_eq!(serde_json::to_string(&LlmProvider::OpenAi).unwrap(), "\"openai\"");
    assert_eq!(
        serde_json::to_string(&LlmProvider::OpenRouter).unwrap(),
        "\"openrouter\""
    );
    let groq: LlmProvider = serde_json::from_str("\"groq\"").unwrap();
    assert_eq!(groq, LlmProvider::Groq);
}

#[test]
fn test_model_config_base_url_custom_override() {
    let config = config_for(LlmProvider::Claude, "http://localhost:8080");
    assert_eq!(config.base_url(), "http://localhost:8080");
}

#[test]
fn test_model_config_with_fallbacks_from_toml() {
    let config: ModelConfig = toml::from_str(
        r#"
        provider = "claude"
        model_id = "claude-sonnet-4-20250514"
        api_key = "env:ANTHROPIC_API_KEY"

        [[fallback_models]]
        provider = "openai"
        model_id = "gpt-4o-mini"
        api_key = "sk-test"
        "#,
    )
    .unwrap();
    assert_eq!(config.fallback_models.len(), 1);
    assert_eq!(config.fallback_models[0].provider, LlmProvider::OpenAi);
    assert_eq!(config.fallback_models[0].base_url(), "https://api.openai.com");
}

// --- HTTP backends ---

#[tokio::test]
async fn test_claude_backend_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{ "type": "text", "text": "{\"domain\":\"research\"}" }],
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = LlmClient::new(config_for(LlmProvider::Claude, &server.uri())).unwrap();
    let reply = client.complete(Some("system"), "analyze this").await.unwrap();
    assert_eq!(reply, "{\"domain\":\"research\"}");
}

#[tokio::test]
async fn test_openai_backend_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "hello" },
                          "finish_reason": "stop" }]
        })))
        .mount(&server)
        .await;

    let client = LlmClient::new(config_for(LlmProvider::Groq, &server.uri())).unwrap();
    assert_eq!(client.complete(None, "hi").await.unwrap(), "hello");
}

#[tokio::test]
async fn test_server_errors_are_retried_then_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
            "error": { "type": "overloaded_error" }
        })))
        .expect(3)
        .mount(&server)
        .await;

    let client = LlmClient::new(config_for(LlmProvider::Claude, &server.uri())).unwrap();
    let err = client.complete(None, "hi").await.unwrap_err();
    assert!(matches!(err, CrewmasterError::Provider(ref m) if m.contains("503")));
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "message": "invalid api key" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = LlmClient::new(config_for(LlmProvider::OpenAi, &server.uri())).unwrap();
    assert!(client.complete(None, "hi").await.is_err());
}

#[tokio::test]
async fn test_fallback_model_used_after_primary_fails() {
    let primary = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": { "type": "invalid_request_error" }
        })))
        .mount(&primary)
        .await;

    let fallback = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "content": "from fallback" } }]
        })))
        .mount(&fallback)
        .await;

    let mut config = config_for(LlmProvider::Claude, &primary.uri());
    config
        .fallback_models
        .push(config_for(LlmProvider::OpenRouter, &fallback.uri()));

    let client = LlmClient::new(config).unwrap();
    assert_eq!(client.complete(None, "hi").await.unwrap(), "from fallback");
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_secs(3))
                .set_body_json(serde_json::json!({
                    "content": [{ "type": "text", "text": "late" }]
                })),
        )
        .mount(&server)
        .await;

    let mut config = config_for(LlmProvider::Claude, &server.uri());
    config.timeout_secs = 1;
    config.retry_policy.max_retries = 0;

    let client = LlmClient::new(config).unwrap();
    let err = client.complete(None, "hi").await.unwrap_err();
    assert!(matches!(err, CrewmasterError::Provider(ref m) if m.contains("timeout")));
}
