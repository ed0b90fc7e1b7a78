use super::{transport_error, LlmBackend};
use crate::config::ModelConfig;
use async_trait::async_trait;
use crewmaster_core::{CrewmasterError, CrewmasterResult};

/// Claude (Anthropic) messages API backend.
pub struct ClaudeBackend {
    config: ModelConfig,
    api_key: String,
    http: reqwest::Client,
}

impl ClaudeBackend {
    pub fn new(config: ModelConfig) -> CrewmasterResult<Self> {
        let api_key = config.resolved_api_key()?;
        Ok(Self {
            config,
            api_key,
            http: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl LlmBackend for ClaudeBackend {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        prompt: &str,
    ) -> CrewmasterResult<String> {
        let url = format!("{}/v1/messages", self.config.base_url());

        let mut body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(sys) = system_prompt {
            body["system"] = serde_json::json!(sys);
        }

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CrewmasterError::Provider(format!("{status}: {e}")))?;

        if !status.is_success() {
            return Err(CrewmasterError::Provider(format!(
                "Claude API error {status}: {resp_body}"
            )));
        }

        parse_claude_response(&resp_body)
    }
}

/// Join the text blocks of a messages API reply.
pub fn parse_claude_response(body: &serde_json::Value) -> CrewmasterResult<String> {
    let content = body["content"]
        .as_array()
        .ok_or_else(|| CrewmasterError::Provider("missing content in Claude response".into()))?;

    let text: Vec<&str> = content
        .iter()
        .filter(|block| block["type"].as_str() == Some("text"))
        .filter_map(|block| block["text"].as_str())
        .collect();

    if text.is_empty() {
        return Err(CrewmasterError::Provider(
            "Claude response contained no text".into(),
        ));
    }
    Ok(text.join("\n"))
}
