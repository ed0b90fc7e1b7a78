use super::{transport_error, LlmBackend};
use crate::config::{LlmProvider, ModelConfig};
use async_trait::async_trait;
use crewmaster_core::{CrewmasterError, CrewmasterResult};

/// OpenAI-compatible chat completions backend.
///
/// Serves OpenAI, OpenRouter, Groq and any other provider speaking the
/// same API.
pub struct OpenAiBackend {
    config: ModelConfig,
    api_key: String,
    http: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: ModelConfig) -> CrewmasterResult<Self> {
        let api_key = config.resolved_api_key()?;
        Ok(Self {
            config,
            api_key,
            http: reqwest::Client::new(),
        })
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");

        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request
                .header("HTTP-Referer", "https://github.com/crewmaster/crewmaster")
                .header("X-Title", "Crewmaster")
        } else {
            request
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        prompt: &str,
    ) -> CrewmasterResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());

        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system_prompt {
            messages.push(serde_json::json!({ "role": "system", "content": sys }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": prompt }));

        let body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": messages,
        });

        let resp = self
            .add_provider_headers(self.http.post(&url))
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
                "OpenAI-compatible API error {status}: {resp_body}"
            )));
        }

        parse_openai_response(&resp_body)
    }
}

/// Extract the first choice's message content.
pub fn parse_openai_response(body: &serde_json::Value) -> CrewmasterResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| CrewmasterError::Provider("missing message content in response".into()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_choice() {
        let body = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "{\"domain\":\"research\"}" },
                  "finish_reason": "stop" }
            ]
        });
        assert_eq!(
            parse_openai_response(&body).unwrap(),
            "{\"domain\":\"research\"}"
        );
    }

    #[test]
    fn test_parse_without_choices() {
        assert!(parse_openai_response(&serde_json::json!({ "choices": [] })).is_err());
    }
}
