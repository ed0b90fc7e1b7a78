use crate::failover::RetryPolicy;
use crewmaster_core::{CrewmasterError, CrewmasterResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Claude,
    OpenAi,
    OpenRouter,
    /// Groq cloud inference, OpenAI-compatible.
    Groq,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: LlmProvider,
    pub model_id: String,
    /// Literal key, or `env:NAME` to read it from the environment.
    pub api_key: String,
    pub api_base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-attempt timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_timeout_secs() -> u64 {
    30
}

impl ModelConfig {
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url
        } else {
            match self.provider {
                LlmProvider::Claude => "https://api.anthropic.com",
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::OpenRouter => "https://openrouter.ai/api",
                LlmProvider::Groq => "https://api.groq.com/openai",
            }
        }
    }

    /// The API key with any `env:` indirection resolved.
    pub fn resolved_api_key(&self) -> CrewmasterResult<String> {
        match self.api_key.strip_prefix("env:") {
            Some(var) => std::env::var(var).map_err(|_| {
                CrewmasterError::Config(format!("environment variable '{var}' is not set"))
            }),
            None => Ok(self.api_key.clone()),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_defaults() {
        let config: ModelConfig = toml::from_str(
            r#"
            provider = "claude"
            model_id = "claude-sonnet-4-20250514"
            api_key = "test-key"
            "#,
        )
        .unwrap();
        assert_eq!(config.provider, LlmProvider::Claude);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.retry_policy.max_retries, 3);
        assert!(config.fallback_models.is_empty());
        assert_eq!(config.base_url(), "https://api.anthropic.com");
    }

    #[test]
    fn test_explicit_values() {
        let config: ModelConfig = toml::from_str(
            r#"
            provider = "groq"
            model_id = "llama-3.3-70b"
            api_key = "k"
            timeout_secs = 5
            [retry_policy]
            max_retries = 1
            backoff_base_ms = 10
            backoff_max_ms = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.retry_policy.max_retries, 1);
        assert_eq!(config.base_url(), "https://api.groq.com/openai");
    }

    #[test]
    fn test_env_api_key_missing() {
        let config = ModelConfig {
            provider: LlmProvider::OpenAi,
            model_id: "gpt-4o-mini".into(),
            api_key: "env:CREWMASTER_TEST_KEY_THAT_IS_NOT_SET".into(),
            api_base_url: None,
            temperature: 0.2,
            max_tokens: 512,
            timeout_secs: 30,
            retry_policy: RetryPolicy::default(),
            fallback_models: Vec::new(),
        };
        assert!(matches!(
            config.resolved_api_key(),
            Err(CrewmasterError::Config(_))
        ));
    }
}
