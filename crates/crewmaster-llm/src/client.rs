use crate::backends::claude::ClaudeBackend;
use crate::backends::openai::OpenAiBackend;
use crate::backends::LlmBackend;
use crate::config::{LlmProvider, ModelConfig};
use crate::failover::FailoverBackend;
use async_trait::async_trait;
use crewmaster_core::CrewmasterResult;
use tracing::debug;

/// Language-model client built from a [`ModelConfig`].
///
/// The primary model is tried first, then each entry of `fallback_models`,
/// all under the primary's retry policy and per-attempt timeout.
pub struct LlmClient {
    backend: Box<dyn LlmBackend>,
}

impl LlmClient {
    pub fn new(config: ModelConfig) -> CrewmasterResult<Self> {
        let policy = config.retry_policy.clone();
        let timeout = config.timeout();

        let mut models = vec![config.clone()];
        models.extend(config.fallback_models.iter().cloned());

        let backends = models
            .into_iter()
            .map(backend_for)
            .collect::<CrewmasterResult<Vec<_>>>()?;
        debug!(
            provider = ?config.provider,
            model = %config.model_id,
            backends = backends.len(),
            "Built language-model client"
        );

        Ok(Self {
            backend: Box::new(FailoverBackend::new(backends, policy, timeout)?),
        })
    }

    /// Wrap a pre-built backend.
    pub fn from_backend(backend: Box<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

fn backend_for(config: ModelConfig) -> CrewmasterResult<Box<dyn LlmBackend>> {
    Ok(match config.provider {
        LlmProvider::Claude => Box::new(ClaudeBackend::new(config)?),
        LlmProvider::OpenAi | LlmProvider::OpenRouter | LlmProvider::Groq => {
            Box::new(OpenAiBackend::new(config)?)
        }
    })
}

#[async_trait]
impl LlmBackend for LlmClient {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        prompt: &str,
    ) -> CrewmasterResult<String> {
        self.backend.complete(system_prompt, prompt).await
    }
}
