pub mod claude;
pub mod openai;

use async_trait::async_trait;
use crewmaster_core::{CrewmasterError, CrewmasterResult};

/// Trait for language-model provider backends.
///
/// A backend turns one prompt into one text completion. Transport, status
/// and decoding failures are all reported as `CrewmasterError::Provider`.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, system_prompt: Option<&str>, prompt: &str)
        -> CrewmasterResult<String>;
}

/// Map a transport failure to a provider error, keeping the retry signal.
pub(crate) fn transport_error(err: reqwest::Error) -> CrewmasterError {
    if err.is_timeout() {
        CrewmasterError::Provider(format!("timeout: {err}"))
    } else if err.is_connect() {
        CrewmasterError::Provider(format!("connection failed: {err}"))
    } else {
        CrewmasterError::Provider(err.to_string())
    }
}
