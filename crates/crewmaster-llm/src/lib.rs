//! Language-model access for model-backed task analysis.
//!
//! Provider backends (Claude, OpenAI-compatible), retry with exponential
//! backoff and per-attempt timeouts, and failover across fallback models.

pub mod backends;
pub mod client;
pub mod config;
pub mod failover;

pub use backends::LlmBackend;
pub use client::LlmClient;
pub use config::{LlmProvider, ModelConfig};
pub use failover::{compute_backoff, is_retryable, FailoverBackend, RetryPolicy};
