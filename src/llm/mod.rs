//! LLM integration for the triage service.
//!
//! The classifier only sees the `LlmProvider` trait; the concrete backend is
//! chosen once at startup by `create_provider`.

pub mod openai;
pub mod provider;

pub use openai::OpenAiProvider;
pub use provider::*;

use std::sync::Arc;

use crate::error::LlmError;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAi,
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
    pub base_url: String,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.backend {
        LlmBackend::OpenAi => create_openai_provider(config),
    }
}

fn create_openai_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
        return Err(LlmError::RequestFailed {
            provider: "openai".to_string(),
            reason: format!("base URL must be http(s): {}", config.base_url),
        });
    }
    tracing::info!("Using OpenAI (model: {})", config.model);
    Ok(Arc::new(OpenAiProvider::new(
        config.api_key.clone(),
        &config.model,
        &config.base_url,
    )))
}
