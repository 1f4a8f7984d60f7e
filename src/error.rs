//! Error types for the email triage service.

use std::time::Duration;

/// Configuration-related errors. Any of these aborts startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inference provider errors.
///
/// These never reach the HTTP caller: the classifier absorbs every variant
/// into the heuristic fallback.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Provider {provider} rate limited")]
    RateLimited { provider: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Client input errors, reported to the caller as HTTP 400.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("provide a file (.txt/.pdf) or text field")]
    MissingInput,

    #[error("unsupported extension: {0}. Use .txt or .pdf")]
    UnsupportedExtension(String),

    #[error("empty content")]
    EmptyContent,

    #[error("empty content after cleaning")]
    EmptyAfterCleaning,

    #[error("invalid upload: {0}")]
    InvalidUpload(String),
}
