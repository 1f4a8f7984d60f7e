//! Configuration types.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::openai::DEFAULT_BASE_URL;
use crate::llm::{LlmBackend, LlmConfig};

/// Model used when `OPENAI_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Service configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Inference provider settings.
    pub llm: LlmConfig,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Request body limit for uploads.
    pub max_upload_bytes: usize,
    /// Directory for the rolling log file, if file logging is enabled.
    pub log_dir: Option<PathBuf>,
}

impl ServiceConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENAI_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let model = lookup("OPENAI_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base_url = lookup("OPENAI_BASE_URL")
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let host = lookup("EMAIL_TRIAGE_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port: u16 = lookup("EMAIL_TRIAGE_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let max_upload_bytes: usize = lookup("EMAIL_TRIAGE_MAX_UPLOAD_BYTES")
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let log_dir = lookup("EMAIL_TRIAGE_LOG_DIR")
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            llm: LlmConfig {
                backend: LlmBackend::OpenAi,
                api_key: SecretString::from(api_key),
                model,
                base_url,
            },
            host,
            port,
            max_upload_bytes,
            log_dir,
        })
    }

    /// `host:port` to bind; hostnames are resolved by the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
