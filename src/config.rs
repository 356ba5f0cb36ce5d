//! Configuration management.
//!
//! All configuration comes from environment variables:
//! - `GITHUB_TOKEN` - Required. Token for the remote file host.
//! - `GITHUB_OWNER` - Required. Account owning the project repositories.
//! - `GITHUB_API_BASE` - Optional. Defaults to `https://api.github.com`.
//! - `MODEL_API_KEY` - Required. Key for the generative-model endpoint.
//! - `MODEL_API_BASE` - Optional. Defaults to `https://openrouter.ai/api/v1`.
//! - `DEFAULT_MODEL` - Optional. Defaults to `google/gemini-2.0-flash-001`.
//! - `DEPLOY_ENDPOINT` - Optional. Webhook that triggers deployments.
//! - `HOST` / `PORT` - Optional. Server bind address. Defaults `127.0.0.1:3000`.
//! - `REQUEST_TIMEOUT_SECS` - Optional. Outbound call timeout. Defaults to `30`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Service configuration. Cheap to clone; handlers clone it per request.
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote file host token
    pub github_token: String,

    /// Account that owns the managed repositories
    pub github_owner: String,

    /// Remote file host API base URL
    pub github_api_base: String,

    /// Generative-model API key
    pub model_api_key: String,

    /// Generative-model API base URL (OpenAI-compatible)
    pub model_api_base: String,

    /// Default model identifier
    pub model: String,

    /// Deployment webhook endpoint, if deployments are wired up
    pub deploy_endpoint: Option<String>,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Timeout for outbound collaborator calls, in seconds
    pub request_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` when a required variable is
    /// unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let github_token = require("GITHUB_TOKEN")?;
        let github_owner = require("GITHUB_OWNER")?;
        let model_api_key = require("MODEL_API_KEY")?;

        let github_api_base = std::env::var("GITHUB_API_BASE")
            .unwrap_or_else(|_| "https://api.github.com".to_string());
        let model_api_base = std::env::var("MODEL_API_BASE")
            .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string());
        let model = std::env::var("DEFAULT_MODEL")
            .unwrap_or_else(|_| "google/gemini-2.0-flash-001".to_string());
        let deploy_endpoint = std::env::var("DEPLOY_ENDPOINT").ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{e}")))?;
        let request_timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".to_string(), format!("{e}"))
            })?;

        Ok(Self {
            github_token,
            github_owner,
            github_api_base,
            model_api_key,
            model_api_base,
            model,
            deploy_endpoint,
            host,
            port,
            request_timeout_secs,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(github_token: String, github_owner: String, model_api_key: String) -> Self {
        Self {
            github_token,
            github_owner,
            github_api_base: "https://api.github.com".to_string(),
            model_api_key,
            model_api_base: "https://openrouter.ai/api/v1".to_string(),
            model: "google/gemini-2.0-flash-001".to_string(),
            deploy_endpoint: None,
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout_secs: 30,
        }
    }
}

fn require(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}
