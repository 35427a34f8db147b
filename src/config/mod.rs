//! Configuration management for chat-stream
//!
//! Supports configuration via:
//! 1. Config file (~/.config/chat-stream/config.toml)
//! 2. Environment variables (CHAT_API_URL, CHAT_API_KEY; the bearer token is
//!    read from CHAT_AUTH_TOKEN at request time unless auth.token is set)
//! 3. The CLI `--config` flag (alternate file location)

use crate::api::{
    AuthTokenProvider, CorrelationPolicy, Endpoints, EnvTokenProvider, StaticTokenProvider,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default environment variable holding the bearer token
pub const DEFAULT_TOKEN_ENV: &str = "CHAT_AUTH_TOKEN";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend location and credentials
    pub api: ApiSettings,

    /// Bearer token source
    pub auth: AuthSettings,

    /// Streaming behaviour
    pub stream: StreamSettings,

    /// Correlation id tracking
    pub correlation: CorrelationSettings,
}

/// Backend API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL of the backend (can also use CHAT_API_URL env var)
    pub base_url: String,

    /// API key sent in the `apikey` header (can also use CHAT_API_KEY env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Overall timeout for non-streaming requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_key: None,
            request_timeout_secs: None,
        }
    }
}

/// Auth token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Fixed bearer token; when unset the token is read from `token_env`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Environment variable read before every request
    pub token_env: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token: None,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
        }
    }
}

/// Streaming settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Fail a stream when no fragment arrives for this long (off when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_timeout_secs: Option<u64>,
}

/// Correlation id settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationSettings {
    /// "clear" resets the tracked id when a response has none, "keep" retains it
    pub missing_header: CorrelationPolicy,
}

impl Config {
    /// Get default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chat-stream")
            .join("config.toml")
    }

    /// Load config from default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path())
    }

    /// Load config from specific path
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default().with_env_overrides());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;

        Ok(config.with_env_overrides())
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("CHAT_API_URL") {
            self.api.base_url = url;
        }
        if let Ok(key) = std::env::var("CHAT_API_KEY") {
            self.api.api_key = Some(key);
        }

        self
    }

    /// Save config to default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path())
    }

    /// Save config to specific path
    pub fn save_to(&self, path: PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoints()?;

        if self.api.api_key.as_deref().unwrap_or("").is_empty() {
            return Err(ConfigError::MissingRequired(
                "api.api_key (or CHAT_API_KEY)".to_string(),
            ));
        }

        if self.auth.token.is_none() && self.auth.token_env.is_empty() {
            return Err(ConfigError::MissingRequired(
                "auth.token or auth.token_env".to_string(),
            ));
        }

        Ok(())
    }

    pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
        Endpoints::new(&self.api.base_url).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Token provider described by the auth section
    pub fn auth_provider(&self) -> Arc<dyn AuthTokenProvider> {
        match &self.auth.token {
            Some(token) => Arc::new(StaticTokenProvider::new(token.clone())),
            None => Arc::new(EnvTokenProvider::new(self.auth.token_env.clone())),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.api.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn stream_read_timeout(&self) -> Option<Duration> {
        self.stream.read_timeout_secs.map(Duration::from_secs)
    }

    /// Generate example config content
    pub fn example() -> String {
        let example = Config::default();
        toml::to_string_pretty(&example).unwrap_or_default()
    }
}

/// Builder for creating Config programmatically
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api.api_key = Some(key.into());
        self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth.token = Some(token.into());
        self
    }

    pub fn token_env(mut self, var: impl Into<String>) -> Self {
        self.config.auth.token_env = var.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api.request_timeout_secs = Some(secs);
        self
    }

    pub fn stream_read_timeout_secs(mut self, secs: u64) -> Self {
        self.config.stream.read_timeout_secs = Some(secs);
        self
    }

    pub fn correlation_policy(mut self, policy: CorrelationPolicy) -> Self {
        self.config.correlation.missing_header = policy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.auth.token_env, DEFAULT_TOKEN_ENV);
        assert_eq!(config.stream_read_timeout(), None);
        assert_eq!(
            config.correlation.missing_header,
            CorrelationPolicy::ClearOnMissing
        );
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let path = std::env::temp_dir()
            .join(format!("chat-stream-missing-{}", std::process::id()))
            .join("config.toml");

        let config = Config::load_from(path).unwrap();
        assert_eq!(config.auth.token, None);
        assert_eq!(config.auth.token_env, DEFAULT_TOKEN_ENV);
        assert_eq!(config.stream.read_timeout_secs, None);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .base_url("https://chat.example.com/api")
            .api_key("key-1")
            .auth_token("tok")
            .stream_read_timeout_secs(30)
            .correlation_policy(CorrelationPolicy::KeepLastSeen)
            .build();

        assert_eq!(config.api.api_key, Some("key-1".to_string()));
        assert_eq!(config.stream_read_timeout(), Some(Duration::from_secs(30)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_api_key() {
        let config = ConfigBuilder::new().auth_token("tok").build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = ConfigBuilder::new()
            .base_url("not a url")
            .api_key("key-1")
            .build();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config = toml::from_str(
            r#"
            [api]
            base_url = "https://chat.example.com/api"

            [correlation]
            missing_header = "keep"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://chat.example.com/api");
        assert_eq!(config.auth.token_env, DEFAULT_TOKEN_ENV);
        assert_eq!(
            config.correlation.missing_header,
            CorrelationPolicy::KeepLastSeen
        );
    }

    #[test]
    fn test_example_config() {
        let example = Config::example();
        assert!(example.contains("[api]"));
        assert!(example.contains("[correlation]"));
        assert!(example.contains("missing_header = \"clear\""));
    }
}
