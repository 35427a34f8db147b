//! Bearer token sources
//!
//! Token acquisition itself lives outside this crate; the client only asks a
//! provider for the current token before each request.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No auth token available from {0}")]
    Missing(String),

    #[error("Auth provider failed: {0}")]
    Provider(String),
}

/// Source of the bearer token sent with every request
#[async_trait]
pub trait AuthTokenProvider: Send + Sync {
    /// Return the current bearer token
    async fn token(&self) -> Result<String, AuthError>;
}

/// Fixed token, e.g. from the config file
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AuthTokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String, AuthError> {
        if self.token.is_empty() {
            return Err(AuthError::Missing("static configuration".to_string()));
        }
        Ok(self.token.clone())
    }
}

/// Reads the token from an environment variable on every call, so a token
/// refreshed by an outside process is picked up without restarting.
#[derive(Debug, Clone)]
pub struct EnvTokenProvider {
    var: String,
}

impl EnvTokenProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl AuthTokenProvider for EnvTokenProvider {
    async fn token(&self) -> Result<String, AuthError> {
        match std::env::var(&self.var) {
            Ok(token) if !token.is_empty() => Ok(token),
            _ => Err(AuthError::Missing(self.var.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let provider = StaticTokenProvider::new("abc");
        assert_eq!(provider.token().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_empty_static_token_is_missing() {
        let provider = StaticTokenProvider::new("");
        assert!(matches!(provider.token().await, Err(AuthError::Missing(_))));
    }

    #[tokio::test]
    async fn test_env_token_missing() {
        let provider = EnvTokenProvider::new("CHAT_STREAM_TEST_UNSET_TOKEN_VAR");
        match provider.token().await {
            Err(AuthError::Missing(var)) => assert_eq!(var, "CHAT_STREAM_TEST_UNSET_TOKEN_VAR"),
            other => panic!("Expected Missing, got {:?}", other),
        }
    }
}
