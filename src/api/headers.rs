//! Per-request header composition

use super::auth::{AuthError, AuthTokenProvider};
use super::{ApiError, TransportError};
use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::sync::Arc;
use thiserror::Error;

/// Name of the API key header expected by the backend
pub const API_KEY_HEADER: &str = "apikey";

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid header value: {0}")]
    InvalidValue(#[from] InvalidHeaderValue),
}

impl HeaderError {
    /// Map into the request error kind; auth failures pass through unchanged
    pub(crate) fn into_request_error(self) -> ApiError {
        match self {
            HeaderError::Auth(e) => ApiError::AuthTokenUnavailable(e),
            HeaderError::InvalidValue(e) => ApiError::request(TransportError::InvalidHeader(e)),
        }
    }

    /// Map into the stream error kind; auth failures pass through unchanged
    pub(crate) fn into_stream_error(self) -> ApiError {
        match self {
            HeaderError::Auth(e) => ApiError::AuthTokenUnavailable(e),
            HeaderError::InvalidValue(e) => ApiError::stream(TransportError::InvalidHeader(e)),
        }
    }
}

/// Builds the content type, bearer token and API key headers
#[derive(Clone)]
pub struct HeaderComposer {
    auth: Arc<dyn AuthTokenProvider>,
    api_key: String,
}

impl HeaderComposer {
    pub fn new(auth: Arc<dyn AuthTokenProvider>, api_key: impl Into<String>) -> Self {
        Self {
            auth,
            api_key: api_key.into(),
        }
    }

    pub async fn build_headers(&self) -> Result<HeaderMap, HeaderError> {
        let token = self.auth.token().await?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let mut api_key = HeaderValue::from_str(&self.api_key)?;
        api_key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, api_key);

        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StaticTokenProvider;

    #[tokio::test]
    async fn test_headers_contain_all_fields() {
        let composer = HeaderComposer::new(Arc::new(StaticTokenProvider::new("tok")), "key-1");
        let headers = composer.build_headers().await.unwrap();

        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[AUTHORIZATION], "Bearer tok");
        assert_eq!(headers[API_KEY_HEADER], "key-1");
    }

    #[tokio::test]
    async fn test_auth_failure_propagates() {
        let composer = HeaderComposer::new(Arc::new(StaticTokenProvider::new("")), "key-1");
        let err = composer.build_headers().await.unwrap_err();
        assert!(matches!(err, HeaderError::Auth(AuthError::Missing(_))));
        assert!(matches!(
            err.into_request_error(),
            ApiError::AuthTokenUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_illegal_token_is_transport_fault() {
        let composer =
            HeaderComposer::new(Arc::new(StaticTokenProvider::new("bad\ntoken")), "key-1");
        let err = composer.build_headers().await.unwrap_err();
        assert!(matches!(err, HeaderError::InvalidValue(_)));
        assert!(matches!(
            err.into_stream_error(),
            ApiError::StreamFailed { status: None, .. }
        ));
    }
}
