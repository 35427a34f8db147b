//! Client layer for the chat backend
//!
//! Non-streaming calls go through [`RequestExecutor`]; answers are streamed
//! through [`StreamingClient`]. Both share header composition and the
//! correlation-id slot.

mod auth;
mod client;
mod correlation;
mod decoder;
mod endpoints;
mod executor;
mod headers;
mod models;
mod session;
mod streaming;
mod telemetry;

pub use auth::{AuthError, AuthTokenProvider, EnvTokenProvider, StaticTokenProvider};
pub use client::ChatApiClient;
pub use correlation::{CorrelationPolicy, CorrelationTracker, CORRELATION_ID_HEADER};
pub use decoder::Utf8Decoder;
pub use endpoints::{ChatQuery, EndpointError, Endpoints};
pub use executor::RequestExecutor;
pub use headers::{HeaderComposer, HeaderError};
pub use models::{
    Chat, ChatMetadataAndMessages, ChatModeKey, HideChatResponse, LanguageType, Message,
    MessageFeedback, MessageFeedbackRequest, MessageRole, SendFeedbackResponse, Source,
    StreamAnswerBody, StreamAnswerRequest, StreamAnswerResult, StreamOutcome, User,
    UserSettings,
};
pub use session::SessionToken;
pub use streaming::{StreamingClient, CHAT_ID_HEADER};
pub use telemetry::{TelemetryEvent, TelemetrySink, TracingTelemetry};

use reqwest::header::InvalidHeaderValue;
use reqwest::{Method, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the client layer.
///
/// Cancellation through a [`SessionToken`] is not an error: it ends a stream
/// with a partial [`StreamAnswerResult`].
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("An error occurred during the request: {source}")]
    RequestFailed {
        status: Option<StatusCode>,
        #[source]
        source: TransportError,
    },

    #[error("An error occurred while streaming data: {source}")]
    StreamFailed {
        status: Option<StatusCode>,
        #[source]
        source: TransportError,
    },

    #[error("Auth token unavailable: {0}")]
    AuthTokenUnavailable(#[from] AuthError),
}

impl ApiError {
    pub(crate) fn request(source: impl Into<TransportError>) -> Self {
        let source = source.into();
        ApiError::RequestFailed {
            status: source.status(),
            source,
        }
    }

    pub(crate) fn stream(source: impl Into<TransportError>) -> Self {
        let source = source.into();
        ApiError::StreamFailed {
            status: source.status(),
            source,
        }
    }

    /// HTTP status attached to the failure, if the server answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::RequestFailed { status, .. } | ApiError::StreamFailed { status, .. } => {
                *status
            }
            ApiError::AuthTokenUnavailable(_) => None,
        }
    }
}

/// Underlying cause of a failed request or stream
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP status {0}")]
    Status(StatusCode),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),

    #[error("Unsupported method: {0}")]
    UnsupportedMethod(Method),

    #[error("No data received for {0:?}")]
    ReadTimeout(Duration),

    #[error("User prompt is empty")]
    EmptyPrompt,
}

impl TransportError {
    fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::Status(status) => Some(*status),
            _ => None,
        }
    }
}
