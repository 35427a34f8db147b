//! chat-stream - Streaming answer client for the chat backend
//!
//! This library talks to one chat backend: user, chat and message endpoints
//! through a generic request executor, and incrementally generated answers
//! through a streaming client that can be cancelled mid-stream.
//!
//! ## Key Features
//!
//! - **Streaming Answers**: UTF-8 text chunks delivered to a callback as they arrive
//! - **Session Cancellation**: a caller-owned [`SessionToken`] ends a stale stream between reads
//! - **Stop Command**: ask the backend to stop generating for a conversation
//! - **Correlation Tracking**: the latest `x-correlation-id` from any response

pub mod api;
pub mod config;

pub use api::{
    ApiError, AuthTokenProvider, ChatApiClient, ChatModeKey, CorrelationPolicy,
    CorrelationTracker, SessionToken, StreamAnswerRequest, StreamAnswerResult, StreamOutcome,
    StreamingClient, TransportError,
};
pub use config::{Config, ConfigBuilder, ConfigError};
