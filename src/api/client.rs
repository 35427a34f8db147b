//! Typed client for the chat backend

use super::correlation::CorrelationTracker;
use super::endpoints::{ChatQuery, Endpoints};
use super::executor::RequestExecutor;
use super::headers::HeaderComposer;
use super::models::{
    Chat, ChatMetadataAndMessages, ChatModeKey, HideChatResponse, LanguageType, Message,
    MessageFeedback, MessageFeedbackRequest, SendFeedbackResponse, StreamAnswerRequest,
    StreamAnswerResult, User, UserSettings,
};
use super::session::SessionToken;
use super::streaming::StreamingClient;
use super::telemetry::{TelemetrySink, TracingTelemetry};
use super::ApiError;
use crate::config::{Config, ConfigError};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;

/// All backend operations behind one handle.
///
/// Cloning is cheap; clones share the HTTP connection pool and the
/// correlation-id slot.
#[derive(Clone)]
pub struct ChatApiClient {
    executor: RequestExecutor,
    streaming: StreamingClient,
    endpoints: Endpoints,
}

impl ChatApiClient {
    pub fn new(
        endpoints: Endpoints,
        headers: HeaderComposer,
        correlation: CorrelationTracker,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self::with_http_client(Client::new(), endpoints, headers, correlation, telemetry)
    }

    pub fn with_http_client(
        client: Client,
        endpoints: Endpoints,
        headers: HeaderComposer,
        correlation: CorrelationTracker,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        let executor = RequestExecutor::new(client.clone(), headers, correlation);
        let streaming = StreamingClient::new(client, executor.clone(), endpoints.clone(), telemetry);
        Self {
            executor,
            streaming,
            endpoints,
        }
    }

    /// Build a client from configuration, logging telemetry through tracing
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let endpoints = config.endpoints()?;
        let api_key = config.api.api_key.clone().unwrap_or_default();
        let headers = HeaderComposer::new(config.auth_provider(), api_key);
        let correlation = CorrelationTracker::new(config.correlation.missing_header);

        // The overall request timeout would also cap long streams, so the
        // streaming client gets its own pool without it.
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let request_client = builder
            .build()
            .map_err(|e| ConfigError::Invalid(format!("HTTP client: {}", e)))?;

        let executor = RequestExecutor::new(request_client, headers, correlation);
        let streaming = StreamingClient::new(
            Client::new(),
            executor.clone(),
            endpoints.clone(),
            Arc::new(TracingTelemetry),
        )
        .with_read_timeout(config.stream_read_timeout());

        Ok(Self {
            executor,
            streaming,
            endpoints,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Correlation id of the most recent response
    pub fn correlation_id(&self) -> String {
        self.executor.correlation().current()
    }

    pub async fn health(&self) -> Result<Value, ApiError> {
        self.executor
            .post::<Value, ()>(self.endpoints.health(), None)
            .await
    }

    /// Create the current user on first call, fetch it afterwards
    pub async fn upsert_user(&self) -> Result<User, ApiError> {
        self.executor
            .post::<User, ()>(self.endpoints.user_upsert(), None)
            .await
    }

    /// Accept the terms of use at `version`
    pub async fn accept_terms(&self, version: &str) -> Result<String, ApiError> {
        self.executor
            .post::<String, ()>(self.endpoints.terms_of_use(version), None)
            .await
    }

    pub async fn user_settings(&self) -> Result<UserSettings, ApiError> {
        self.executor.get(self.endpoints.user_settings()).await
    }

    pub async fn update_user_settings(
        &self,
        settings: &UserSettings,
    ) -> Result<UserSettings, ApiError> {
        self.executor
            .post(self.endpoints.user_settings(), Some(settings))
            .await
    }

    pub async fn set_language(
        &self,
        language: Option<&LanguageType>,
    ) -> Result<LanguageType, ApiError> {
        self.executor.post(self.endpoints.language(), language).await
    }

    /// Previous chats (metadata only) for a mode
    pub async fn chats(&self, mode: Option<ChatModeKey>) -> Result<Vec<Chat>, ApiError> {
        self.executor.get(self.endpoints.chats_by_mode(mode)).await
    }

    /// Messages of a chat without its metadata
    pub async fn chat_messages(&self, chat_id: &str) -> Result<Vec<Message>, ApiError> {
        self.executor
            .get(self.endpoints.chat_by_id(chat_id, ChatQuery::messages_only()))
            .await
    }

    pub async fn chat_with_messages(
        &self,
        chat_id: &str,
    ) -> Result<ChatMetadataAndMessages, ApiError> {
        self.executor
            .get(self.endpoints.chat_by_id(chat_id, ChatQuery::chat_and_messages()))
            .await
    }

    pub async fn send_feedback(
        &self,
        message_id: &str,
        feedback: MessageFeedback,
        comment: Option<String>,
    ) -> Result<SendFeedbackResponse, ApiError> {
        let payload = MessageFeedbackRequest {
            message_id: message_id.to_string(),
            feedback,
            comment_feedback: comment,
        };
        self.executor
            .patch(self.endpoints.message_feedback(), Some(&payload))
            .await
    }

    pub async fn hide_chat(&self, chat_id: &str) -> Result<HideChatResponse, ApiError> {
        self.executor
            .patch::<HideChatResponse, ()>(self.endpoints.chat_hide(chat_id), None)
            .await
    }

    /// See [`StreamingClient::stream_answer`]
    pub async fn stream_answer<F>(
        &self,
        request: &StreamAnswerRequest,
        session: &SessionToken,
        on_chunk: F,
    ) -> Result<StreamAnswerResult, ApiError>
    where
        F: FnMut(&str, Option<&str>),
    {
        self.streaming.stream_answer(request, session, on_chunk).await
    }

    /// See [`StreamingClient::stop_stream`]
    pub async fn stop_stream(&self, chat_id: &str) -> Result<Option<String>, ApiError> {
        self.streaming.stop_stream(chat_id).await
    }
}
