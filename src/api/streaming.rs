//! Streaming answers and the paired stop command
//!
//! The answer arrives as a plain chunked body of UTF-8 text. Each fragment is
//! decoded, appended to the running answer and handed to the caller's
//! callback. Between reads the caller's [`SessionToken`] is compared with the
//! value captured at the start; once it differs the body is dropped, which
//! closes the connection, and the partial answer is returned.
//!
//! The check never interrupts a read that is already waiting. A stalled
//! server therefore holds the stream until the next fragment arrives unless
//! a read timeout is configured.

use super::decoder::Utf8Decoder;
use super::endpoints::Endpoints;
use super::executor::RequestExecutor;
use super::headers::HeaderError;
use super::models::{StreamAnswerRequest, StreamAnswerResult, StreamOutcome};
use super::session::SessionToken;
use super::telemetry::{TelemetryEvent, TelemetrySink};
use super::{ApiError, TransportError};
use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Response header carrying the id of a newly created conversation
pub const CHAT_ID_HEADER: &str = "chat_id";

/// Client for the stream start/stop endpoints
#[derive(Clone)]
pub struct StreamingClient {
    client: Client,
    executor: RequestExecutor,
    endpoints: Endpoints,
    telemetry: Arc<dyn TelemetrySink>,
    read_timeout: Option<Duration>,
}

impl StreamingClient {
    pub fn new(
        client: Client,
        executor: RequestExecutor,
        endpoints: Endpoints,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            client,
            executor,
            endpoints,
            telemetry,
            read_timeout: None,
        }
    }

    /// Fail the stream when no fragment arrives within `limit`
    pub fn with_read_timeout(mut self, limit: Option<Duration>) -> Self {
        self.read_timeout = limit;
        self
    }

    /// Stream an answer, calling `on_chunk(text, new_chat_id)` per fragment.
    ///
    /// Returns a [`StreamOutcome::Completed`] result when the body ends and a
    /// [`StreamOutcome::Cancelled`] one when `session` moved on mid-stream.
    /// Transport faults and error statuses yield [`ApiError::StreamFailed`]
    /// and no partial answer. An empty prompt is rejected before anything is
    /// sent.
    pub async fn stream_answer<F>(
        &self,
        request: &StreamAnswerRequest,
        session: &SessionToken,
        mut on_chunk: F,
    ) -> Result<StreamAnswerResult, ApiError>
    where
        F: FnMut(&str, Option<&str>),
    {
        if request.user_prompt.is_empty() {
            return Err(ApiError::stream(TransportError::EmptyPrompt));
        }

        let captured = session.current();
        let url = self.endpoints.stream_start();

        let headers = self
            .executor
            .headers()
            .build_headers()
            .await
            .map_err(HeaderError::into_stream_error)?;
        let body = serde_json::to_vec(&request.to_body()).map_err(ApiError::stream)?;

        debug!(
            %url,
            session = captured,
            chat_id = request.conversation_id.as_deref().unwrap_or(""),
            mode = request.chat_mode_key.as_str(),
            "stream sent"
        );

        let response = self
            .client
            .post(url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "stream request failed");
                ApiError::stream(e)
            })?;

        self.executor
            .correlation()
            .record_from_headers(response.headers());

        let status = response.status();
        if !status.is_success() {
            warn!(
                %status,
                correlation_id = %self.executor.correlation().current(),
                "stream rejected"
            );
            return Err(ApiError::stream(TransportError::Status(status)));
        }

        let new_chat_id = match request.conversation_id {
            Some(_) => None,
            None => chat_id_from_headers(response.headers()),
        };
        debug!(new_chat_id = new_chat_id.as_deref().unwrap_or(""), "streaming");

        let mut body = response.bytes_stream();
        let mut decoder = Utf8Decoder::new();
        let mut answer = String::new();

        loop {
            if !session.is_current(captured) {
                // Dropping the body closes the connection
                drop(body);
                info!(
                    session = captured,
                    answer_len = answer.len(),
                    "stream cancelled by session change"
                );
                return Ok(StreamAnswerResult {
                    user_prompt: request.user_prompt.clone(),
                    final_answer: answer,
                    new_chat_id,
                    outcome: StreamOutcome::Cancelled,
                });
            }

            let next = match self.read_timeout {
                Some(limit) => tokio::time::timeout(limit, body.next())
                    .await
                    .map_err(|_| {
                        warn!(?limit, "stream stalled");
                        ApiError::stream(TransportError::ReadTimeout(limit))
                    })?,
                None => body.next().await,
            };

            let text = match next {
                Some(Ok(bytes)) => decoder.decode(&bytes),
                Some(Err(e)) => {
                    warn!(error = %e, "stream read failed");
                    return Err(ApiError::stream(e));
                }
                None => break,
            };

            if !text.is_empty() {
                answer.push_str(&text);
                on_chunk(&text, new_chat_id.as_deref());
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            answer.push_str(&tail);
            on_chunk(&tail, new_chat_id.as_deref());
        }

        self.telemetry.record(TelemetryEvent::AnswerComplete {
            chat_id: new_chat_id
                .clone()
                .or_else(|| request.conversation_id.clone()),
            answer_len: answer.len(),
        });
        info!(answer_len = answer.len(), "stream completed");

        Ok(StreamAnswerResult {
            user_prompt: request.user_prompt.clone(),
            final_answer: answer,
            new_chat_id,
            outcome: StreamOutcome::Completed,
        })
    }

    /// Ask the backend to stop generating for `chat_id`.
    ///
    /// Independent of any local stream; callers wanting the local loop to
    /// end as well should also advance their [`SessionToken`].
    pub async fn stop_stream(&self, chat_id: &str) -> Result<Option<String>, ApiError> {
        debug!(chat_id, "stopping stream");
        self.executor
            .post::<Option<String>, ()>(self.endpoints.stream_stop(chat_id), None)
            .await
    }
}

fn chat_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CHAT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
