//! Non-streaming request/response cycle

use super::correlation::CorrelationTracker;
use super::headers::{HeaderComposer, HeaderError};
use super::{ApiError, TransportError};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// Issues GET/POST/PATCH requests against the backend.
///
/// The correlation id of every response is recorded before its status is
/// checked. All faults after header composition collapse into
/// [`ApiError::RequestFailed`]; a body that fails to parse is reported the
/// same way as an unreachable server. Nothing is retried here.
#[derive(Clone)]
pub struct RequestExecutor {
    client: Client,
    headers: HeaderComposer,
    correlation: CorrelationTracker,
}

impl RequestExecutor {
    pub fn new(client: Client, headers: HeaderComposer, correlation: CorrelationTracker) -> Self {
        Self {
            client,
            headers,
            correlation,
        }
    }

    pub fn correlation(&self) -> &CorrelationTracker {
        &self.correlation
    }

    pub(crate) fn headers(&self) -> &HeaderComposer {
        &self.headers
    }

    pub async fn execute<T, P>(
        &self,
        method: Method,
        url: Url,
        payload: Option<&P>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        if method != Method::GET && method != Method::POST && method != Method::PATCH {
            return Err(ApiError::request(TransportError::UnsupportedMethod(method)));
        }

        let headers = self
            .headers
            .build_headers()
            .await
            .map_err(HeaderError::into_request_error)?;

        let mut builder = self.client.request(method.clone(), url.clone()).headers(headers);

        if method != Method::GET {
            if let Some(payload) = payload {
                let body = serde_json::to_vec(payload).map_err(ApiError::request)?;
                builder = builder.body(body);
            }
        }

        debug!(%method, %url, "sending request");
        let response = builder.send().await.map_err(|e| {
            warn!(%method, %url, error = %e, "request failed");
            ApiError::request(e)
        })?;

        self.correlation.record_from_headers(response.headers());

        let status = response.status();
        if !status.is_success() {
            warn!(
                %method,
                %url,
                %status,
                correlation_id = %self.correlation.current(),
                "request returned error status"
            );
            return Err(ApiError::request(TransportError::Status(status)));
        }

        let text = response.text().await.map_err(ApiError::request)?;
        serde_json::from_str(&text).map_err(ApiError::request)
    }

    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        self.execute::<T, ()>(Method::GET, url, None).await
    }

    pub async fn post<T, P>(&self, url: Url, payload: Option<&P>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        self.execute(Method::POST, url, payload).await
    }

    pub async fn patch<T, P>(&self, url: Url, payload: Option<&P>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        self.execute(Method::PATCH, url, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CorrelationPolicy, StaticTokenProvider};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn executor_with_token(token: &str) -> RequestExecutor {
        let headers = HeaderComposer::new(Arc::new(StaticTokenProvider::new(token)), "key-1");
        RequestExecutor::new(
            Client::new(),
            headers,
            CorrelationTracker::new(CorrelationPolicy::ClearOnMissing),
        )
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[tokio::test]
    async fn test_get_parses_body_and_records_correlation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user-service/user/settings"))
            .and(header("authorization", "Bearer tok"))
            .and(header("apikey", "key-1"))
            .and(header("content-type", "application/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-correlation-id", "corr-ok")
                    .set_body_json(json!({ "language": "en" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let executor = executor_with_token("tok");
        let value: Value = assert_ok!(
            executor
                .get(url(&server, "/user-service/user/settings"))
                .await
        );

        assert_eq!(value["language"], "en");
        assert_eq!(executor.correlation().current(), "corr-ok");
    }

    #[tokio::test]
    async fn test_error_status_records_correlation_before_failing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(500).insert_header("x-correlation-id", "corr-500"))
            .mount(&server)
            .await;

        let executor = executor_with_token("tok");
        let err = assert_err!(
            executor
                .post::<Value, ()>(url(&server, "/health"), None)
                .await
        );

        assert!(matches!(
            err,
            ApiError::RequestFailed {
                status: Some(s),
                source: TransportError::Status(_)
            } if s.as_u16() == 500
        ));
        assert_eq!(executor.correlation().current(), "corr-500");
    }

    #[tokio::test]
    async fn test_malformed_body_is_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let executor = executor_with_token("tok");
        let err = executor
            .get::<Value>(url(&server, "/chat-service/chat/mode/"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApiError::RequestFailed {
                status: None,
                source: TransportError::Serialization(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_patch_sends_json_payload() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/chat-service/message/feedback"))
            .and(body_json(json!({ "message_id": "m1", "feedback": "negative" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message_id": "m1" })))
            .expect(1)
            .mount(&server)
            .await;

        let executor = executor_with_token("tok");
        let payload = json!({ "message_id": "m1", "feedback": "negative" });
        let value: Value = executor
            .patch(url(&server, "/chat-service/message/feedback"), Some(&payload))
            .await
            .unwrap();
        assert_eq!(value["message_id"], "m1");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_request_failed() {
        let executor = executor_with_token("tok");
        let err = executor
            .get::<Value>(Url::parse("http://127.0.0.1:1/health").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApiError::RequestFailed {
                status: None,
                source: TransportError::Http(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let executor = executor_with_token("tok");
        let err = executor
            .execute::<Value, ()>(
                Method::DELETE,
                Url::parse("http://127.0.0.1:1/x").unwrap(),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::RequestFailed {
                source: TransportError::UnsupportedMethod(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_auth_failure_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let executor = executor_with_token("");
        let err = executor
            .get::<Value>(url(&server, "/user-service/user/settings"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AuthTokenUnavailable(_)));
    }
}
