//! HTTP transport seam.
//!
//! The retry loop talks to a [`Transport`]; production uses reqwest and the
//! unit tests use a scripted fake.

use super::form::{ArtifactFile, multipart_form};
use crate::error::{AppError, Result, TransportError};
use std::future::Future;
use std::time::Duration;

/// Request body
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// `multipart/form-data` built from an artifact
    Multipart(&'a ArtifactFile),
    /// `application/json`
    Json(&'a serde_json::Value),
}

/// One POST, ready to send
#[derive(Debug, Clone)]
pub struct OutgoingRequest<'a> {
    /// Full URL including any query string
    pub url: String,
    /// Body
    pub payload: Payload<'a>,
    /// Per-request timeout
    pub timeout: Duration,
}

/// What came back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// `Content-Type` header, when present
    pub content_type: Option<String>,
    /// Response body as text
    pub body: String,
}

impl HttpResponse {
    /// 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body is declared as JSON
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/json"))
    }
}

/// Sends one request and reports the response or a transport error
pub trait Transport {
    /// Send `request`.
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    fn send(&self, request: &OutgoingRequest<'_>) -> impl Future<Output = Result<HttpResponse>> + Send;
}

/// reqwest-backed transport
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Transport with a fresh connection pool
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: &OutgoingRequest<'_>) -> Result<HttpResponse> {
        let builder = self.client.post(&request.url).timeout(request.timeout);
        let builder = match request.payload {
            Payload::Multipart(file) => builder.multipart(multipart_form(file).await?),
            Payload::Json(value) => builder.json(value),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(&request.url, request.timeout, e))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&request.url, request.timeout, e))?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

fn transport_error(url: &str, timeout: Duration, error: reqwest::Error) -> AppError {
    if error.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
            seconds: timeout.as_secs(),
        }
        .into()
    } else {
        TransportError::Network {
            url: url.to_string(),
            reason: error.to_string(),
        }
        .into()
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned outcomes and records every URL it was asked to hit
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedTransport {
        script: Mutex<VecDeque<Result<HttpResponse>>>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(script: Vec<Result<HttpResponse>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn urls(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    pub(crate) fn status(status: u16) -> Result<HttpResponse> {
        Ok(HttpResponse {
            status,
            content_type: None,
            body: String::new(),
        })
    }

    pub(crate) fn json(status: u16, body: &str) -> Result<HttpResponse> {
        Ok(HttpResponse {
            status,
            content_type: Some("application/json; charset=utf-8".to_string()),
            body: body.to_string(),
        })
    }

    pub(crate) fn network_error() -> Result<HttpResponse> {
        Err(TransportError::Network {
            url: "fake".to_string(),
            reason: "connection reset".to_string(),
        }
        .into())
    }

    impl Transport for ScriptedTransport {
        async fn send(&self, request: &OutgoingRequest<'_>) -> Result<HttpResponse> {
            self.seen.lock().unwrap().push(request.url.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| status(200))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_detection() {
        let response = HttpResponse {
            status: 200,
            content_type: Some("application/json; charset=utf-8".into()),
            body: "{}".into(),
        };
        assert!(response.is_success());
        assert!(response.is_json());
        let response = HttpResponse {
            content_type: Some("text/plain".into()),
            ..response
        };
        assert!(!response.is_json());
    }
}
