//! Request lifecycle: send, classify, retry.

use super::transport::{HttpResponse, OutgoingRequest, Transport};
use crate::cli::OutputManager;
use crate::error::{AppError, Result, TransportError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Upper bound for a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How many times to retry and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first
    pub retries: u32,
    /// Wait before the first retry; doubled for each further one
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Wait before retry number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Terminal state of a request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// 2xx
    Delivered,
    /// 409: the server already has this file
    Duplicate,
}

/// `warnings` array of a JSON response body
pub fn response_warnings(body: &str) -> Vec<String> {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value
            .get("warnings")
            .and_then(|w| w.as_array())
            .map(|warnings| {
                warnings
                    .iter()
                    .map(|w| match w.as_str() {
                        Some(s) => s.to_string(),
                        None => w.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        Err(e) => {
            log::debug!("Response body is not valid JSON: {}", e);
            Vec::new()
        }
    }
}

/// Send `request` until it succeeds, fails for good, or retries run out.
///
/// Network errors, timeouts and 5xx are retried. A 404 on a route with a
/// `fallback_url` is re-sent once to that URL without using up a retry.
pub async fn send_with_retry<T: Transport>(
    transport: &T,
    mut request: OutgoingRequest<'_>,
    fallback_url: Option<&str>,
    policy: RetryPolicy,
    output: &OutputManager,
    cancel: &CancellationToken,
) -> Result<Delivery> {
    let mut attempt = 0u32;
    let mut fell_back = false;

    loop {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            result = transport.send(&request) => result,
        };

        let error = match result {
            Ok(response) => {
                if response.is_success() && response.is_json() {
                    for warning in response_warnings(&response.body) {
                        output.warn(&warning);
                    }
                }
                match classify(&request.url, response) {
                    Ok(delivery) => return Ok(delivery),
                    Err(Status::NotFound(e)) => match fallback_url {
                        Some(base) if !fell_back => {
                            output.debug(&format!(
                                "{} returned 404, retrying at {}",
                                request.url, base
                            ));
                            request.url = base.to_string();
                            fell_back = true;
                            continue;
                        }
                        _ => e,
                    },
                    Err(Status::Failed(e)) => e,
                }
            }
            Err(e) => e,
        };

        if !error.is_retriable() || attempt >= policy.retries {
            if attempt > 0 {
                log::debug!("Giving up on {} after {} attempt(s)", request.url, attempt + 1);
            }
            return Err(error);
        }

        attempt += 1;
        let wait = policy.delay(attempt);
        output.warn(&format!(
            "Request failed (attempt {}/{}): {}. Retrying in {:.1}s...",
            attempt,
            policy.retries + 1,
            error,
            wait.as_secs_f64()
        ));
        tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            _ = tokio::time::sleep(wait) => {}
        }
    }
}

enum Status {
    NotFound(AppError),
    Failed(AppError),
}

fn classify(url: &str, response: HttpResponse) -> std::result::Result<Delivery, Status> {
    if response.is_success() {
        return Ok(Delivery::Delivered);
    }
    if response.status == 409 {
        return Ok(Delivery::Duplicate);
    }
    let error = AppError::Transport(TransportError::HttpFail {
        url: url.to_string(),
        status: response.status,
        body: response.body,
    });
    if response.status == 404 {
        Err(Status::NotFound(error))
    } else {
        Err(Status::Failed(error))
    }
}
