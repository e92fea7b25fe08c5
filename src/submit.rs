//! Submission executor: exactly one network attempt per invocation.
//!
//! The executor performs the send for a single queued record, attaches the
//! bearer credential, and classifies the result. It never retries
//! internally and never touches the queue — callers that want a record gone
//! must remove it themselves after observing [`SubmitOutcome::Success`].
//! Every invocation produces one real outbound request, so callers must not
//! loop over it without per-record coordination.

use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{info, warn};

use crate::record::QueueRecord;

/// Default timeout for submission requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout used specifically for the lightweight connectivity probe.
const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a single submission attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Server acknowledged the sale. The caller should now remove the
    /// record from the queue.
    Success { response: Value },
    /// Transient trouble (network unreachable, timeout, 5xx,
    /// backpressure). The record stays queued for a manual retry.
    Retryable { error: String },
    /// The payload can never succeed (validation 4xx). The record stays
    /// queued until the operator explicitly discards it — removal is
    /// destructive and silent deletion loses sales.
    Fatal { status: u16, error: String },
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmitOutcome::Success { .. })
    }
}

/// Performs the network send for one queued record.
///
/// Implementations must issue exactly one outbound request per call.
pub trait Submitter: Send + Sync {
    fn submit(
        &self,
        record: &QueueRecord,
        credential: &str,
    ) -> impl Future<Output = SubmitOutcome> + Send;
}

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the sales API base URL:
/// - strip trailing slashes
/// - strip a trailing `/api` segment (endpoint paths carry their own)
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    if url.ends_with("/api") {
        url.truncate(url.len() - 4);
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into an operator-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach sales API at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid sales API URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into an operator-friendly message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "Credential is invalid or expired".to_string(),
        403 => "Terminal not authorized".to_string(),
        404 => "Sales API endpoint not found".to_string(),
        s if s >= 500 => format!("Sales API server error (HTTP {s})"),
        s => format!("Unexpected response from sales API (HTTP {s})"),
    }
}

/// Build the error detail for a non-success response, preserving any
/// server-side validation message so the pending-sales panel can show why a
/// record was rejected.
fn response_error_detail(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let message = json
            .get("error")
            .or_else(|| json.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| status_error(status));
        format!("{message} (HTTP {})", status.as_u16())
    } else if !body.trim().is_empty() {
        format!(
            "{} (HTTP {}): {}",
            status_error(status),
            status.as_u16(),
            body.trim()
        )
    } else {
        format!("{} (HTTP {})", status_error(status), status.as_u16())
    }
}

/// Statuses worth retrying once the network or server recovers. Everything
/// else in 4xx means the payload itself is unacceptable.
fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || matches!(status.as_u16(), 408 | 429)
}

fn classify_response(status: StatusCode, body: &str, record_id: &str) -> SubmitOutcome {
    if status.is_success() {
        let response = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(body).unwrap_or(Value::Null)
        };
        info!(record_id = %record_id, "sale submission acknowledged");
        return SubmitOutcome::Success { response };
    }

    let error = response_error_detail(status, body);
    if is_retryable_status(status) {
        SubmitOutcome::Retryable { error }
    } else {
        SubmitOutcome::Fatal {
            status: status.as_u16(),
            error,
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP executor
// ---------------------------------------------------------------------------

/// HTTP executor talking to the remote sales API.
pub struct HttpSubmitter {
    base_url: String,
}

impl HttpSubmitter {
    /// Build an executor for the given API base URL. The URL is normalized
    /// once here; endpoint paths are appended per record.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Submitter for HttpSubmitter {
    async fn submit(&self, record: &QueueRecord, credential: &str) -> SubmitOutcome {
        let url = format!("{}{}", self.base_url, record.endpoint.path());

        let client = match Client::builder().timeout(DEFAULT_TIMEOUT).build() {
            Ok(c) => c,
            Err(e) => {
                return SubmitOutcome::Retryable {
                    error: format!("Failed to create HTTP client: {e}"),
                }
            }
        };

        let resp = match client
            .post(&url)
            .bearer_auth(credential)
            .json(&record.payload)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "sale submission failed before a response arrived");
                return SubmitOutcome::Retryable {
                    error: friendly_error(&self.base_url, &e),
                };
            }
        };

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        classify_response(status, &body, &record.id)
    }
}

// ---------------------------------------------------------------------------
// Connectivity probe
// ---------------------------------------------------------------------------

/// Result of a connectivity probe.
#[derive(Debug, serde::Serialize)]
pub struct ConnectivityResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Probe the sales API with a lightweight health-check so the UI can label
/// the terminal online or offline before attempting a drain.
pub async fn check_connectivity(base_url: &str, credential: &str) -> ConnectivityResult {
    let base = normalize_base_url(base_url);
    let health_url = format!("{base}/api/health");

    let client = match Client::builder().timeout(CONNECTIVITY_TIMEOUT).build() {
        Ok(c) => c,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(format!("Failed to create HTTP client: {e}")),
            };
        }
    };

    let start = Instant::now();

    let resp = match client.get(&health_url).bearer_auth(credential).send().await {
        Ok(r) => r,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(friendly_error(&base, &e)),
            };
        }
    };

    let latency = start.elapsed().as_millis() as u64;
    let status = resp.status();

    if status.is_success() {
        info!(latency_ms = latency, "connectivity probe passed");
        ConnectivityResult {
            success: true,
            latency_ms: Some(latency),
            error: None,
        }
    } else {
        ConnectivityResult {
            success: false,
            latency_ms: Some(latency),
            error: Some(status_error(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url_variants() {
        assert_eq!(
            normalize_base_url("pos.example.com"),
            "https://pos.example.com"
        );
        assert_eq!(
            normalize_base_url("https://pos.example.com/"),
            "https://pos.example.com"
        );
        assert_eq!(
            normalize_base_url("https://pos.example.com/api/"),
            "https://pos.example.com"
        );
        assert_eq!(
            normalize_base_url("localhost:3000"),
            "http://localhost:3000"
        );
        assert_eq!(
            normalize_base_url("  https://pos.example.com/api  "),
            "https://pos.example.com"
        );
    }

    #[test]
    fn test_success_response_classifies_as_success() {
        let outcome = classify_response(StatusCode::OK, r#"{"saleId":"s-1"}"#, "rec-1");
        assert_eq!(
            outcome,
            SubmitOutcome::Success {
                response: serde_json::json!({ "saleId": "s-1" })
            }
        );
    }

    #[test]
    fn test_empty_success_body_yields_null_response() {
        let outcome = classify_response(StatusCode::NO_CONTENT, "", "rec-1");
        assert_eq!(
            outcome,
            SubmitOutcome::Success {
                response: Value::Null
            }
        );
    }

    #[test]
    fn test_server_errors_and_backpressure_are_retryable() {
        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::TOO_MANY_REQUESTS,
        ] {
            let outcome = classify_response(status, "", "rec-1");
            assert!(
                matches!(outcome, SubmitOutcome::Retryable { .. }),
                "expected {status} to be retryable"
            );
        }
    }

    #[test]
    fn test_validation_failure_is_fatal_and_keeps_server_message() {
        let outcome = classify_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"error":"Unknown product: sku-9"}"#,
            "rec-1",
        );
        match outcome {
            SubmitOutcome::Fatal { status, error } => {
                assert_eq!(status, 422);
                assert!(error.contains("Unknown product: sku-9"));
                assert!(error.contains("422"));
            }
            other => panic!("expected fatal outcome, got {other:?}"),
        }
    }

    #[test]
    fn test_auth_failures_are_fatal_with_friendly_message() {
        let outcome = classify_response(StatusCode::UNAUTHORIZED, "", "rec-1");
        match outcome {
            SubmitOutcome::Fatal { status, error } => {
                assert_eq!(status, 401);
                assert!(error.contains("Credential is invalid or expired"));
            }
            other => panic!("expected fatal outcome, got {other:?}"),
        }
    }

    #[test]
    fn test_error_detail_includes_plain_text_body() {
        let detail = response_error_detail(StatusCode::BAD_REQUEST, "missing field: items");
        assert!(detail.contains("HTTP 400"));
        assert!(detail.contains("missing field: items"));
    }
}
