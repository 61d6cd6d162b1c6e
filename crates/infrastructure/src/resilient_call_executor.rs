//! HTTP execution with status classification, throttling waits and backoff.
//!
//! The executor never returns an error: every response or transport problem is
//! folded into a [`CallOutcome`], and retriable outcomes are retried until the
//! attempt budget or the optional deadline runs out.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::header::RETRY_AFTER;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use deskbot_domain::{CallOutcome, CallStatus};

/// Upper bound on the exponent used for backoff.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Attempt budget and backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Base of the exponential backoff.
    pub base_delay: Duration,
    /// Upper bound of the random jitter added to each backoff.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Returns the same policy with a different attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

/// Returns the wait before retrying after the zero-based attempt `attempt`.
///
/// A server-provided `Retry-After` wins over the computed backoff.
#[must_use]
pub fn retry_delay(
    policy: &RetryPolicy,
    attempt: u32,
    retry_after: Option<u64>,
    jitter: Duration,
) -> Duration {
    if let Some(seconds) = retry_after {
        return Duration::from_secs(seconds);
    }

    let factor = 1_u32 << attempt.min(MAX_BACKOFF_EXPONENT);
    policy
        .base_delay
        .saturating_mul(factor)
        .saturating_add(jitter.min(policy.max_jitter))
}

fn sample_jitter(policy: &RetryPolicy) -> Duration {
    let bound = u64::try_from(policy.max_jitter.as_millis()).unwrap_or(u64::MAX);
    if bound == 0 {
        return Duration::ZERO;
    }

    Duration::from_millis(rand::thread_rng().gen_range(0..=bound))
}

/// Request body encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum CallBody {
    /// JSON document.
    Json(Value),
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
}

/// Description of one logical call, replayable across attempts.
#[derive(Clone)]
pub struct CallRequest {
    method: reqwest::Method,
    url: String,
    headers: Vec<(String, String)>,
    bearer: Option<String>,
    body: Option<CallBody>,
}

impl CallRequest {
    /// Creates a request with an arbitrary method.
    #[must_use]
    pub fn new(method: reqwest::Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            bearer: None,
            body: None,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(reqwest::Method::GET, url)
    }

    /// Creates a POST request.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(reqwest::Method::POST, url)
    }

    /// Creates a DELETE request.
    #[must_use]
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(reqwest::Method::DELETE, url)
    }

    /// Sends `token` as a bearer credential.
    #[must_use]
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sends a JSON body.
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(CallBody::Json(body));
        self
    }

    /// Sends a form body.
    #[must_use]
    pub fn form(mut self, pairs: Vec<(String, String)>) -> Self {
        self.body = Some(CallBody::Form(pairs));
        self
    }

    /// Returns the target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    fn with_url(&self, url: &str) -> Self {
        Self {
            url: url.to_owned(),
            ..self.clone()
        }
    }

    fn build(&self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        let mut builder = client.request(self.method.clone(), self.url.as_str());
        if let Some(token) = &self.bearer {
            builder = builder.bearer_auth(token);
        }
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        match &self.body {
            Some(CallBody::Json(body)) => builder.json(body),
            Some(CallBody::Form(pairs)) => builder.form(pairs),
            None => builder,
        }
    }
}

impl std::fmt::Debug for CallRequest {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CallRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("has_bearer", &self.bearer.is_some())
            .finish_non_exhaustive()
    }
}

/// Retrying HTTP executor shared by every remote adapter.
#[derive(Clone)]
pub struct ResilientCallExecutor {
    http_client: reqwest::Client,
    policy: RetryPolicy,
    deadline: Option<Instant>,
}

impl ResilientCallExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(http_client: reqwest::Client, policy: RetryPolicy) -> Self {
        Self {
            http_client,
            policy: policy.with_max_attempts(policy.max_attempts),
            deadline: None,
        }
    }

    /// Stops retrying, and abandons requests in flight, at `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Returns an executor sharing the client and deadline with another attempt budget.
    #[must_use]
    pub fn with_max_attempts(&self, max_attempts: u32) -> Self {
        Self {
            policy: self.policy.with_max_attempts(max_attempts),
            ..self.clone()
        }
    }

    /// Returns the retry policy in use.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes `request`, retrying throttled and server-error outcomes.
    pub async fn execute(&self, request: &CallRequest) -> CallOutcome {
        let mut attempt = 0_u32;

        loop {
            let outcome = self.attempt(request).await;
            attempt = attempt.saturating_add(1);

            if !outcome.retriable {
                return outcome;
            }
            if attempt >= self.policy.max_attempts {
                warn!(
                    url = request.url(),
                    attempts = attempt,
                    status = outcome.status.as_str(),
                    "retry budget exhausted"
                );
                return outcome;
            }

            let delay = retry_delay(
                &self.policy,
                attempt - 1,
                outcome.retry_after,
                sample_jitter(&self.policy),
            );
            if let Some(deadline) = self.deadline {
                if Instant::now() + delay >= deadline {
                    warn!(
                        url = request.url(),
                        attempts = attempt,
                        "retry would cross the deadline; returning last outcome"
                    );
                    return outcome;
                }
            }

            warn!(
                url = request.url(),
                attempt,
                status = outcome.status.as_str(),
                http_status = ?outcome.http_status,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying call"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Executes a collection GET and follows `@odata.nextLink` until absent.
    ///
    /// Returns the concatenated `value` arrays, or the first non-success outcome.
    pub async fn execute_paged(&self, request: &CallRequest) -> Result<Vec<Value>, CallOutcome> {
        let mut items = Vec::new();
        let mut page = request.clone();

        loop {
            let outcome = self.execute(&page).await;
            if !outcome.is_success() {
                return Err(outcome);
            }

            if let Some(values) = outcome.payload.get("value").and_then(Value::as_array) {
                items.extend(values.iter().cloned());
            }

            match outcome
                .payload
                .get("@odata.nextLink")
                .and_then(Value::as_str)
            {
                Some(next_link) => {
                    debug!(next_link, "following next page");
                    page = request.with_url(next_link);
                }
                None => return Ok(items),
            }
        }
    }

    async fn attempt(&self, request: &CallRequest) -> CallOutcome {
        let send = async {
            match request.build(&self.http_client).send().await {
                Ok(response) => read_response(response).await,
                Err(error) => CallOutcome::transport_failure(format!(
                    "request to {} failed: {error}",
                    request.url()
                )),
            }
        };

        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, send)
                .await
                .unwrap_or_else(|_| {
                    CallOutcome::transport_failure(format!(
                        "request to {} exceeded the run deadline",
                        request.url()
                    ))
                }),
            None => send.await,
        }
    }
}

/// Reads `Retry-After` as delay seconds or as an HTTP date relative to `now`.
///
/// Dates already in the past mean no wait.
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }

    let retry_at = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = retry_at.with_timezone(&Utc) - now;
    Some(u64::try_from(wait.num_seconds()).unwrap_or(0))
}

async fn read_response(response: reqwest::Response) -> CallOutcome {
    let http_status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| parse_retry_after(value, Utc::now()));

    let payload = match response.text().await {
        Ok(text) if text.trim().is_empty() => Value::Null,
        Ok(text) => serde_json::from_str(text.as_str()).unwrap_or(Value::String(text)),
        Err(error) => Value::String(format!("<response body unavailable: {error}>")),
    };

    let outcome =
        CallOutcome::from_response(http_status, payload).with_retry_after(retry_after);
    if outcome.status != CallStatus::Success {
        debug!(
            http_status,
            status = outcome.status.as_str(),
            "call returned non-success status"
        );
    }

    outcome
}
