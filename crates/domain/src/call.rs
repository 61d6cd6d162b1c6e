use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classified result of one HTTP attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// 2xx response.
    Success,
    /// 404 response. Callers treat this as "resource absent".
    NotFound,
    /// 429 or 503 response.
    RateLimited,
    /// Any other 4xx response.
    ClientError,
    /// Any other 5xx response.
    ServerError,
    /// Transport exception or a status outside the known classes.
    TransportFailure,
}

impl CallStatus {
    /// Maps an HTTP status code onto a call status.
    #[must_use]
    pub fn from_http_status(code: u16) -> Self {
        match code {
            200..=299 => Self::Success,
            404 => Self::NotFound,
            429 | 503 => Self::RateLimited,
            400..=499 => Self::ClientError,
            500..=599 => Self::ServerError,
            _ => Self::TransportFailure,
        }
    }

    /// Returns whether another attempt may produce a different result.
    #[must_use]
    pub fn is_retriable(self) -> bool {
        matches!(self, Self::RateLimited | Self::ServerError)
    }

    /// Returns a stable label for logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::ClientError => "client_error",
            Self::ServerError => "server_error",
            Self::TransportFailure => "transport_failure",
        }
    }
}

/// Outcome of a single attempt, or the terminal outcome of a retried call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    /// Classified status.
    pub status: CallStatus,
    /// Raw HTTP status, absent for transport failures.
    pub http_status: Option<u16>,
    /// Parsed JSON body, or the raw text wrapped in a JSON string.
    pub payload: Value,
    /// Whether the executor may retry this outcome.
    pub retriable: bool,
    /// Server-requested wait in seconds, from the `Retry-After` header.
    pub retry_after: Option<u64>,
}

impl CallOutcome {
    /// Builds an outcome from an HTTP response status and body.
    #[must_use]
    pub fn from_response(http_status: u16, payload: Value) -> Self {
        let status = CallStatus::from_http_status(http_status);
        Self {
            status,
            http_status: Some(http_status),
            payload,
            retriable: status.is_retriable(),
            retry_after: None,
        }
    }

    /// Attaches the server-requested wait.
    #[must_use]
    pub fn with_retry_after(mut self, seconds: Option<u64>) -> Self {
        self.retry_after = seconds;
        self
    }

    /// Builds a non-retriable transport failure carrying a diagnostic message.
    #[must_use]
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self {
            status: CallStatus::TransportFailure,
            http_status: None,
            payload: Value::String(message.into()),
            retriable: false,
            retry_after: None,
        }
    }

    /// Returns whether the call succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == CallStatus::Success
    }

    /// Returns the payload rendered as text for diagnostics.
    #[must_use]
    pub fn detail(&self) -> String {
        match &self.payload {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Returns whether the rendered payload mentions `marker`.
    #[must_use]
    pub fn payload_mentions(&self, marker: &str) -> bool {
        self.detail()
            .to_ascii_lowercase()
            .contains(marker.to_ascii_lowercase().as_str())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::{CallOutcome, CallStatus};

    #[test]
    fn throttling_statuses_are_rate_limited() {
        assert_eq!(CallStatus::from_http_status(429), CallStatus::RateLimited);
        assert_eq!(CallStatus::from_http_status(503), CallStatus::RateLimited);
    }

    #[test]
    fn not_found_is_never_retriable() {
        let outcome = CallOutcome::from_response(
            404,
            json!({"error": {"code": "Request_ResourceNotFound"}}),
        );
        assert_eq!(outcome.status, CallStatus::NotFound);
        assert!(!outcome.retriable);
    }

    #[test]
    fn payload_mentions_is_case_insensitive() {
        let outcome = CallOutcome::from_response(
            403,
            json!({"error": {"code": "Authorization_RequestDenied"}}),
        );
        assert!(outcome.payload_mentions("authorization_requestdenied"));
    }

    proptest! {
        #[test]
        fn other_client_errors_are_terminal(code in 400_u16..500) {
            prop_assume!(code != 404 && code != 429);
            let status = CallStatus::from_http_status(code);
            prop_assert_eq!(status, CallStatus::ClientError);
            prop_assert!(!status.is_retriable());
        }

        #[test]
        fn server_errors_other_than_503_retry(code in 500_u16..600) {
            prop_assume!(code != 503);
            let status = CallStatus::from_http_status(code);
            prop_assert_eq!(status, CallStatus::ServerError);
            prop_assert!(status.is_retriable());
        }

        #[test]
        fn informational_and_redirects_are_transport_failures(code in 100_u16..200) {
            prop_assert_eq!(CallStatus::from_http_status(code), CallStatus::TransportFailure);
            prop_assert_eq!(CallStatus::from_http_status(code + 200), CallStatus::TransportFailure);
        }
    }
}
