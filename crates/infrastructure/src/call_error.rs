use deskbot_core::AppError;
use deskbot_domain::{CallOutcome, CallStatus};

const DENIED_MARKER: &str = "Authorization_RequestDenied";
const ALREADY_EXISTS_MARKER: &str = "already exist";

/// Translates a non-success call outcome into an error category.
pub(crate) fn outcome_error(action: &str, outcome: &CallOutcome) -> AppError {
    let detail = format!("{action}: {}", outcome.detail());

    match (outcome.status, outcome.http_status) {
        (CallStatus::NotFound, _) => AppError::NotFound(detail),
        (CallStatus::RateLimited, _) => AppError::RateLimited(detail),
        (CallStatus::ClientError, Some(401)) => AppError::Unauthorized(detail),
        (CallStatus::ClientError, Some(403)) => AppError::Forbidden(detail),
        (CallStatus::ClientError, Some(409)) => AppError::Conflict(detail),
        (CallStatus::ClientError, _) if outcome.payload_mentions(ALREADY_EXISTS_MARKER) => {
            AppError::Conflict(detail)
        }
        (CallStatus::ClientError, _) if outcome.payload_mentions(DENIED_MARKER) => {
            AppError::Forbidden(detail)
        }
        (CallStatus::ClientError, status) => AppError::Validation(format!(
            "{detail} (status {})",
            status.map_or_else(|| "unknown".to_owned(), |code| code.to_string())
        )),
        (CallStatus::ServerError | CallStatus::TransportFailure, _) => AppError::Transport(detail),
        (CallStatus::Success, _) => {
            AppError::Internal(format!("{action}: success outcome treated as failure"))
        }
    }
}
