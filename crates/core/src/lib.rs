//! Shared primitives for all Deskbot crates.

#![forbid(unsafe_code)]

/// Helpers that keep secrets out of logs.
pub mod redaction;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use redaction::{mask_secrets, token_preview};

/// Result type used across Deskbot crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string with surrounding whitespace removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Directory tenant identifier as published by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(Uuid);

impl TenantId {
    /// Parses a tenant identifier from its textual GUID form.
    pub fn parse(value: &str) -> AppResult<Self> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid tenant id '{value}': {error}")))
    }
}

impl Display for TenantId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller is not authenticated against the remote system.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but the remote system denied the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A credential or token is empty or structurally invalid.
    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    /// Remote system kept throttling until the attempt budget ran out.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Network failure or unexpected response from a remote system.
    #[error("transport error: {0}")]
    Transport(String),

    /// Operation did not finish within its time bound.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}
