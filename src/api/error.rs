//! Error taxonomy for the API core
//!
//! Every failure that crosses the executor boundary is an [`ApiError`]
//! carrying a stable [`ErrorLabel`]. Tool handlers match on the label, never
//! on message text.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::models::HttpMethod;

/// Status used when no HTTP response was received at all
pub const NO_RESPONSE_STATUS: u16 = 0;

/// Longest upstream body excerpt copied into an error detail
const MAX_DETAIL_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorLabel {
    AuthFailed,
    ValidationError,
    NotFound,
    RateLimited,
    ReadOnlyMode,
    ServerError,
    UnknownError,
}

impl ErrorLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorLabel::AuthFailed => "AUTH_FAILED",
            ErrorLabel::ValidationError => "VALIDATION_ERROR",
            ErrorLabel::NotFound => "NOT_FOUND",
            ErrorLabel::RateLimited => "RATE_LIMITED",
            ErrorLabel::ReadOnlyMode => "READ_ONLY_MODE",
            ErrorLabel::ServerError => "SERVER_ERROR",
            ErrorLabel::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Label for an HTTP error status.
    ///
    /// 401 maps to `AUTH_FAILED` here; the executor decides separately whether
    /// a 401 is worth one re-authentication first.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => ErrorLabel::ValidationError,
            401 => ErrorLabel::AuthFailed,
            404 => ErrorLabel::NotFound,
            429 => ErrorLabel::RateLimited,
            500..=599 => ErrorLabel::ServerError,
            _ => ErrorLabel::UnknownError,
        }
    }

    fn default_detail(&self) -> &'static str {
        match self {
            ErrorLabel::AuthFailed => "Authentication failed",
            ErrorLabel::ValidationError => "Request validation failed",
            ErrorLabel::NotFound => "Resource not found",
            ErrorLabel::RateLimited => "Rate limit exceeded",
            ErrorLabel::ReadOnlyMode => "Profile is read-only",
            ErrorLabel::ServerError => "Upstream server error",
            ErrorLabel::UnknownError => "Unexpected error",
        }
    }
}

impl fmt::Display for ErrorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error returned by every public API operation
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{label} ({status}): {detail}")]
pub struct ApiError {
    pub status: u16,
    pub label: ErrorLabel,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Value>,
}

impl ApiError {
    pub fn new(status: u16, label: ErrorLabel, detail: impl Into<String>) -> Self {
        Self {
            status,
            label,
            detail: detail.into(),
            fields: None,
        }
    }

    /// Map an upstream error response to an error.
    ///
    /// Understands bodies shaped `{message?: string, errors?: object}`; any
    /// other body is kept as a truncated excerpt.
    pub fn from_response(status: u16, body: &str) -> Self {
        let label = ErrorLabel::from_status(status);
        let parsed: Option<Value> = serde_json::from_str(body).ok();

        let message = parsed
            .as_ref()
            .and_then(|v| v.get("message").or_else(|| v.get("error")))
            .and_then(|m| m.as_str())
            .map(|m| m.to_string());

        let fields = parsed
            .as_ref()
            .and_then(|v| v.get("errors"))
            .filter(|errors| !errors.is_null())
            .cloned();

        let detail = match message {
            Some(message) if !message.is_empty() => message,
            _ if !body.trim().is_empty() && parsed.is_none() => truncate(body.trim()),
            _ => label.default_detail().to_string(),
        };

        Self {
            status,
            label,
            detail,
            fields,
        }
    }

    /// A mutating call rejected locally by the write guard
    pub fn read_only(method: HttpMethod, path: &str) -> Self {
        Self::new(
            403,
            ErrorLabel::ReadOnlyMode,
            format!("{} {} rejected: the active profile is read-only", method, path),
        )
    }

    /// A call that never received a response
    pub fn network(error: &TransportError) -> Self {
        Self::new(NO_RESPONSE_STATUS, ErrorLabel::UnknownError, error.to_string())
    }

    /// Error for a failed pagination sequence or similar client-side fault
    pub fn unexpected(detail: impl Into<String>) -> Self {
        Self::new(NO_RESPONSE_STATUS, ErrorLabel::UnknownError, detail)
    }

    pub fn with_fields(mut self, fields: Value) -> Self {
        self.fields = Some(fields);
        self
    }
}

/// Failure of the authentication exchange
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authentication rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("authentication response is missing {0}")]
    MalformedResponse(String),

    #[error("authentication request failed: {0}")]
    Transport(String),
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        let status = match &error {
            AuthError::Rejected { status, .. } => *status,
            AuthError::MalformedResponse(_) => 401,
            AuthError::Transport(_) => NO_RESPONSE_STATUS,
        };
        ApiError::new(status, ErrorLabel::AuthFailed, error.to_string())
    }
}

/// Failure below HTTP: no response was received
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout(Duration::ZERO)
        } else if error.is_connect() {
            TransportError::Connect(error.to_string())
        } else {
            TransportError::Other(error.to_string())
        }
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_DETAIL_LEN {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_DETAIL_LEN).collect();
    cut.push_str("...");
    cut
}
