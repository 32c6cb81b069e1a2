use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::{HttpError, HttpResponse};

/// Classification of a failed upstream call.
///
/// Produced by [`classify`] and consumed by the retry policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// HTTP 429, or 403 carrying a rate-limit indicator.
    RateLimited,
    /// 5xx, 408, connection resets, DNS failures and timeouts.
    ServerOrNetwork,
    /// HTTP 404.
    NotFound,
    /// HTTP 401 or missing credentials.
    Auth,
    /// Everything else, including undecodable payloads.
    NonRetryable,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ServerOrNetwork => "server_or_network",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Auth => "auth",
            ErrorKind::NonRetryable => "non_retryable",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a raw upstream failure came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOrigin {
    /// The request never produced a response.
    Transport,
    /// The upstream answered with a non-success status.
    Status(u16),
    /// A success response whose body could not be decoded.
    Decode,
}

/// A raw, unclassified upstream failure.
///
/// This is what a single attempt returns; the retry executor classifies it
/// before deciding whether to sleep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    pub origin: FailureOrigin,
    pub message: String,
    /// `x-ratelimit-remaining` reported as exhausted on the failing response.
    pub budget_exhausted: bool,
}

impl UpstreamFailure {
    /// Build a failure from a non-success response.
    pub fn from_response(response: &HttpResponse) -> Self {
        let body = response.body_text();
        let message = extract_error_message(&body).unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {}", response.status)
            } else {
                format!("HTTP {}: {}", response.status, truncate(body.trim(), 200))
            }
        });
        let budget_exhausted = response
            .header("x-ratelimit-remaining")
            .is_some_and(|v| v.trim() == "0");

        Self {
            origin: FailureOrigin::Status(response.status),
            message,
            budget_exhausted,
        }
    }

    pub fn transport(err: &HttpError) -> Self {
        Self {
            origin: FailureOrigin::Transport,
            message: err.to_string(),
            budget_exhausted: false,
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            origin: FailureOrigin::Decode,
            message: message.into(),
            budget_exhausted: false,
        }
    }

    /// HTTP status, when the upstream answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self.origin {
            FailureOrigin::Status(status) => Some(status),
            _ => None,
        }
    }

    fn mentions_rate_limit(&self) -> bool {
        let lower = self.message.to_ascii_lowercase();
        lower.contains("rate limit") || lower.contains("ratelimit") || lower.contains("abuse")
    }
}

/// Turn a raw upstream failure into an [`ErrorKind`].
#[must_use]
pub fn classify(failure: &UpstreamFailure) -> ErrorKind {
    match failure.origin {
        FailureOrigin::Transport => ErrorKind::ServerOrNetwork,
        FailureOrigin::Decode => ErrorKind::NonRetryable,
        FailureOrigin::Status(status) => match status {
            429 => ErrorKind::RateLimited,
            403 if failure.budget_exhausted || failure.mentions_rate_limit() => {
                ErrorKind::RateLimited
            }
            401 => ErrorKind::Auth,
            404 => ErrorKind::NotFound,
            408 => ErrorKind::ServerOrNetwork,
            s if s >= 500 => ErrorKind::ServerOrNetwork,
            _ => ErrorKind::NonRetryable,
        },
    }
}

/// Errors surfaced by the pull client.
///
/// Raw HTTP errors never cross this boundary; every upstream failure has been
/// classified first.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Credentials are missing or were rejected.
    #[error("Authentication failed: credentials are missing or invalid ({message})")]
    Auth { message: String },

    /// Rate limited and not retried (only surfaced when retries are disabled).
    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    /// Server or network failure and not retried.
    #[error("Server or network error: {message}")]
    ServerOrNetwork { message: String },

    /// The requested resource does not exist.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Any other client-side rejection.
    #[error("Request rejected: {message}")]
    NonRetryable {
        status: Option<u16>,
        message: String,
    },

    /// A retryable failure persisted through every allowed attempt.
    #[error("{label} failed after {attempts} attempts ({kind}): {message}")]
    RetriesExhausted {
        label: String,
        attempts: u32,
        kind: ErrorKind,
        message: String,
    },

    /// The pull request itself is malformed.
    #[error("Invalid pull spec: {0}")]
    InvalidSpec(String),

    /// A success response that could not be decoded.
    #[error("Failed to decode {label}: {message}")]
    Decode { label: String, message: String },

    /// Client construction failed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IngestError {
    /// Create an auth error.
    #[inline]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a not found error.
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create an invalid spec error.
    #[inline]
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec(message.into())
    }

    /// Build the terminal error for a classified failure that will not be
    /// retried any further.
    pub fn from_failure(label: &str, kind: ErrorKind, failure: UpstreamFailure) -> Self {
        match (kind, &failure.origin) {
            (_, FailureOrigin::Decode) => Self::Decode {
                label: label.to_string(),
                message: failure.message,
            },
            (ErrorKind::Auth, _) => Self::Auth {
                message: failure.message,
            },
            (ErrorKind::NotFound, _) => Self::NotFound {
                resource: label.to_string(),
            },
            (ErrorKind::RateLimited, _) => Self::RateLimited {
                message: failure.message,
            },
            (ErrorKind::ServerOrNetwork, _) => Self::ServerOrNetwork {
                message: failure.message,
            },
            (ErrorKind::NonRetryable, origin) => Self::NonRetryable {
                status: match origin {
                    FailureOrigin::Status(s) => Some(*s),
                    _ => None,
                },
                message: failure.message,
            },
        }
    }

    /// Classification of this error, when it came from an upstream call.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Auth { .. } => Some(ErrorKind::Auth),
            Self::RateLimited { .. } => Some(ErrorKind::RateLimited),
            Self::ServerOrNetwork { .. } => Some(ErrorKind::ServerOrNetwork),
            Self::NotFound { .. } => Some(ErrorKind::NotFound),
            Self::NonRetryable { .. } | Self::Decode { .. } => Some(ErrorKind::NonRetryable),
            Self::RetriesExhausted { kind, .. } => Some(*kind),
            Self::InvalidSpec(_) | Self::Config(_) => None,
        }
    }

    /// Check if this error is a not-found error.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Pull the human-readable message out of a JSON error body.
///
/// GitHub answers `{"message": ...}`; Confluence answers `{"message": ...}` or
/// `{"errorMessages": [...]}`.
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    if let Some(message) = value.get("message").and_then(|m| m.as_str())
        && !message.is_empty()
    {
        return Some(message.to_string());
    }
    value
        .get("errorMessages")
        .and_then(|m| m.as_array())
        .and_then(|messages| messages.first())
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Result type for pull operations.
pub type Result<T> = std::result::Result<T, IngestError>;
