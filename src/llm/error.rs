//! Typed errors for LLM provider calls.

use std::fmt;

use thiserror::Error;

/// Broad category of an LLM call failure.
///
/// The category is what callers dispatch on; the message carries provider
/// detail for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Connection, DNS, or timeout failure before a response arrived.
    Network,
    /// 401/403 from the provider.
    Auth,
    /// 429 from the provider.
    RateLimited,
    /// 5xx from the provider.
    ServerError,
    /// Other 4xx from the provider (bad request, unknown model, ...).
    ClientError,
    /// Response body could not be parsed.
    Parse,
}

impl fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LlmErrorKind::Network => "network",
            LlmErrorKind::Auth => "auth",
            LlmErrorKind::RateLimited => "rate_limited",
            LlmErrorKind::ServerError => "server_error",
            LlmErrorKind::ClientError => "client_error",
            LlmErrorKind::Parse => "parse",
        };
        f.write_str(name)
    }
}

/// An LLM provider call failure.
#[derive(Debug, Clone, Error)]
#[error("llm {kind} error: {message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
    /// HTTP status, when the failure came from a provider response.
    pub status: Option<u16>,
}

impl LlmError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::Network,
            message: message.into(),
            status: None,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: LlmErrorKind::Parse,
            message: message.into(),
            status: None,
        }
    }

    /// Build an error from an HTTP response status and body.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            kind: classify_http_status(status),
            message: body.into(),
            status: Some(status),
        }
    }
}

/// Map an HTTP status code onto an error category.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        401 | 403 => LlmErrorKind::Auth,
        429 => LlmErrorKind::RateLimited,
        400..=499 => LlmErrorKind::ClientError,
        500..=599 => LlmErrorKind::ServerError,
        _ => LlmErrorKind::ServerError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(classify_http_status(401), LlmErrorKind::Auth);
        assert_eq!(classify_http_status(403), LlmErrorKind::Auth);
        assert_eq!(classify_http_status(429), LlmErrorKind::RateLimited);
        assert_eq!(classify_http_status(404), LlmErrorKind::ClientError);
        assert_eq!(classify_http_status(500), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(503), LlmErrorKind::ServerError);
    }

    #[test]
    fn from_status_carries_status_code() {
        let err = LlmError::from_status(429, "slow down");
        assert_eq!(err.kind, LlmErrorKind::RateLimited);
        assert_eq!(err.status, Some(429));
        assert!(err.to_string().contains("rate_limited"));
    }
}
