// src/provider/error.rs — Per-candidate error taxonomy
//
// ErrorInfo is data, not control flow: the fallback engine records one per
// failed candidate and only the aggregate ever reaches the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// DNS failure, connection refused/reset.
    Network,
    Timeout,
    /// 401 / 403.
    Auth,
    /// 429.
    RateLimited,
    /// Any 5xx.
    ServerError,
    /// 2xx with an unparseable or incomplete payload.
    InvalidResponse,
    /// Any other 4xx (bad request, unknown model, ...).
    Rejected,
    /// The adapter could not translate the request for this provider.
    InvalidRequest,
    /// Credentials for the model are not present in the environment.
    NotConfigured,
    AllProvidersExhausted,
    Cancelled,
}

impl ErrorKind {
    /// Transient failures worth another attempt against the same provider.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::RateLimited | ErrorKind::ServerError
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Auth => "auth",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ServerError => "server_error",
            ErrorKind::InvalidResponse => "invalid_response",
            ErrorKind::Rejected => "rejected",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::NotConfigured => "not_configured",
            ErrorKind::AllProvidersExhausted => "all_providers_exhausted",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// Map an HTTP status to an error kind. Only meaningful for non-2xx.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorKind::Auth,
            429 => ErrorKind::RateLimited,
            500..=599 => ErrorKind::ServerError,
            _ => ErrorKind::Rejected,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider_id: None,
            http_status: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider_id = Some(provider.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidResponse, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotConfigured, message)
    }

    /// Classify a non-2xx HTTP response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = ErrorKind::from_status(status);
        Self::new(kind, format!("HTTP {status}: {}", truncate_body(body))).with_status(status)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Provider error bodies can be whole HTML pages; keep log lines bounded.
fn truncate_body(body: &str) -> &str {
    const MAX: usize = 512;
    if body.len() <= MAX {
        return body.trim();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Auth);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Auth);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::RateLimited);
        assert_eq!(ErrorKind::from_status(500), ErrorKind::ServerError);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::ServerError);
        assert_eq!(ErrorKind::from_status(504), ErrorKind::ServerError);
        assert_eq!(ErrorKind::from_status(400), ErrorKind::Rejected);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::Rejected);
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(ErrorKind::ServerError.is_retryable());

        assert!(!ErrorKind::Auth.is_retryable());
        assert!(!ErrorKind::InvalidResponse.is_retryable());
        assert!(!ErrorKind::Rejected.is_retryable());
        assert!(!ErrorKind::InvalidRequest.is_retryable());
        assert!(!ErrorKind::NotConfigured.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
    }

    #[test]
    fn test_from_status_carries_status_and_body() {
        let err = ErrorInfo::from_status(503, "  upstream overloaded \n");
        assert_eq!(err.kind, ErrorKind::ServerError);
        assert_eq!(err.http_status, Some(503));
        assert_eq!(err.message, "HTTP 503: upstream overloaded");
    }

    #[test]
    fn test_long_body_truncated_on_char_boundary() {
        let body = "é".repeat(600);
        let err = ErrorInfo::from_status(500, &body);
        assert!(err.message.len() < 600);
    }

    #[test]
    fn test_display() {
        let err = ErrorInfo::new(ErrorKind::Auth, "bad key").with_provider("groq");
        assert_eq!(err.to_string(), "auth: bad key");
        assert_eq!(err.provider_id.as_deref(), Some("groq"));
    }
}
