//! Request-level error types
//!
//! `TransportError` is what a transport reports; `GatewayError` is what the
//! caller sees, always tagged with the target domain and path.

use crate::retry::{RetryClassification, RetryableError};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Failure reported by a [`Transport`](crate::Transport) before any response
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection refused, DNS failure, offline
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Connect timeout")]
    ConnectTimeout,

    #[error("Send timeout")]
    SendTimeout,

    #[error("Receive timeout")]
    ReceiveTimeout,

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Connect(_) => ErrorKind::Connectivity,
            TransportError::ConnectTimeout => ErrorKind::ConnectTimeout,
            TransportError::SendTimeout => ErrorKind::SendTimeout,
            TransportError::ReceiveTimeout => ErrorKind::ReceiveTimeout,
            TransportError::Tls(_) => ErrorKind::Tls,
            TransportError::Cancelled => ErrorKind::Cancelled,
            TransportError::Other(_) => ErrorKind::Unknown,
        }
    }
}

/// Classification of a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Transport
    Connectivity,
    ConnectTimeout,
    ReceiveTimeout,
    SendTimeout,
    Cancelled,
    Tls,

    // Client errors (4xx)
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    RequestTimeout,
    Conflict,
    UnprocessableEntity,
    TooManyRequests,
    ClientError,

    // Server errors (5xx)
    InternalServerError,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    ServerError,

    /// Non-2xx status outside 4xx/5xx
    BadResponse,

    // Pipeline
    AuthenticationRequired,
    CacheMiss,
    Unknown,
}

impl ErrorKind {
    /// Classify a non-success response status
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorKind::BadRequest,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            408 => ErrorKind::RequestTimeout,
            409 => ErrorKind::Conflict,
            422 => ErrorKind::UnprocessableEntity,
            429 => ErrorKind::TooManyRequests,
            400..=499 => ErrorKind::ClientError,
            500 => ErrorKind::InternalServerError,
            502 => ErrorKind::BadGateway,
            503 => ErrorKind::ServiceUnavailable,
            504 => ErrorKind::GatewayTimeout,
            500..=599 => ErrorKind::ServerError,
            _ => ErrorKind::BadResponse,
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::BadRequest
                | ErrorKind::Unauthorized
                | ErrorKind::Forbidden
                | ErrorKind::NotFound
                | ErrorKind::RequestTimeout
                | ErrorKind::Conflict
                | ErrorKind::UnprocessableEntity
                | ErrorKind::TooManyRequests
                | ErrorKind::ClientError
        )
    }

    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::InternalServerError
                | ErrorKind::BadGateway
                | ErrorKind::ServiceUnavailable
                | ErrorKind::GatewayTimeout
                | ErrorKind::ServerError
        )
    }

    /// The server answered, but not with 2xx
    pub fn is_bad_response(&self) -> bool {
        self.is_client_error() || self.is_server_error() || *self == ErrorKind::BadResponse
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ErrorKind::ConnectTimeout | ErrorKind::ReceiveTimeout | ErrorKind::SendTimeout
        )
    }

    /// No usable answer reached us; eligible for network-failure fallback
    pub fn is_network_failure(&self) -> bool {
        *self == ErrorKind::Connectivity || self.is_timeout()
    }

    /// 401 / 403
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ErrorKind::Unauthorized | ErrorKind::Forbidden)
    }

    /// Transient conditions the retry stage handles locally
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::Connectivity
                | ErrorKind::ConnectTimeout
                | ErrorKind::ReceiveTimeout
                | ErrorKind::SendTimeout
                | ErrorKind::Unknown
                | ErrorKind::BadGateway
                | ErrorKind::ServiceUnavailable
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::ConnectTimeout => "connect_timeout",
            ErrorKind::ReceiveTimeout => "receive_timeout",
            ErrorKind::SendTimeout => "send_timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Tls => "tls",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RequestTimeout => "request_timeout",
            ErrorKind::Conflict => "conflict",
            ErrorKind::UnprocessableEntity => "unprocessable_entity",
            ErrorKind::TooManyRequests => "too_many_requests",
            ErrorKind::ClientError => "client_error",
            ErrorKind::InternalServerError => "internal_server_error",
            ErrorKind::BadGateway => "bad_gateway",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::GatewayTimeout => "gateway_timeout",
            ErrorKind::ServerError => "server_error",
            ErrorKind::BadResponse => "bad_response",
            ErrorKind::AuthenticationRequired => "authentication_required",
            ErrorKind::CacheMiss => "cache_miss",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure returned by [`Gateway::execute`](crate::Gateway::execute)
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} ({kind}, domain: {domain}, path: {path})")]
pub struct GatewayError {
    pub kind: ErrorKind,
    /// Human-readable description
    pub message: String,
    pub domain: String,
    pub path: String,
    pub status_code: Option<u16>,
    /// Raw response body, when the server answered
    pub body: Option<Value>,
}

impl GatewayError {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        domain: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            domain: domain.into(),
            path: path.into(),
            status_code: None,
            body: None,
        }
    }

    /// Non-2xx response
    pub fn from_status(
        status: u16,
        body: Value,
        domain: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        let kind = ErrorKind::from_status(status);
        Self {
            kind,
            message: format!("HTTP {}: {}", status, status_reason(kind)),
            domain: domain.into(),
            path: path.into(),
            status_code: Some(status),
            body: if body.is_null() { None } else { Some(body) },
        }
    }

    pub fn from_transport(
        err: &TransportError,
        domain: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self::new(err.kind(), err.to_string(), domain, path)
    }

    pub fn cache_miss(domain: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::CacheMiss,
            "No cached response available",
            domain,
            path,
        )
    }

    pub fn authentication_required(domain: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::AuthenticationRequired,
            "Authentication required but no token is available",
            domain,
            path,
        )
    }

    pub fn is_auth_failure(&self) -> bool {
        self.kind.is_auth_failure()
    }
}

impl RetryableError for GatewayError {
    fn classify(&self) -> RetryClassification {
        if self.kind.is_transient() {
            RetryClassification::Retry
        } else {
            RetryClassification::NoRetry
        }
    }
}

fn status_reason(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::BadRequest => "Bad request",
        ErrorKind::Unauthorized => "Unauthorized",
        ErrorKind::Forbidden => "Forbidden",
        ErrorKind::NotFound => "Not found",
        ErrorKind::RequestTimeout => "Request timeout",
        ErrorKind::Conflict => "Conflict",
        ErrorKind::UnprocessableEntity => "Unprocessable entity",
        ErrorKind::TooManyRequests => "Too many requests",
        ErrorKind::ClientError => "Client error",
        ErrorKind::InternalServerError => "Internal server error",
        ErrorKind::BadGateway => "Bad gateway",
        ErrorKind::ServiceUnavailable => "Service unavailable",
        ErrorKind::GatewayTimeout => "Gateway timeout",
        ErrorKind::ServerError => "Server error",
        _ => "Unexpected response",
    }
}
