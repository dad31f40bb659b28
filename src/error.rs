// Proxy error taxonomy and the normalized error envelope
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

use crate::schema::Issue;

/// Which part of the exchange failed its schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    Path,
    Query,
    Body,
    /// The upstream answered 2xx with a payload that breaks the contract
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorKind {
    Unauthenticated,
    InvalidCredential,
    CsrfMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Connect,
    Timeout,
    Other,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValidationKind::Path => "path",
            ValidationKind::Query => "query",
            ValidationKind::Body => "body",
            ValidationKind::Response => "response",
        })
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportKind::Connect => "connect",
            TransportKind::Timeout => "timeout",
            TransportKind::Other => "other",
        })
    }
}

impl AuthErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            AuthErrorKind::Unauthenticated => "unauthenticated",
            AuthErrorKind::InvalidCredential => "invalid_credential",
            AuthErrorKind::CsrfMissing => "csrf_missing",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            AuthErrorKind::Unauthenticated => "Authentication credentials were not provided",
            AuthErrorKind::InvalidCredential => "Authorization header must use the Bearer scheme",
            AuthErrorKind::CsrfMissing => "CSRF token missing",
        }
    }
}

/// Transport-level failure reaching the upstream
#[derive(Debug, Error)]
#[error("{kind} failure: {message}")]
pub struct TransportError {
    pub kind: TransportKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportKind::Timeout
        } else if err.is_connect() {
            TransportKind::Connect
        } else {
            TransportKind::Other
        };
        TransportError::new(kind, err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{kind} validation failed: {}", summarize(.issues))]
    Validation { kind: ValidationKind, issues: Vec<Issue> },

    #[error("Authentication error: {kind}")]
    Auth { kind: AuthErrorKind },

    #[error("Upstream responded with status {status}")]
    Upstream { status: u16, payload: Option<Value> },

    #[error("Upstream transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn summarize(issues: &[Issue]) -> String {
    issues.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("; ")
}

// Constructors
impl ProxyError {
    pub fn validation(kind: ValidationKind, issues: Vec<Issue>) -> Self {
        ProxyError::Validation { kind, issues }
    }

    pub fn auth(kind: AuthErrorKind) -> Self {
        ProxyError::Auth { kind }
    }

    pub fn upstream(status: u16, payload: Option<Value>) -> Self {
        ProxyError::Upstream { status, payload }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ProxyError::Internal(message.into())
    }
}

impl ProxyError {
    /// HTTP status returned to the inbound caller
    pub fn status_code(&self) -> u16 {
        match self {
            ProxyError::Validation { kind: ValidationKind::Response, .. } => 502,
            ProxyError::Validation { .. } => 400,
            ProxyError::Auth { kind: AuthErrorKind::CsrfMissing } => 403,
            ProxyError::Auth { .. } => 401,
            ProxyError::Upstream { status, .. } => *status,
            ProxyError::Transport(err) => match err.kind {
                TransportKind::Timeout => 504,
                _ => 502,
            },
            ProxyError::Internal(_) => 500,
        }
    }

    /// Error category for logs and metrics labels
    pub fn category(&self) -> &'static str {
        match self {
            ProxyError::Validation { .. } => "validation",
            ProxyError::Auth { .. } => "auth",
            ProxyError::Upstream { .. } => "upstream",
            ProxyError::Transport(_) => "transport",
            ProxyError::Internal(_) => "internal",
        }
    }

    /// Envelope body; `None` means a bare status with no body
    pub fn to_json(&self) -> Option<Value> {
        let status = self.status_code();
        match self {
            ProxyError::Validation { kind: ValidationKind::Response, .. } => Some(json!({
                "status": status,
                "errors": [{
                    "message": "The upstream response did not match the expected contract",
                    "code": "invalid_upstream_response"
                }]
            })),
            ProxyError::Validation { kind, issues } => {
                let errors: Vec<Value> = issues
                    .iter()
                    .map(|issue| {
                        let mut error = json!({
                            "message": issue.message,
                            "code": issue.code.as_str(),
                            "location": kind,
                        });
                        if let Some(param) = issue.param() {
                            error["param"] = json!(param);
                        }
                        error
                    })
                    .collect();
                Some(json!({ "status": status, "errors": errors }))
            }
            ProxyError::Auth { kind } => Some(json!({
                "status": status,
                "errors": [{ "message": kind.message(), "code": kind.code() }]
            })),
            ProxyError::Upstream { payload, .. } => payload.clone(),
            ProxyError::Transport(err) => {
                let (code, message) = match err.kind {
                    TransportKind::Timeout => ("upstream_timeout", "The upstream service did not respond in time"),
                    _ => ("upstream_unreachable", "The upstream service is unavailable"),
                };
                Some(json!({
                    "status": status,
                    "errors": [{ "message": message, "code": code }]
                }))
            }
            ProxyError::Internal(_) => Some(json!({
                "status": status,
                "errors": [{ "message": "An error occurred while processing your request", "code": "internal_error" }]
            })),
        }
    }
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
        match self.to_json() {
            Some(body) => (status, Json(body)).into_response(),
            None => status.into_response(),
        }
    }
}
