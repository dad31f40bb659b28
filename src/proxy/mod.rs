// Validated proxy pipeline: inbound request -> upstream call -> normalized reply

mod engine;

pub use engine::ProxyEngine;

use std::collections::HashMap;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::hooks::SessionEffects;
use crate::session::SessionContext;

/// Everything the engine needs from one inbound request
#[derive(Debug, Clone, Default)]
pub struct Inbound {
    pub path: HashMap<String, String>,
    pub query: Option<String>,
    pub body: Vec<u8>,
    pub session: SessionContext,
}

/// A non-error result of a proxied call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 2xx that satisfied the response schema
    Success { status: StatusCode, body: Option<Value> },
    /// Non-2xx status the endpoint declares as an expected result
    Documented {
        kind: &'static str,
        status: StatusCode,
        body: Option<Value>,
    },
}

impl Outcome {
    pub fn success(status: StatusCode, body: Option<Value>) -> Self {
        Outcome::Success { status, body }
    }

    pub fn documented(kind: &'static str, status: StatusCode, body: Option<Value>) -> Self {
        Outcome::Documented { kind, status, body }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::Success { status, .. } | Outcome::Documented { status, .. } => *status,
        }
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            Outcome::Success { body, .. } | Outcome::Documented { body, .. } => body.as_ref(),
        }
    }

    /// The documented kind, e.g. `totp_not_configured`
    pub fn kind(&self) -> Option<&'static str> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Documented { kind, .. } => Some(*kind),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProxyReply {
    pub outcome: Outcome,
    pub effects: SessionEffects,
    pub request_id: String,
}

impl IntoResponse for ProxyReply {
    fn into_response(self) -> Response {
        let ProxyReply {
            outcome,
            effects,
            request_id,
        } = self;

        let (status, body) = match outcome {
            Outcome::Success { status, body } | Outcome::Documented { status, body, .. } => (status, body),
        };

        let mut response = match body {
            Some(body) => (status, Json(body)).into_response(),
            None => status.into_response(),
        };

        let headers = response.headers_mut();
        for cookie in effects.set_cookies() {
            match HeaderValue::from_str(cookie) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(e) => tracing::warn!("Dropping unrepresentable Set-Cookie value: {}", e),
            }
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert("x-request-id", value);
        }

        response
    }
}
