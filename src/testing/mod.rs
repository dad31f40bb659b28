// Test doubles for the upstream seam, shared by unit and integration tests.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{TransportError, TransportKind};
use crate::upstream::{Upstream, UpstreamRequest, UpstreamResponse};

type Responder = Box<dyn Fn(&UpstreamRequest) -> Result<UpstreamResponse, TransportError> + Send + Sync>;

/// Upstream that answers from a closure and records every request it receives
pub struct StubUpstream {
    responder: Responder,
    calls: Mutex<Vec<UpstreamRequest>>,
}

impl StubUpstream {
    pub fn with<F>(responder: F) -> Self
    where
        F: Fn(&UpstreamRequest) -> Result<UpstreamResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answers `status` with `body` serialized as JSON
    pub fn json(status: u16, body: Value) -> Self {
        Self::with(move |_| Ok(json_response(status, &body)))
    }

    /// Answers 200 with the request body, or `{}` when there is none
    pub fn echo() -> Self {
        Self::with(|request| {
            let body = request.body.clone().unwrap_or_else(|| Value::Object(Default::default()));
            Ok(json_response(200, &body))
        })
    }

    pub fn empty(status: u16) -> Self {
        Self::with(move |_| {
            Ok(UpstreamResponse {
                status,
                ..UpstreamResponse::default()
            })
        })
    }

    pub fn failing(kind: TransportKind) -> Self {
        Self::with(move |_| Err(TransportError::new(kind, "stub transport failure")))
    }

    pub fn calls(&self) -> Vec<UpstreamRequest> {
        self.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<UpstreamRequest>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Upstream for StubUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        let result = (self.responder)(&request);
        self.lock().push(request);
        result
    }
}

pub fn json_response(status: u16, body: &Value) -> UpstreamResponse {
    UpstreamResponse {
        status,
        body: serde_json::to_vec(body).unwrap_or_default(),
        content_type: Some("application/json".to_string()),
        set_cookies: Vec::new(),
    }
}
