#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use bff_gateway::catalog::default_catalog;
use bff_gateway::config::AppConfig;
use bff_gateway::routes::{app, AppState};
use bff_gateway::upstream::HttpUpstream;

/// Canned answer for one (method, path) on the stub backend
#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub body: Option<Value>,
    pub cookies: Vec<String>,
}

impl Canned {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
            cookies: Vec::new(),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: None,
            cookies: Vec::new(),
        }
    }

    pub fn with_cookie(mut self, cookie: &str) -> Self {
        self.cookies.push(cookie.to_string());
        self
    }
}

/// A request as the stub backend saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

#[derive(Clone, Default)]
struct StubState {
    routes: Arc<Mutex<HashMap<(Method, String), Canned>>>,
    hits: Arc<Mutex<Vec<Recorded>>>,
}

/// In-process backend on its own port. Unregistered paths echo the JSON body with 200.
pub struct StubBackend {
    pub base_url: String,
    state: StubState,
}

impl StubBackend {
    pub async fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind stub backend on {}", port))?;

        let state = StubState::default();
        let router = Router::new().fallback(respond).with_state(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
        })
    }

    pub fn on(&self, method: Method, path: &str, canned: Canned) {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), canned);
    }

    pub fn hits(&self) -> Vec<Recorded> {
        self.state.hits.lock().unwrap().clone()
    }

    pub fn hit_count(&self) -> usize {
        self.state.hits.lock().unwrap().len()
    }

    pub fn last_hit(&self) -> Option<Recorded> {
        self.state.hits.lock().unwrap().last().cloned()
    }
}

async fn respond(
    State(state): State<StubState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let parsed: Option<Value> = serde_json::from_slice(&body).ok();
    state.hits.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body: parsed.clone(),
    });

    let canned = state
        .routes
        .lock()
        .unwrap()
        .get(&(method, uri.path().to_string()))
        .cloned();

    let Some(canned) = canned else {
        return (StatusCode::OK, Json(parsed.unwrap_or_else(|| json!({})))).into_response();
    };

    let status = StatusCode::from_u16(canned.status).unwrap();
    let mut response = match canned.body {
        Some(body) => (status, Json(body)).into_response(),
        None => status.into_response(),
    };
    for cookie in canned.cookies {
        response
            .headers_mut()
            .append(header::SET_COOKIE, HeaderValue::from_str(&cookie).unwrap());
    }
    response
}

pub fn config_for(stub: &StubBackend) -> AppConfig {
    let mut config = AppConfig::default();
    config.upstream.base_url = stub.base_url.clone();
    config.upstream.timeout_secs = Some(5);
    config.api.enable_request_logging = false;
    config
}

/// Gateway router with the default catalog, wired to the stub backend over real HTTP
pub fn gateway(stub: &StubBackend) -> Result<Router> {
    gateway_with(config_for(stub))
}

pub fn gateway_with(config: AppConfig) -> Result<Router> {
    let upstream = HttpUpstream::new(&config.upstream)?;
    let state = AppState::new(config, Arc::new(upstream), default_catalog()?)?;
    Ok(app(state))
}

/// Serve the gateway on its own port, for tests that go through a real client
pub async fn spawn_gateway(stub: &StubBackend) -> Result<String> {
    let router = gateway(stub)?;
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    let base_url = format!("http://127.0.0.1:{}", port);
    wait_ready(&base_url, Duration::from_secs(5)).await?;
    Ok(base_url)
}

async fn wait_ready(base_url: &str, timeout: Duration) -> Result<()> {
    let client = reqwest::Client::new();
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if let Ok(resp) = client.get(format!("{}/health", base_url)).send().await {
            if resp.status().is_success() {
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    anyhow::bail!("gateway did not become ready on {} within {:?}", base_url, timeout)
}

/// What the gateway answered, with the body decoded (`Null` when empty)
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    pub fn error_code(&self) -> Option<&str> {
        self.body["errors"][0]["code"].as_str()
    }
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> Result<Reply> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };

    let response = router.clone().oneshot(request).await?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).context("gateway answered with non-JSON body")?
    };

    Ok(Reply { status, headers, body })
}

pub async fn get(router: &Router, uri: &str, headers: &[(&str, &str)]) -> Result<Reply> {
    send(router, Method::GET, uri, headers, None).await
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

pub fn email_list(emails: &[&str]) -> Value {
    let data: Vec<Value> = emails
        .iter()
        .enumerate()
        .map(|(i, email)| json!({"email": email, "primary": i == 0, "verified": true}))
        .collect();
    json!({"status": 200, "data": data})
}

pub fn post_payload(id: i64, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "slug": title.to_lowercase().replace(' ', "-"),
        "content": "Body text",
        "author": {"id": 3, "display_name": "Ada"},
        "tags": ["rust"],
        "published_at": null,
        "comment_count": 0
    })
}

pub fn session_payload(access_token: &str) -> Value {
    json!({
        "status": 200,
        "data": {
            "user": {"id": 1, "display": "ada", "has_usable_password": true, "email": "ada@example.com"},
            "methods": [{"method": "password", "at": 1700000000.0}]
        },
        "meta": {"is_authenticated": true, "access_token": access_token}
    })
}
