use std::sync::Arc;
use std::time::Instant;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde_json::{json, Map, Value};
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use super::{Inbound, Outcome, ProxyReply};
use crate::config::{AppConfig, ConfigError};
use crate::endpoint::{Endpoint, KeyStyle};
use crate::error::{AuthErrorKind, ProxyError, ValidationKind};
use crate::hooks::{HookContext, SessionEffects};
use crate::keys;
use crate::schema::{Issue, IssueCode, Mode, Schema};
use crate::session::Credential;
use crate::upstream::{Upstream, UpstreamRequest, UpstreamResponse};

/// Runs the validate -> forward -> validate pipeline for any endpoint.
///
/// Holds only immutable state: the config loaded at startup, the parsed
/// upstream base URL and the upstream client. One engine serves every
/// concurrent request.
pub struct ProxyEngine {
    config: Arc<AppConfig>,
    base_url: Url,
    upstream: Arc<dyn Upstream>,
}

impl ProxyEngine {
    pub fn new(config: Arc<AppConfig>, upstream: Arc<dyn Upstream>) -> Result<Self, ConfigError> {
        config.validate()?;
        let base_url = Url::parse(&config.upstream.base_url)
            .map_err(|_| ConfigError::InvalidBaseUrl(config.upstream.base_url.clone()))?;
        Ok(Self {
            config,
            base_url,
            upstream,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn execute(&self, endpoint: &Endpoint, inbound: Inbound) -> Result<ProxyReply, ProxyError> {
        let request_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("proxy", endpoint = endpoint.name, request_id = %request_id);

        async move {
            let started = Instant::now();
            let result = self.run(endpoint, inbound, &request_id).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match &result {
                Ok(reply) => tracing::info!(
                    status = reply.outcome.status().as_u16(),
                    documented = reply.outcome.kind(),
                    elapsed_ms,
                    "proxied {} {}",
                    endpoint.method,
                    endpoint.route
                ),
                Err(err) => tracing::info!(
                    status = err.status_code(),
                    category = err.category(),
                    elapsed_ms,
                    "rejected {} {}",
                    endpoint.method,
                    endpoint.route
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, endpoint: &Endpoint, inbound: Inbound, request_id: &str) -> Result<ProxyReply, ProxyError> {
        // Validate everything before touching the network
        let path = self.validate_path(endpoint, &inbound)?;
        let query = self.validate_query(endpoint, &inbound)?;
        let body = self.validate_body(endpoint, &inbound)?;

        let credential = inbound.session.resolve(endpoint.auth, endpoint.method.is_unsafe())?;
        if let Some(fingerprint) = credential.fingerprint() {
            tracing::debug!(credential = %fingerprint, "resolved {:?} credential", endpoint.auth);
        }

        let url = self.upstream_url(endpoint, &path, &query)?;
        let headers = self.upstream_headers(&credential, request_id)?;

        let response = self
            .upstream
            .send(UpstreamRequest {
                method: endpoint.method,
                url,
                headers,
                body,
            })
            .await
            .map_err(|e| {
                tracing::warn!("Upstream transport failure for {}: {}", endpoint.name, e);
                ProxyError::from(e)
            })?;

        let outcome = self.classify(endpoint, &response)?;

        let mut effects = SessionEffects::default();
        if !endpoint.hooks.is_empty() {
            let ctx = HookContext {
                outcome: &outcome,
                upstream_cookies: &response.set_cookies,
                session: &inbound.session,
                config: &self.config.session,
            };
            for hook in &endpoint.hooks {
                tracing::debug!("running session hook {}", hook.name());
                hook.on_success(&ctx, &mut effects);
            }
        }

        Ok(ProxyReply {
            outcome,
            effects,
            request_id: request_id.to_string(),
        })
    }

    fn validate_path(&self, endpoint: &Endpoint, inbound: &Inbound) -> Result<Map<String, Value>, ProxyError> {
        let raw: Map<String, Value> = inbound
            .path
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let params = parse_object(&endpoint.path, Value::Object(raw), Mode::Coerce, ValidationKind::Path, KeyStyle::Preserve)?;

        // URL path building resolves dot segments, which would retarget the upstream call
        let dot_segments: Vec<Issue> = params
            .iter()
            .filter(|(_, value)| matches!(value.as_str(), Some(".") | Some("..")))
            .map(|(name, _)| Issue::new(name.clone(), IssueCode::InvalidFormat, "Must not be a relative path segment"))
            .collect();
        if !dot_segments.is_empty() {
            return Err(validation_error(ValidationKind::Path, dot_segments, KeyStyle::Preserve));
        }

        Ok(params)
    }

    fn validate_query(&self, endpoint: &Endpoint, inbound: &Inbound) -> Result<Map<String, Value>, ProxyError> {
        let mut raw = Map::new();
        if let Some(query) = inbound.query.as_deref() {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                let key = inbound_key(&key, endpoint.keys);
                let value = Value::String(value.into_owned());
                match raw.get_mut(&key) {
                    Some(Value::Array(items)) => items.push(value),
                    Some(existing) => {
                        let first = existing.take();
                        *existing = Value::Array(vec![first, value]);
                    }
                    None => {
                        raw.insert(key, value);
                    }
                }
            }
        }
        parse_object(&endpoint.query, Value::Object(raw), Mode::Coerce, ValidationKind::Query, endpoint.keys)
    }

    fn validate_body(&self, endpoint: &Endpoint, inbound: &Inbound) -> Result<Option<Value>, ProxyError> {
        let Some(schema) = &endpoint.body else {
            return Ok(None);
        };

        let raw = if inbound.body.iter().all(u8::is_ascii_whitespace) {
            json!({})
        } else {
            serde_json::from_slice::<Value>(&inbound.body).map_err(|e| {
                ProxyError::validation(
                    ValidationKind::Body,
                    vec![Issue::new("", IssueCode::InvalidJson, format!("Malformed JSON: {}", e))],
                )
            })?
        };

        let raw = match endpoint.keys {
            KeyStyle::Camel => keys::rename_keys(raw, keys::to_snake),
            KeyStyle::Preserve => raw,
        };

        let parsed = schema
            .parse(&raw)
            .map_err(|issues| validation_error(ValidationKind::Body, issues, endpoint.keys))?;
        Ok(Some(parsed))
    }

    fn upstream_url(
        &self,
        endpoint: &Endpoint,
        path: &Map<String, Value>,
        query: &Map<String, Value>,
    ) -> Result<Url, ProxyError> {
        let segments = endpoint.upstream_segments(path).map_err(ProxyError::internal)?;

        let mut url = self.base_url.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|_| ProxyError::internal("upstream base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments.iter());

        let pairs: Vec<(&str, String)> = query
            .iter()
            .flat_map(|(key, value)| match value {
                Value::Array(items) => items.iter().filter_map(query_scalar).map(|v| (key.as_str(), v)).collect(),
                other => query_scalar(other).map(|v| vec![(key.as_str(), v)]).unwrap_or_default(),
            })
            .collect();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }

        Ok(url)
    }

    fn upstream_headers(&self, credential: &Credential, request_id: &str) -> Result<HeaderMap, ProxyError> {
        let session = &self.config.session;
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(request_id) {
            headers.insert("x-request-id", value);
        }

        match credential {
            Credential::Anonymous => {}
            Credential::Bearer(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|_| ProxyError::auth(AuthErrorKind::InvalidCredential))?;
                headers.insert(header::AUTHORIZATION, value);
            }
            Credential::Cookie { session: id, csrf } => {
                let mut cookie = format!("{}={}", session.session_cookie, id);
                if let Some(csrf) = csrf {
                    cookie.push_str(&format!("; {}={}", session.csrf_cookie, csrf));
                    let name = HeaderName::from_bytes(session.csrf_header.as_bytes())
                        .map_err(|_| ProxyError::internal("invalid CSRF header name"))?;
                    let value = HeaderValue::from_str(csrf)
                        .map_err(|_| ProxyError::auth(AuthErrorKind::InvalidCredential))?;
                    headers.insert(name, value);
                }
                let value = HeaderValue::from_str(&cookie)
                    .map_err(|_| ProxyError::auth(AuthErrorKind::InvalidCredential))?;
                headers.insert(header::COOKIE, value);
            }
        }

        Ok(headers)
    }

    /// Turn the upstream response into an outcome or a normalized error
    fn classify(&self, endpoint: &Endpoint, response: &UpstreamResponse) -> Result<Outcome, ProxyError> {
        let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);

        if response.is_success() {
            let body = self.validate_response(endpoint, &endpoint.response, response)?;
            return Ok(Outcome::success(status, body));
        }

        if let Some(documented) = endpoint.documented_status(response.status) {
            match self.validate_response(endpoint, &documented.schema, response) {
                Ok(body) => {
                    tracing::debug!("upstream {} classified as {}", response.status, documented.kind);
                    return Ok(Outcome::documented(documented.kind, status, body));
                }
                Err(_) => {
                    tracing::debug!(
                        "upstream {} did not match documented shape {}, treating as error",
                        response.status,
                        documented.kind
                    );
                }
            }
        }

        // Camel endpoints report every field name in camelCase, including upstream field errors
        let payload = response.json().map(|payload| match endpoint.keys {
            KeyStyle::Camel => keys::rename_keys(payload, keys::to_camel),
            KeyStyle::Preserve => payload,
        });
        tracing::warn!(
            status = response.status,
            structured = payload.is_some(),
            "upstream error for {}",
            endpoint.name
        );
        Err(ProxyError::upstream(response.status, payload))
    }

    fn validate_response(
        &self,
        endpoint: &Endpoint,
        schema: &Schema,
        response: &UpstreamResponse,
    ) -> Result<Option<Value>, ProxyError> {
        let raw = if response.is_empty() {
            Value::Null
        } else {
            response.json().ok_or_else(|| {
                tracing::error!(
                    status = response.status,
                    content_type = response.content_type.as_deref().unwrap_or("unknown"),
                    "upstream response for {} is not JSON",
                    endpoint.name
                );
                ProxyError::validation(
                    ValidationKind::Response,
                    vec![Issue::new("", IssueCode::InvalidJson, "Upstream response is not valid JSON")],
                )
            })?
        };

        let parsed = schema.parse_with(&raw, Mode::Response).map_err(|issues| {
            tracing::error!(
                "upstream response for {} violates its contract: {}",
                endpoint.name,
                issues.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("; ")
            );
            ProxyError::validation(ValidationKind::Response, issues)
        })?;

        if parsed.is_null() && response.is_empty() {
            return Ok(None);
        }

        Ok(Some(match endpoint.keys {
            KeyStyle::Camel => keys::rename_keys(parsed, keys::to_camel),
            KeyStyle::Preserve => parsed,
        }))
    }
}

fn parse_object(
    schema: &Schema,
    raw: Value,
    mode: Mode,
    kind: ValidationKind,
    keys: KeyStyle,
) -> Result<Map<String, Value>, ProxyError> {
    match schema.parse_with(&raw, mode) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Ok(Map::new()),
        Err(issues) => Err(validation_error(kind, issues, keys)),
    }
}

/// Report issue paths in the caller's key convention
fn validation_error(kind: ValidationKind, issues: Vec<Issue>, style: KeyStyle) -> ProxyError {
    let issues = match style {
        KeyStyle::Preserve => issues,
        KeyStyle::Camel => issues
            .into_iter()
            .map(|mut issue| {
                issue.path = keys::rename_path(&issue.path, keys::to_camel);
                issue
            })
            .collect(),
    };
    tracing::debug!("{} validation failed with {} issue(s)", kind, issues.len());
    ProxyError::validation(kind, issues)
}

fn inbound_key(key: &str, style: KeyStyle) -> String {
    match style {
        KeyStyle::Camel => keys::to_snake(key),
        KeyStyle::Preserve => key.to_string(),
    }
}

fn query_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
