// Resource endpoint descriptors: one declarative entry per proxied action.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::hooks::SessionHook;
use crate::schema::Schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_method(&self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    /// Methods that change state need a CSRF token on cookie sessions
    pub fn is_unsafe(&self) -> bool {
        !matches!(self, HttpMethod::Get)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthRequirement {
    None,
    OptionalBearer,
    RequiredBearer,
    CookieSession,
}

/// Key convention at the inbound boundary. Schemas are always declared in upstream (snake_case) terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStyle {
    Preserve,
    Camel,
}

/// A non-2xx upstream status that is an expected, typed result rather than a failure
#[derive(Debug, Clone)]
pub struct DocumentedStatus {
    pub status: u16,
    pub kind: &'static str,
    pub schema: Schema,
}

#[derive(Clone)]
pub struct Endpoint {
    pub name: &'static str,
    pub method: HttpMethod,
    /// Inbound axum route, e.g. `/api/posts/:id`
    pub route: &'static str,
    /// Upstream path template, e.g. `/api/v1/posts/{id}/`
    pub upstream: &'static str,
    pub path: Schema,
    pub query: Schema,
    pub body: Option<Schema>,
    pub response: Schema,
    pub auth: AuthRequirement,
    pub keys: KeyStyle,
    pub documented: Vec<DocumentedStatus>,
    pub hooks: Vec<Arc<dyn SessionHook>>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("route", &self.route)
            .field("upstream", &self.upstream)
            .field("auth", &self.auth)
            .field("keys", &self.keys)
            .field("documented", &self.documented.iter().map(|d| d.status).collect::<Vec<_>>())
            .field("hooks", &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .finish()
    }
}

// Builder
impl Endpoint {
    pub fn new(name: &'static str, method: HttpMethod, route: &'static str, upstream: &'static str) -> Self {
        let path = route_params(route)
            .into_iter()
            .fold(Schema::object(), |schema, param| schema.field(param, Schema::string().min(1)));

        Self {
            name,
            method,
            route,
            upstream,
            path,
            query: Schema::object(),
            body: None,
            response: Schema::any(),
            auth: AuthRequirement::None,
            keys: KeyStyle::Preserve,
            documented: Vec::new(),
            hooks: Vec::new(),
        }
    }

    pub fn get(name: &'static str, route: &'static str, upstream: &'static str) -> Self {
        Self::new(name, HttpMethod::Get, route, upstream)
    }

    pub fn post(name: &'static str, route: &'static str, upstream: &'static str) -> Self {
        Self::new(name, HttpMethod::Post, route, upstream)
    }

    pub fn put(name: &'static str, route: &'static str, upstream: &'static str) -> Self {
        Self::new(name, HttpMethod::Put, route, upstream)
    }

    pub fn patch(name: &'static str, route: &'static str, upstream: &'static str) -> Self {
        Self::new(name, HttpMethod::Patch, route, upstream)
    }

    pub fn delete(name: &'static str, route: &'static str, upstream: &'static str) -> Self {
        Self::new(name, HttpMethod::Delete, route, upstream)
    }

    /// Replace the default string rule for one path parameter
    pub fn path_param(mut self, name: &str, schema: Schema) -> Self {
        self.path = self.path.field(name, schema);
        self
    }

    pub fn query(mut self, schema: Schema) -> Self {
        self.query = schema;
        self
    }

    pub fn body(mut self, schema: Schema) -> Self {
        self.body = Some(schema);
        self
    }

    pub fn returns(mut self, schema: Schema) -> Self {
        self.response = schema;
        self
    }

    pub fn auth(mut self, auth: AuthRequirement) -> Self {
        self.auth = auth;
        self
    }

    pub fn camel_case(mut self) -> Self {
        self.keys = KeyStyle::Camel;
        self
    }

    pub fn documented(mut self, status: u16, kind: &'static str, schema: Schema) -> Self {
        self.documented.push(DocumentedStatus { status, kind, schema });
        self
    }

    pub fn hook(mut self, hook: impl SessionHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }
}

impl Endpoint {
    pub fn documented_status(&self, status: u16) -> Option<&DocumentedStatus> {
        self.documented.iter().find(|d| d.status == status)
    }

    /// Upstream path segments with validated path params substituted
    pub fn upstream_segments(&self, params: &Map<String, Value>) -> Result<Vec<String>, String> {
        self.upstream
            .trim_start_matches('/')
            .split('/')
            .map(|segment| match placeholder(segment) {
                Some(name) => match params.get(name) {
                    Some(Value::String(s)) => Ok(s.clone()),
                    Some(Value::Number(n)) => Ok(n.to_string()),
                    Some(Value::Bool(b)) => Ok(b.to_string()),
                    _ => Err(format!("path parameter '{}' missing for {}", name, self.name)),
                },
                None => Ok(segment.to_string()),
            })
            .collect()
    }
}

fn route_params(route: &str) -> Vec<&str> {
    route.split('/').filter_map(|s| s.strip_prefix(':')).collect()
}

fn placeholder(segment: &str) -> Option<&str> {
    segment.strip_prefix('{').and_then(|s| s.strip_suffix('}'))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Duplicate endpoint name '{0}'")]
    DuplicateName(&'static str),

    #[error("Duplicate route {method} {route}")]
    DuplicateRoute { method: HttpMethod, route: &'static str },

    #[error("Endpoint '{endpoint}' uses upstream placeholder '{param}' that is not a path parameter")]
    UnboundPlaceholder { endpoint: &'static str, param: String },

    #[error("Endpoint '{endpoint}' route must start with '/': {route}")]
    InvalidRoute { endpoint: &'static str, route: &'static str },
}

/// The immutable set of endpoints served by one gateway
#[derive(Debug, Clone)]
pub struct Catalog {
    endpoints: Vec<Arc<Endpoint>>,
}

impl Catalog {
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self, CatalogError> {
        let mut names = HashSet::new();
        let mut routes = HashSet::new();

        for endpoint in &endpoints {
            if !endpoint.route.starts_with('/') || !endpoint.upstream.starts_with('/') {
                return Err(CatalogError::InvalidRoute {
                    endpoint: endpoint.name,
                    route: endpoint.route,
                });
            }
            if !names.insert(endpoint.name) {
                return Err(CatalogError::DuplicateName(endpoint.name));
            }
            if !routes.insert((endpoint.method, endpoint.route)) {
                return Err(CatalogError::DuplicateRoute {
                    method: endpoint.method,
                    route: endpoint.route,
                });
            }
            let declared = endpoint.path.field_names();
            for segment in endpoint.upstream.split('/') {
                if let Some(param) = placeholder(segment) {
                    if !declared.contains(&param) || !route_params(endpoint.route).contains(&param) {
                        return Err(CatalogError::UnboundPlaceholder {
                            endpoint: endpoint.name,
                            param: param.to_string(),
                        });
                    }
                }
            }
        }

        Ok(Self {
            endpoints: endpoints.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Endpoint>> {
        self.endpoints.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
