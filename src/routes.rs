use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, RawQuery, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, on, MethodFilter, MethodRouter},
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{AppConfig, ConfigError};
use crate::endpoint::{Catalog, Endpoint, HttpMethod};
use crate::proxy::{Inbound, ProxyEngine};
use crate::session::SessionContext;
use crate::upstream::Upstream;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ProxyEngine>,
    pub catalog: Arc<Catalog>,
}

impl AppState {
    pub fn new(config: AppConfig, upstream: Arc<dyn Upstream>, catalog: Catalog) -> Result<Self, ConfigError> {
        let engine = ProxyEngine::new(Arc::new(config), upstream)?;
        Ok(Self {
            engine: Arc::new(engine),
            catalog: Arc::new(catalog),
        })
    }
}

pub fn app(state: AppState) -> Router {
    let config = state.engine.config().clone();

    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(catalog_routes(&state.catalog))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .with_state(state);

    if config.security.enable_cors {
        router = router.layer(cors_layer(&config));
    }
    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router
}

/// One axum route per inbound path; endpoints sharing a path become methods on it
fn catalog_routes(catalog: &Catalog) -> Router<AppState> {
    let mut routes: BTreeMap<&'static str, MethodRouter<AppState>> = BTreeMap::new();

    for endpoint in catalog.endpoints() {
        let ep = endpoint.clone();
        let handler = move |State(state): State<AppState>,
                            path: Option<Path<HashMap<String, String>>>,
                            RawQuery(query): RawQuery,
                            headers: HeaderMap,
                            body: Bytes| {
            let ep = ep.clone();
            async move { proxy_handler(state, ep, path, query, headers, body).await }
        };

        let filter = method_filter(endpoint.method);
        let method_router = match routes.remove(endpoint.route) {
            Some(existing) => existing.on(filter, handler),
            None => on(filter, handler),
        };
        routes.insert(endpoint.route, method_router);
    }

    routes
        .into_iter()
        .fold(Router::new(), |router, (path, method_router)| router.route(path, method_router))
}

async fn proxy_handler(
    state: AppState,
    endpoint: Arc<Endpoint>,
    path: Option<Path<HashMap<String, String>>>,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let inbound = Inbound {
        path: path.map(|Path(params)| params).unwrap_or_default(),
        query,
        body: body.to_vec(),
        session: SessionContext::from_headers(&headers, &state.engine.config().session),
    };

    match state.engine.execute(&endpoint, inbound).await {
        Ok(reply) => reply.into_response(),
        Err(err) => err.into_response(),
    }
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Patch => MethodFilter::PATCH,
        HttpMethod::Delete => MethodFilter::DELETE,
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    // `*` mirrors any requesting origin with credentials allowed; validation limits it to development
    if config.security.cors_origins.iter().any(|origin| origin == "*") {
        tracing::warn!("CORS origin '*' accepts credentialed requests from any site");
        return CorsLayer::very_permissive();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    let mut allow_headers = vec![header::CONTENT_TYPE, header::AUTHORIZATION, HeaderName::from_static("x-request-id")];
    if let Ok(csrf) = HeaderName::from_bytes(config.session.csrf_header.as_bytes()) {
        allow_headers.push(csrf);
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers(allow_headers)
        .expose_headers([HeaderName::from_static("x-request-id")])
        .allow_credentials(true)
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "BFF Gateway",
            "version": version,
            "description": "Validating backend-for-frontend proxy",
            "endpoints": state.catalog.len(),
        }
    }))
}

async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": {
                "status": "ok",
                "timestamp": now,
            }
        })),
    )
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "status": 404,
            "errors": [{ "message": "No such endpoint", "code": "not_found" }]
        })),
    )
}
