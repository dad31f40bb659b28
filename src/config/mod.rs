use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid upstream base URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("Invalid setting {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub session: SessionConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Whole-request timeout. `None` leaves the HTTP client default (no timeout).
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Cookie holding the access token stored by login endpoints
    pub token_cookie: String,
    pub token_max_age_secs: u64,
    /// Django session cookie relayed for cookie-session endpoints
    pub session_cookie: String,
    pub csrf_cookie: String,
    pub csrf_header: String,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    /// Preset for `APP_ENV`, then the optional `BFF_CONFIG_FILE`, then env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::for_environment(Self::environment_from_env());

        if let Ok(path) = env::var("BFF_CONFIG_FILE") {
            config = Self::from_file(&path)?;
        }

        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        Self::from_yaml(&raw).map_err(|source| ConfigError::Parse { path: display, source })
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    fn environment_from_env() -> Environment {
        match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        }
    }

    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("BFF_HOST") {
            self.server.host = v;
        }
        if let Some(port) = env::var("BFF_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }

        // Upstream overrides
        if let Ok(v) = env::var("UPSTREAM_BASE_URL") {
            self.upstream.base_url = v;
        }
        if let Ok(v) = env::var("UPSTREAM_TIMEOUT_SECS") {
            self.upstream.timeout_secs = override_secs("UPSTREAM_TIMEOUT_SECS", &v, self.upstream.timeout_secs);
        }
        if let Ok(v) = env::var("UPSTREAM_CONNECT_TIMEOUT_SECS") {
            self.upstream.connect_timeout_secs =
                override_secs("UPSTREAM_CONNECT_TIMEOUT_SECS", &v, self.upstream.connect_timeout_secs);
        }
        if let Ok(v) = env::var("UPSTREAM_USER_AGENT") {
            self.upstream.user_agent = v;
        }

        // Session overrides
        if let Ok(v) = env::var("SESSION_TOKEN_COOKIE") {
            self.session.token_cookie = v;
        }
        if let Ok(v) = env::var("SESSION_TOKEN_MAX_AGE_SECS") {
            self.session.token_max_age_secs = v.parse().unwrap_or(self.session.token_max_age_secs);
        }
        if let Ok(v) = env::var("SESSION_COOKIE") {
            self.session.session_cookie = v;
        }
        if let Ok(v) = env::var("SESSION_CSRF_COOKIE") {
            self.session.csrf_cookie = v;
        }
        if let Ok(v) = env::var("SESSION_CSRF_HEADER") {
            self.session.csrf_header = v;
        }
        if let Ok(v) = env::var("SESSION_COOKIE_SECURE") {
            self.session.cookie_secure = v.parse().unwrap_or(self.session.cookie_secure);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.upstream.base_url)
            .map_err(|_| ConfigError::InvalidBaseUrl(self.upstream.base_url.clone()))?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl(self.upstream.base_url.clone()));
        }
        if self.session.token_cookie.is_empty() || self.session.session_cookie.is_empty() {
            return Err(ConfigError::Invalid {
                field: "session",
                message: "cookie names must not be empty".to_string(),
            });
        }
        if self.environment != Environment::Development && self.security.cors_origins.iter().any(|o| o == "*") {
            return Err(ConfigError::Invalid {
                field: "security.cors_origins",
                message: "'*' is only allowed in development; list the origins explicitly".to_string(),
            });
        }
        if self.upstream.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "upstream.timeout_secs",
                message: "must be greater than zero when set".to_string(),
            });
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            upstream: UpstreamConfig {
                base_url: "http://127.0.0.1:8000".to_string(),
                timeout_secs: None,
                connect_timeout_secs: None,
                user_agent: concat!("bff-gateway/", env!("CARGO_PKG_VERSION")).to_string(),
            },
            session: SessionConfig {
                token_cookie: "auth_token".to_string(),
                token_max_age_secs: 60 * 60 * 24 * 7, // 1 week
                session_cookie: "sessionid".to_string(),
                csrf_cookie: "csrftoken".to_string(),
                csrf_header: "X-CSRFToken".to_string(),
                cookie_secure: false,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.server.host = "0.0.0.0".to_string();
        config.upstream.base_url = "https://api.staging.example.com".to_string();
        config.session.token_max_age_secs = 60 * 60 * 24;
        config.session.cookie_secure = true;
        config.api.max_request_size_bytes = 5 * 1024 * 1024; // 5MB
        config.security.cors_origins = vec!["https://staging.example.com".to_string()];
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.server.host = "0.0.0.0".to_string();
        config.upstream.base_url = "https://api.example.com".to_string();
        config.session.token_max_age_secs = 60 * 60 * 4;
        config.session.cookie_secure = true;
        config.api.enable_request_logging = false;
        config.api.max_request_size_bytes = 2 * 1024 * 1024; // 2MB
        config.security.cors_origins = vec!["https://app.example.com".to_string()];
        config
    }
}

/// Unparsable values keep the current setting instead of disabling it
fn override_secs(name: &str, raw: &str, current: Option<u64>) -> Option<u64> {
    match raw.trim().parse() {
        Ok(secs) => Some(secs),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}='{}', keeping {:?}", name, raw, current);
            current
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::development()
    }
}
