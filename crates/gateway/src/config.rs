//! Gateway configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional; the gateway holds no credentials of its own.
//! Operators supply contract and client credentials per request.
//!
//! - `GATEWAY_HOST` - Bind address (default: 127.0.0.1)
//! - `GATEWAY_PORT` - Listen port (default: 8888)
//! - `SMAREGI_DEV_ID_BASE` - Token endpoint base for `dev` (default: <https://id.smaregi.dev/app>)
//! - `SMAREGI_DEV_API_BASE` - REST API base for `dev` (default: <https://api.smaregi.dev>)
//! - `SMAREGI_PROD_ID_BASE` - Token endpoint base for `prod` (default: <https://id.smaregi.jp/app>)
//! - `SMAREGI_PROD_API_BASE` - REST API base for `prod` (default: <https://api.smaregi.jp>)
//! - `SMAREGI_SCOPE` - Scopes requested at token exchange
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 1.0)
//! - `GATEWAY_LOG_JSON` - Emit JSON logs when set (any value)

use std::net::{IpAddr, SocketAddr};

use display_toggle_core::Environment;
use thiserror::Error;
use url::Url;

/// Scopes needed to read and toggle products and categories.
pub const DEFAULT_SCOPE: &str =
    "pos.products:read pos.products:write pos.categories:read pos.categories:write";

const DEFAULT_PORT: &str = "8888";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Vendor base URLs per environment
    pub endpoints: VendorEndpoints,
    /// Scopes requested when exchanging client credentials
    pub scope: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// Emit JSON-formatted logs
    pub log_json: bool,
}

/// Vendor identity and API base URLs for both deployments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorEndpoints {
    /// Token endpoint base for `dev`
    pub dev_id_base: Url,
    /// REST API base for `dev`
    pub dev_api_base: Url,
    /// Token endpoint base for `prod`
    pub prod_id_base: Url,
    /// REST API base for `prod`
    pub prod_api_base: Url,
}

impl VendorEndpoints {
    /// Point both environments at the same identity and API hosts.
    ///
    /// Useful for sandboxes and local stand-ins of the vendor API.
    #[must_use]
    pub fn uniform(id_base: Url, api_base: Url) -> Self {
        Self {
            dev_id_base: id_base.clone(),
            dev_api_base: api_base.clone(),
            prod_id_base: id_base,
            prod_api_base: api_base,
        }
    }

    /// Identity base URL for an environment.
    #[must_use]
    pub const fn id_base(&self, environment: Environment) -> &Url {
        match environment {
            Environment::Dev => &self.dev_id_base,
            Environment::Prod => &self.prod_id_base,
        }
    }

    /// REST API base URL for an environment.
    #[must_use]
    pub const fn api_base(&self, environment: Environment) -> &Url {
        match environment {
            Environment::Dev => &self.dev_api_base,
            Environment::Prod => &self.prod_api_base,
        }
    }

    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dev_id_base: get_url_or_default(
                "SMAREGI_DEV_ID_BASE",
                Environment::Dev.default_id_base(),
            )?,
            dev_api_base: get_url_or_default(
                "SMAREGI_DEV_API_BASE",
                Environment::Dev.default_api_base(),
            )?,
            prod_id_base: get_url_or_default(
                "SMAREGI_PROD_ID_BASE",
                Environment::Prod.default_id_base(),
            )?,
            prod_api_base: get_url_or_default(
                "SMAREGI_PROD_API_BASE",
                Environment::Prod.default_api_base(),
            )?,
        })
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("GATEWAY_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("GATEWAY_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("GATEWAY_PORT", DEFAULT_PORT)
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("GATEWAY_PORT".to_string(), e.to_string()))?;
        let endpoints = VendorEndpoints::from_env()?;
        let scope = get_env_or_default("SMAREGI_SCOPE", DEFAULT_SCOPE);
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let log_json = get_optional_env("GATEWAY_LOG_JSON").is_some();

        Ok(Self {
            host,
            port,
            endpoints,
            scope,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            log_json,
        })
    }

    /// Configuration with the given vendor endpoints and defaults for
    /// everything else (no Sentry, text logs, port 8888).
    #[must_use]
    pub fn with_endpoints(endpoints: VendorEndpoints) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 8888,
            endpoints,
            scope: DEFAULT_SCOPE.to_string(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
            log_json: false,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

/// Get an environment variable or a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Get a URL-valued environment variable or a default.
fn get_url_or_default(key: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = get_env_or_default(key, default);
    let url =
        Url::parse(&raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(url)
}
