//! Console configuration.
//!
//! Front ends resolve these from flags or the environment:
//!
//! - `DISPLAY_TOGGLE_GATEWAY_URL` - Gateway base URL (default: <http://127.0.0.1:8888>)
//! - `DISPLAY_TOGGLE_SESSION_FILE` - Session file (default: `.display-toggle-session.json`)

use std::path::{Path, PathBuf};

use thiserror::Error;
use url::Url;

use crate::store::{FileStore, StoreError};
use crate::token::TokenManager;

/// Gateway used when none is configured.
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8888";

/// Session file used when none is configured.
pub const DEFAULT_SESSION_FILE: &str = ".display-toggle-session.json";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Gateway URL does not parse or cannot carry a path.
    #[error("Invalid gateway URL {0}")]
    InvalidGatewayUrl(String),

    /// Session file could not be opened.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Where the console finds the gateway and keeps its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Gateway base URL.
    pub gateway_url: Url,
    /// Session file path.
    pub session_file: PathBuf,
}

impl ConsoleConfig {
    /// Validate and build a configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidGatewayUrl` unless `gateway_url` is an
    /// absolute `http(s)` URL.
    pub fn new(gateway_url: &str, session_file: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let url = Url::parse(gateway_url)
            .map_err(|e| ConfigError::InvalidGatewayUrl(format!("{gateway_url}: {e}")))?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidGatewayUrl(gateway_url.to_string()));
        }

        Ok(Self {
            gateway_url: url,
            session_file: session_file.into(),
        })
    }

    /// Session file path.
    #[must_use]
    pub fn session_file(&self) -> &Path {
        &self.session_file
    }

    /// Open the session file and build a token manager over it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the session file is unreadable or the HTTP
    /// client cannot be built.
    pub fn token_manager(&self) -> Result<TokenManager<FileStore>, ConfigError> {
        let store = FileStore::open(&self.session_file)?;
        Ok(TokenManager::new(self.gateway_url.clone(), store)?)
    }
}
