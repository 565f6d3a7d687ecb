//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::smaregi::{SmaregiClient, SmaregiError};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. The gateway keeps no per-user state; this
/// only carries configuration and the shared vendor client.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: GatewayConfig,
    smaregi: SmaregiClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, SmaregiError> {
        let smaregi = SmaregiClient::new(config.endpoints.clone(), config.scope.clone())?;

        Ok(Self {
            inner: Arc::new(AppStateInner { config, smaregi }),
        })
    }

    /// Get a reference to the gateway configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// Get a reference to the Smaregi API client.
    #[must_use]
    pub fn smaregi(&self) -> &SmaregiClient {
        &self.inner.smaregi
    }
}
