//! Smaregi POS API client.
//!
//! Provides credential exchange and the small slice of the REST API the
//! console needs: listing products, categories and product images, and
//! updating a single entity's display flag.
//!
//! # Architecture
//!
//! - Two-layer authentication: client ID/secret (Basic) → access token → API (Bearer)
//! - The gateway holds no tokens; callers present one per request
//! - Vendor error bodies are kept so handlers can pass them through

pub mod auth;
pub mod client;

pub use auth::TokenGrant;
pub use client::SmaregiClient;

use core::fmt;

use display_toggle_core::Environment;
use reqwest::StatusCode;
use secrecy::SecretString;
use serde_json::Value;
use thiserror::Error;

/// Fallback message when the token endpoint rejects credentials without detail.
pub const AUTH_FAILED_MESSAGE: &str = "Authentication failed.";

/// Fallback message when the REST API fails without detail.
pub const API_ERROR_MESSAGE: &str = "The POS API returned an error.";

/// Errors that can occur when interacting with the Smaregi API.
#[derive(Debug, Error)]
pub enum SmaregiError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Vendor answered with a non-success status.
    #[error("Smaregi returned {status}: {message}")]
    Upstream {
        /// Status returned by the vendor.
        status: StatusCode,
        /// Best human-readable message extracted from the body.
        message: String,
        /// Raw vendor body (`null` when it was not JSON).
        body: Value,
    },

    /// A configured base URL cannot carry a path.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Per-request access context presented by the console.
#[derive(Clone)]
pub struct VendorSession {
    /// Bearer token for the REST API.
    pub access_token: SecretString,
    /// Smaregi contract ID (first path segment of every API URL).
    pub contract_id: String,
    /// Target deployment.
    pub environment: Environment,
}

impl fmt::Debug for VendorSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorSession")
            .field("access_token", &"[REDACTED]")
            .field("contract_id", &self.contract_id)
            .field("environment", &self.environment)
            .finish()
    }
}

/// Pull a message out of a vendor error body, trying `keys` in order.
fn extract_message(body: &Value, keys: &[&str], fallback: &str) -> String {
    keys.iter()
        .find_map(|key| {
            body.get(*key)
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty())
        })
        .map_or_else(|| fallback.to_string(), str::to_owned)
}
