//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, GatewayError>`. Failures render as the
//! JSON envelope the console expects, `{"success": false, "error": "..."}`,
//! with extra diagnostic fields where a variant carries them. Server errors
//! are captured to Sentry before responding.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::smaregi::SmaregiError;

/// Message returned when any of the credential headers is absent.
pub const MISSING_CREDENTIALS_MESSAGE: &str = "Missing authentication headers.";

/// Message returned for unexpected failures.
pub const SERVER_ERROR_MESSAGE: &str = "A server error occurred.";

/// Gateway-level error type.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Request body or parameters failed validation.
    #[error("Validation failed: {message}")]
    Validation {
        /// What was wrong.
        message: String,
        /// Per-field presence hints, keyed by field name.
        received: Option<BTreeMap<&'static str, bool>>,
    },

    /// One of the credential headers is missing.
    #[error("Missing credentials")]
    MissingCredentials,

    /// The route does not support this method.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Vendor rejected the request; its status is passed through.
    #[error("Upstream error {status}: {message}")]
    Upstream {
        /// Vendor status.
        status: StatusCode,
        /// Message extracted from the vendor body.
        message: String,
        /// Raw vendor body.
        data: Value,
    },

    /// Vendor call failed without a usable response.
    #[error("Vendor error: {0}")]
    Vendor(SmaregiError),
}

impl GatewayError {
    /// Validation error without field hints.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            received: None,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::MissingCredentials => StatusCode::UNAUTHORIZED,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Upstream { status, .. } => *status,
            Self::Vendor(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SmaregiError> for GatewayError {
    fn from(err: SmaregiError) -> Self {
        match err {
            SmaregiError::Upstream {
                status,
                message,
                body,
            } => Self::Upstream {
                status,
                message,
                data: body,
            },
            other => Self::Vendor(other),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let mut body = Map::new();
        body.insert("success".to_string(), Value::Bool(false));

        match self {
            Self::Validation { message, received } => {
                body.insert("error".to_string(), Value::String(message));
                if let Some(received) = received {
                    body.insert("received".to_string(), json!(received));
                }
            }
            Self::MissingCredentials => {
                body.insert("error".to_string(), json!(MISSING_CREDENTIALS_MESSAGE));
            }
            Self::MethodNotAllowed => {
                body.insert("error".to_string(), json!("Method Not Allowed"));
            }
            Self::Upstream { message, data, .. } => {
                body.insert("error".to_string(), Value::String(message));
                body.insert("data".to_string(), data);
            }
            Self::Vendor(err) => {
                body.insert("error".to_string(), json!(SERVER_ERROR_MESSAGE));
                body.insert("details".to_string(), Value::String(err.to_string()));
            }
        }

        (status, Json(Value::Object(body))).into_response()
    }
}

/// Result type alias for `GatewayError`.
pub type Result<T> = std::result::Result<T, GatewayError>;
