//! CORS policy for browser and CLI consoles.
//!
//! Any origin may call the gateway; credentials travel in custom headers,
//! never in cookies.

use std::time::Duration;

use axum::http::{HeaderName, Method, header::CONTENT_TYPE};
use display_toggle_core::wire::{ACCESS_TOKEN_HEADER, CONTRACT_ID_HEADER, ENVIRONMENT_HEADER};
use tower_http::cors::{Any, CorsLayer};

/// CORS layer allowing `methods` (plus `OPTIONS`) from any origin.
#[must_use]
pub fn cors_layer(methods: &[Method]) -> CorsLayer {
    let methods: Vec<Method> = methods
        .iter()
        .cloned()
        .chain(std::iter::once(Method::OPTIONS))
        .collect();

    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(methods)
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(ACCESS_TOKEN_HEADER),
            HeaderName::from_static(CONTRACT_ID_HEADER),
            HeaderName::from_static(ENVIRONMENT_HEADER),
        ])
        .max_age(Duration::from_secs(60 * 60))
}
