//! HTTP route handlers for the gateway.
//!
//! # Route Structure
//!
//! ```text
//! GET   /health           - Health check
//!
//! # Credential exchange
//! POST  /auth             - Exchange client credentials for an access token
//!
//! # Catalog (requires X-Access-Token, X-Contract-Id, X-Environment)
//! GET   /products         - List products (query forwarded verbatim)
//! PATCH /products         - Update product display flags, one vendor call each
//! GET   /categories       - List categories (query forwarded verbatim)
//! PATCH /categories       - Update category display flags, one vendor call each
//! GET   /product-images   - List the product image index
//! ```
//!
//! Every route answers `OPTIONS` with an empty 200 and any other method with
//! a JSON 405.

pub mod auth;
pub mod catalog;

use axum::{
    Router,
    body::Bytes,
    http::{Method, StatusCode},
    routing::{get, post},
};
use serde::de::DeserializeOwned;

use crate::error::{GatewayError, Result};
use crate::middleware::cors_layer;
use crate::state::AppState;

/// Create the full route table.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route(
            "/auth",
            post(auth::exchange)
                .options(preflight)
                .fallback(method_not_allowed)
                .layer(cors_layer(&[Method::POST])),
        )
        .route(
            "/products",
            get(catalog::list_products)
                .patch(catalog::update_products)
                .options(preflight)
                .fallback(method_not_allowed)
                .layer(cors_layer(&[Method::GET, Method::PATCH])),
        )
        .route(
            "/categories",
            get(catalog::list_categories)
                .patch(catalog::update_categories)
                .options(preflight)
                .fallback(method_not_allowed)
                .layer(cors_layer(&[Method::GET, Method::PATCH])),
        )
        .route(
            "/product-images",
            get(catalog::list_product_images)
                .options(preflight)
                .fallback(method_not_allowed)
                .layer(cors_layer(&[Method::GET])),
        )
}

/// Liveness probe.
async fn health() -> &'static str {
    "ok"
}

/// Non-CORS `OPTIONS` requests; real preflights are answered by the CORS layer.
async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> GatewayError {
    GatewayError::MethodNotAllowed
}

/// Parse a JSON request body; an empty body reads as `T::default()`.
fn parse_body<T: DeserializeOwned + Default>(bytes: &Bytes) -> Result<T> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes)
        .map_err(|e| GatewayError::validation(format!("Failed to parse request body: {e}")))
}
