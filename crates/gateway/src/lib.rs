//! Display Toggle gateway library.
//!
//! Stateless HTTP relay between operator consoles and the Smaregi POS API.
//! Exposed as a library so the router can be driven in tests without
//! binding a socket.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod smaregi;
pub mod state;

use std::time::Duration;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

pub use config::{GatewayConfig, VendorEndpoints};
pub use error::GatewayError;
pub use state::AppState;

/// Build the gateway application with tracing and request-id layers.
///
/// Sentry layers are added by the binary, which owns the Sentry client.
pub fn app(state: AppState) -> Router {
    routes::routes()
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod test_support {
    //! Helpers shared by handler tests.

    use axum::{Router, body::to_bytes, http::StatusCode, response::Response};
    use serde_json::Value;
    use url::Url;

    use crate::config::{GatewayConfig, VendorEndpoints};
    use crate::state::AppState;

    /// Serve `router` on an ephemeral local port and return its base URL.
    pub async fn spawn_vendor(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        Url::parse(&format!("http://{addr}")).unwrap()
    }

    /// State whose vendor endpoints point at a stand-in server.
    pub fn state_for(vendor: &Url) -> AppState {
        let endpoints = VendorEndpoints::uniform(vendor.join("app").unwrap(), vendor.clone());
        AppState::new(GatewayConfig::with_endpoints(endpoints)).unwrap()
    }

    /// State for tests that must never reach the vendor.
    pub fn offline_state() -> AppState {
        state_for(&Url::parse("http://127.0.0.1:9").unwrap())
    }

    /// Split a response into its status and JSON body.
    pub async fn read_json(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }
}
