//! HTTP middleware stack for the gateway.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (per route, any origin)

pub mod cors;
pub mod credentials;
pub mod request_id;

pub use cors::cors_layer;
pub use credentials::RequireVendorSession;
pub use request_id::request_id_middleware;
