//! Display Toggle console library.
//!
//! Everything an operator front end needs to flip display flags safely:
//!
//! - [`token`] - Login, token validity with a five-minute buffer, refresh, logout
//! - [`api`] - Authenticated calls to the gateway with forced logout on 401
//! - [`pagination`] - Sequential page walking for list endpoints
//! - [`tracker`] - Per-entity dirty state and sequential apply
//! - [`session`] - The catalog view a front end drives
//! - [`store`] - Where credentials and the token persist between runs
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ConsoleConfig::new("http://127.0.0.1:8888", ".display-toggle-session.json")?;
//! let mut session = ConsoleSession::new(CatalogApi::new(Arc::new(config.token_manager()?)));
//! session.load_catalog().await?;
//! session.toggle_product(&ProductId::new("8000001"), false)?;
//! let report = session.apply_products().await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod pagination;
pub mod session;
pub mod store;
pub mod token;
pub mod tracker;

pub use api::{ApiError, CatalogApi};
pub use config::{ConfigError, ConsoleConfig};
pub use pagination::{PAGE_SIZE, PageSource, fetch_all};
pub use session::{ConsoleSession, PendingChanges};
pub use store::{CredentialStore, FileStore, MemoryStore, StorageKey, StoreError};
pub use token::{AccessContext, Credentials, LoginFailure, LoginSuccess, TokenManager};
pub use tracker::{
    ApplyFailure, ApplyReport, ApplyStatus, DirtyTracker, Entity, EntityUpdater, TrackerError,
};

use url::Url;

/// Operator-facing messages.
pub mod messages {
    /// Login rejected without a reason from the gateway.
    pub const AUTH_FAILED: &str =
        "Authentication failed. Check the contract ID, client ID and client secret.";
    /// Session could not be renewed; the operator must log in again.
    pub const TOKEN_EXPIRED: &str = "Your session has expired. Please log in again.";
    /// Gateway unreachable or returned an unreadable response.
    pub const API_ERROR: &str =
        "Could not reach the POS API. Please wait a moment and try again.";
    /// Apply requested with nothing pending.
    pub const NO_CHANGES: &str = "No changes to apply.";
    /// Every pending change was applied.
    pub const UPDATE_SUCCESS: &str = "Update complete.";
    /// Some or all pending changes were rejected.
    pub const UPDATE_FAILED: &str = "Update failed.";
}

/// `{base}/{segment}`, keeping any path prefix on `base`.
pub(crate) fn endpoint(base: &Url, segment: &str) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(segment);
    }
    url
}
