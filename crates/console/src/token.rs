//! Access token lifecycle.
//!
//! The console authenticates with a contract's client credentials through
//! the gateway's `/auth` route and keeps the credentials so the token can be
//! renewed without asking the operator again. A token counts as expired five
//! minutes before its real expiry.

use core::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use display_toggle_core::Environment;
use display_toggle_core::wire::{AuthRequest, AuthSuccess};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::instrument;
use url::Url;

use crate::endpoint;
use crate::messages;
use crate::store::{CredentialStore, StorageKey};

/// Margin before real expiry at which a token stops counting as valid.
pub const EXPIRY_BUFFER: TimeDelta = TimeDelta::minutes(5);

/// Contract client credentials.
#[derive(Clone)]
pub struct Credentials {
    /// Smaregi contract ID.
    pub contract_id: String,
    /// App client ID.
    pub client_id: String,
    /// App client secret.
    pub client_secret: SecretString,
    /// Target deployment.
    pub environment: Environment,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("contract_id", &self.contract_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("environment", &self.environment)
            .finish()
    }
}

/// A successful login.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    /// The new access token.
    pub token: SecretString,
    /// Lifetime in seconds as reported by the vendor.
    pub expires_in: i64,
}

/// A failed login, carrying an operator-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}")]
pub struct LoginFailure {
    /// What went wrong.
    pub error: String,
}

impl LoginFailure {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// What every gateway resource call needs in its headers.
#[derive(Clone)]
pub struct AccessContext {
    /// Current access token.
    pub access_token: SecretString,
    /// Smaregi contract ID.
    pub contract_id: String,
    /// Target deployment.
    pub environment: Environment,
}

impl fmt::Debug for AccessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessContext")
            .field("access_token", &"[REDACTED]")
            .field("contract_id", &self.contract_id)
            .field("environment", &self.environment)
            .finish()
    }
}

/// Obtains, validates, renews and discards access tokens.
///
/// The store sits behind a `tokio` mutex so one manager can be shared by
/// concurrent fetches.
pub struct TokenManager<S> {
    http: reqwest::Client,
    gateway: Url,
    store: Mutex<S>,
}

impl<S: CredentialStore> TokenManager<S> {
    /// Create a manager talking to the gateway at `gateway`.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn new(gateway: Url, store: S) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(http, gateway, store))
    }

    /// Create a manager sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(http: reqwest::Client, gateway: Url, store: S) -> Self {
        Self {
            http,
            gateway,
            store: Mutex::new(store),
        }
    }

    /// Gateway base URL.
    #[must_use]
    pub const fn gateway(&self) -> &Url {
        &self.gateway
    }

    pub(crate) const fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Exchange credentials for a token and persist both.
    ///
    /// # Errors
    ///
    /// Returns `LoginFailure` with the gateway's `error` text when the
    /// exchange is rejected, the generic auth message when it gives none, or
    /// the API message when the gateway cannot be reached or answers with
    /// something other than JSON.
    #[instrument(
        skip(self, credentials),
        fields(contract_id = %credentials.contract_id, environment = %credentials.environment)
    )]
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginSuccess, LoginFailure> {
        let request = AuthRequest {
            contract_id: credentials.contract_id.clone(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.expose_secret().to_string(),
            environment: credentials.environment.as_str().to_string(),
        };

        let response = match self
            .http
            .post(endpoint(&self.gateway, "auth"))
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Login request failed");
                return Err(LoginFailure::new(messages::API_ERROR));
            }
        };

        let status = response.status();
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(status = %status, error = %e, "Login response was not JSON");
                return Err(LoginFailure::new(messages::API_ERROR));
            }
        };

        let grant = if status.is_success() {
            serde_json::from_value::<AuthSuccess>(body.clone())
                .ok()
                .filter(|grant| grant.success)
        } else {
            None
        };

        let Some(grant) = grant else {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .filter(|error| !error.is_empty())
                .unwrap_or(messages::AUTH_FAILED);
            tracing::warn!(status = %status, error = %error, "Login rejected");
            return Err(LoginFailure::new(error));
        };

        let Some(expires_at) = expiry_from(Utc::now(), grant.expires_in) else {
            tracing::warn!(expires_in = grant.expires_in, "Login returned an unusable lifetime");
            return Err(LoginFailure::new(messages::AUTH_FAILED));
        };
        self.store
            .lock()
            .await
            .set_many(vec![
                (StorageKey::ContractId, credentials.contract_id.clone()),
                (StorageKey::ClientId, credentials.client_id.clone()),
                (
                    StorageKey::ClientSecret,
                    credentials.client_secret.expose_secret().to_string(),
                ),
                (
                    StorageKey::Environment,
                    credentials.environment.as_str().to_string(),
                ),
                (StorageKey::AccessToken, grant.access_token.clone()),
                (
                    StorageKey::TokenExpiresAt,
                    expires_at.timestamp_millis().to_string(),
                ),
            ])
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to persist session");
                LoginFailure::new(format!("Failed to save session: {e}"))
            })?;

        tracing::info!(expires_in = grant.expires_in, "Logged in");

        Ok(LoginSuccess {
            token: SecretString::from(grant.access_token),
            expires_in: grant.expires_in,
        })
    }

    // =========================================================================
    // Validity
    // =========================================================================

    /// Whether a token exists and stays valid for at least five more minutes.
    pub async fn is_token_valid(&self) -> bool {
        self.is_token_valid_at(Utc::now()).await
    }

    /// [`is_token_valid`](Self::is_token_valid) against an explicit clock.
    pub async fn is_token_valid_at(&self, now: DateTime<Utc>) -> bool {
        let store = self.store.lock().await;
        if store
            .get(StorageKey::AccessToken)
            .is_none_or(|token| token.is_empty())
        {
            return false;
        }
        drop(store);

        self.token_expires_at()
            .await
            .and_then(|expires_at| expires_at.checked_sub_signed(EXPIRY_BUFFER))
            .is_some_and(|deadline| now < deadline)
    }

    /// When the stored token expires, if one is stored.
    pub async fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.store
            .lock()
            .await
            .get(StorageKey::TokenExpiresAt)
            .and_then(|millis| millis.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
    }

    /// Whether credentials are stored and the token is valid.
    pub async fn is_logged_in(&self) -> bool {
        self.stored_credentials().await.is_some() && self.is_token_valid().await
    }

    /// Same check as [`is_logged_in`](Self::is_logged_in); front ends turn
    /// `false` into a prompt to log in.
    pub async fn require_login(&self) -> bool {
        let logged_in = self.is_logged_in().await;
        if !logged_in {
            tracing::info!("Login required");
        }
        logged_in
    }

    // =========================================================================
    // Refresh / Logout
    // =========================================================================

    /// Log in again with the stored credentials.
    ///
    /// Returns `false` without touching the store when credentials are
    /// missing or the exchange fails.
    #[instrument(skip(self))]
    pub async fn refresh_token(&self) -> bool {
        let Some(credentials) = self.stored_credentials().await else {
            tracing::debug!("No stored credentials to refresh with");
            return false;
        };

        match self.login(&credentials).await {
            Ok(_) => true,
            Err(failure) => {
                tracing::warn!(error = %failure, "Token refresh failed");
                false
            }
        }
    }

    /// Remove all six session values together.
    pub async fn logout(&self) {
        if let Err(e) = self.store.lock().await.clear() {
            tracing::error!(error = %e, "Failed to clear session");
        }
        tracing::info!("Logged out");
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Stored credentials, if contract ID, client ID, client secret and a
    /// recognised environment are all present.
    pub async fn stored_credentials(&self) -> Option<Credentials> {
        let store = self.store.lock().await;
        let present = |key| store.get(key).filter(|value| !value.is_empty());

        Some(Credentials {
            contract_id: present(StorageKey::ContractId)?,
            client_id: present(StorageKey::ClientId)?,
            client_secret: SecretString::from(present(StorageKey::ClientSecret)?),
            environment: present(StorageKey::Environment)?.parse().ok()?,
        })
    }

    /// Token, contract ID and environment for transport headers.
    pub async fn access_context(&self) -> Option<AccessContext> {
        let store = self.store.lock().await;
        let present = |key| store.get(key).filter(|value| !value.is_empty());

        Some(AccessContext {
            access_token: SecretString::from(present(StorageKey::AccessToken)?),
            contract_id: present(StorageKey::ContractId)?,
            environment: present(StorageKey::Environment)?.parse().ok()?,
        })
    }
}

/// Absolute expiry for a token issued at `now` with a lifetime of
/// `expires_in` seconds. `None` for non-positive or unrepresentable lifetimes.
fn expiry_from(now: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
    if expires_in <= 0 {
        return None;
    }
    now.checked_add_signed(TimeDelta::try_seconds(expires_in)?)
}
