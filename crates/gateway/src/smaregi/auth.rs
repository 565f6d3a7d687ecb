//! Smaregi token exchange.
//!
//! Trades a contract's client ID and secret for a short-lived access token
//! using the OAuth client-credentials grant.

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;
use url::Url;

use super::{AUTH_FAILED_MESSAGE, SmaregiError, extract_message};

/// Access token obtained from the identity endpoint.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// Bearer token for REST API requests.
    pub access_token: SecretString,
    /// Token lifetime in seconds.
    pub expires_in: i64,
    /// Usually `Bearer`.
    pub token_type: Option<String>,
    /// Scopes actually granted.
    pub scope: Option<String>,
}

/// Response from the token endpoint.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// Token endpoint for a contract: `{id_base}/{contract_id}/token`.
///
/// # Errors
///
/// Returns `SmaregiError::InvalidBaseUrl` if `id_base` cannot carry a path.
pub fn token_url(id_base: &Url, contract_id: &str) -> Result<Url, SmaregiError> {
    let mut url = id_base.clone();
    url.path_segments_mut()
        .map_err(|()| SmaregiError::InvalidBaseUrl(id_base.to_string()))?
        .pop_if_empty()
        .extend([contract_id, "token"]);
    Ok(url)
}

/// Exchange client credentials for an access token.
///
/// # Errors
///
/// Returns `SmaregiError::Upstream` carrying the vendor's status and body if
/// the credentials are rejected, or `SmaregiError::Http` on network failures.
#[instrument(skip(client, client_secret), fields(contract_id = %contract_id))]
pub async fn exchange_token(
    client: &reqwest::Client,
    id_base: &Url,
    contract_id: &str,
    client_id: &str,
    client_secret: &SecretString,
    scope: &str,
) -> Result<TokenGrant, SmaregiError> {
    let url = token_url(id_base, contract_id)?;

    let response = client
        .post(url)
        .basic_auth(client_id, Some(client_secret.expose_secret()))
        .form(&[("grant_type", "client_credentials"), ("scope", scope)])
        .send()
        .await?;

    let status = response.status();
    let bytes = response.bytes().await?;

    if status.is_success() {
        let token: TokenResponse = serde_json::from_slice(&bytes)?;
        tracing::debug!(expires_in = token.expires_in, "Access token issued");

        return Ok(TokenGrant {
            access_token: SecretString::from(token.access_token),
            expires_in: token.expires_in,
            token_type: token.token_type,
            scope: token.scope,
        });
    }

    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    let message = extract_message(&body, &["error_description", "error"], AUTH_FAILED_MESSAGE);
    tracing::warn!(status = %status, message = %message, "Token exchange rejected");

    Err(SmaregiError::Upstream {
        status: if status.is_client_error() || status.is_server_error() {
            status
        } else {
            StatusCode::BAD_GATEWAY
        },
        message,
        body,
    })
}
