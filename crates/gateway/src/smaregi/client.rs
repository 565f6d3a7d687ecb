//! Smaregi REST API client.
//!
//! Thin wrapper over `reqwest` that knows the vendor's URL layout. It holds
//! no tokens: every call takes the caller's [`VendorSession`].

use std::sync::Arc;
use std::time::Duration;

use display_toggle_core::{DisplayFlag, Environment, Resource};
use reqwest::{Method, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::instrument;
use url::Url;

use super::auth::{TokenGrant, exchange_token};
use super::{API_ERROR_MESSAGE, SmaregiError, VendorSession, extract_message};
use crate::config::VendorEndpoints;

/// Smaregi REST API client.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct SmaregiClient {
    inner: Arc<SmaregiClientInner>,
}

struct SmaregiClientInner {
    client: reqwest::Client,
    endpoints: VendorEndpoints,
    scope: String,
}

impl SmaregiClient {
    /// Create a client for the given vendor endpoints.
    ///
    /// # Errors
    ///
    /// Returns `SmaregiError::Http` if the HTTP client cannot be built.
    pub fn new(endpoints: VendorEndpoints, scope: impl Into<String>) -> Result<Self, SmaregiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(SmaregiClientInner {
                client,
                endpoints,
                scope: scope.into(),
            }),
        })
    }

    /// Vendor endpoints this client talks to.
    #[must_use]
    pub fn endpoints(&self) -> &VendorEndpoints {
        &self.inner.endpoints
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Exchange client credentials for an access token.
    ///
    /// # Errors
    ///
    /// See [`exchange_token`].
    pub async fn exchange_token(
        &self,
        environment: Environment,
        contract_id: &str,
        client_id: &str,
        client_secret: &SecretString,
    ) -> Result<TokenGrant, SmaregiError> {
        exchange_token(
            &self.inner.client,
            self.inner.endpoints.id_base(environment),
            contract_id,
            client_id,
            client_secret,
            &self.inner.scope,
        )
        .await
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// List one page of a resource.
    ///
    /// `raw_query` is forwarded verbatim, so paging and sorting parameters
    /// reach the vendor exactly as the caller sent them. The body is returned
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns `SmaregiError::Upstream` with the vendor's `detail` or `title`
    /// if the request is rejected.
    #[instrument(skip(self, session), fields(contract_id = %session.contract_id))]
    pub async fn list(
        &self,
        session: &VendorSession,
        resource: Resource,
        raw_query: Option<&str>,
    ) -> Result<Value, SmaregiError> {
        let mut url = self.resource_url(session, resource, None)?;
        url.set_query(raw_query.filter(|query| !query.is_empty()));

        let response = self.send(Method::GET, url, session, None).await?;
        read_json(response).await
    }

    /// Set a single product's or category's display flag.
    ///
    /// # Errors
    ///
    /// Returns `SmaregiError::Upstream` with the vendor's body if the update
    /// is rejected.
    #[instrument(skip(self, session), fields(contract_id = %session.contract_id))]
    pub async fn update_display_flag(
        &self,
        session: &VendorSession,
        resource: Resource,
        id: &str,
        flag: DisplayFlag,
    ) -> Result<Value, SmaregiError> {
        let url = self.resource_url(session, resource, Some(id))?;
        let body = json!({ "displayFlag": flag });

        let response = self.send(Method::PATCH, url, session, Some(&body)).await?;
        read_json(response).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// `{api_base}/{contract_id}/{vendor_path}[/{id}]`
    fn resource_url(
        &self,
        session: &VendorSession,
        resource: Resource,
        id: Option<&str>,
    ) -> Result<Url, SmaregiError> {
        let base = self.inner.endpoints.api_base(session.environment);
        let mut url = base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| SmaregiError::InvalidBaseUrl(base.to_string()))?;
            segments
                .pop_if_empty()
                .push(&session.contract_id)
                .extend(resource.vendor_path().split('/'));
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        session: &VendorSession,
        body: Option<&Value>,
    ) -> Result<Response, SmaregiError> {
        tracing::debug!(method = %method, url = %url, "Calling Smaregi API");

        let mut request = self
            .inner
            .client
            .request(method, url)
            .bearer_auth(session.access_token.expose_secret());
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }
}

/// Read a JSON body, mapping non-success statuses to `SmaregiError::Upstream`.
///
/// An empty success body reads as `null`.
async fn read_json(response: Response) -> Result<Value, SmaregiError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if status.is_success() {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        return Ok(serde_json::from_slice(&bytes)?);
    }

    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    let message = extract_message(&body, &["detail", "title"], API_ERROR_MESSAGE);
    tracing::warn!(status = %status, message = %message, "Smaregi API error");

    Err(SmaregiError::Upstream {
        status,
        message,
        body,
    })
}
