//! Authenticated calls to the gateway's catalog routes.
//!
//! Every call checks the token first and renews it at most once. A 401 from
//! the gateway ends the session on the spot, whatever the local expiry says.

use std::sync::Arc;

use display_toggle_core::wire::{
    ACCESS_TOKEN_HEADER, BatchReport, CONTRACT_ID_HEADER, CategoryUpdate, ENVIRONMENT_HEADER,
    ErrorBody, ProductUpdate, UpdateCategoriesRequest, UpdateProductsRequest,
};
use display_toggle_core::{Category, Product, Resource};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::endpoint;
use crate::messages;
use crate::pagination::PageSource;
use crate::store::CredentialStore;
use crate::token::{AccessContext, TokenManager};
use crate::tracker::EntityUpdater;

/// Errors from gateway calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Token was invalid and could not be renewed; the session is cleared.
    #[error("{}", messages::TOKEN_EXPIRED)]
    TokenExpired,

    /// Gateway answered 401; the session is cleared.
    #[error("{}", messages::TOKEN_EXPIRED)]
    Unauthorized,

    /// Gateway answered with another non-success status.
    #[error("{message}")]
    Upstream {
        /// Gateway status.
        status: StatusCode,
        /// `error`, else `message`, else the generic API text.
        message: String,
    },

    /// A single item of a batch update was rejected.
    #[error("{id}: {message}")]
    Rejected {
        /// Product or category ID.
        id: String,
        /// Vendor's reason.
        message: String,
    },

    /// Gateway could not be reached.
    #[error("{}", messages::API_ERROR)]
    Transport(#[from] reqwest::Error),

    /// Gateway answered with something other than the expected JSON.
    #[error("Unexpected response from gateway: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Whether this error ended the session.
    #[must_use]
    pub const fn is_session_ended(&self) -> bool {
        matches!(self, Self::TokenExpired | Self::Unauthorized)
    }
}

/// Client for the gateway's catalog routes.
pub struct CatalogApi<S> {
    tokens: Arc<TokenManager<S>>,
}

impl<S> Clone for CatalogApi<S> {
    fn clone(&self) -> Self {
        Self {
            tokens: Arc::clone(&self.tokens),
        }
    }
}

impl<S: CredentialStore> CatalogApi<S> {
    /// Create a client sharing `tokens` for authentication.
    #[must_use]
    pub const fn new(tokens: Arc<TokenManager<S>>) -> Self {
        Self { tokens }
    }

    /// The token manager behind this client.
    #[must_use]
    pub fn tokens(&self) -> &TokenManager<S> {
        &self.tokens
    }

    /// List one page of a resource. The body is returned as sent.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn list(&self, resource: Resource, query: &[(&str, &str)]) -> Result<Value, ApiError> {
        self.request::<Value, ()>(Method::GET, resource, query, None)
            .await
    }

    /// Set display flags for products, one vendor call per item.
    ///
    /// A 207 is not an error here: the report lists which items failed.
    /// A vendor 401 on any item ends the session with
    /// [`ApiError::Unauthorized`].
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn update_products(&self, items: &[ProductUpdate]) -> Result<BatchReport, ApiError> {
        let body = UpdateProductsRequest {
            products: items.to_vec(),
        };
        let report = self
            .request(Method::PATCH, Resource::Products, &[], Some(&body))
            .await?;
        self.check_token_accepted(report).await
    }

    /// Set display flags for categories, one vendor call per item.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    pub async fn update_categories(
        &self,
        items: &[CategoryUpdate],
    ) -> Result<BatchReport, ApiError> {
        let body = UpdateCategoriesRequest {
            categories: items.to_vec(),
        };
        let report = self
            .request(Method::PATCH, Resource::Categories, &[], Some(&body))
            .await?;
        self.check_token_accepted(report).await
    }

    /// A batch in which the vendor refused the token ends the session like a
    /// gateway 401 does.
    async fn check_token_accepted(&self, report: BatchReport) -> Result<BatchReport, ApiError> {
        if report.token_rejected() {
            tracing::warn!("Vendor rejected the access token during an update");
            self.tokens.logout().await;
            return Err(ApiError::Unauthorized);
        }
        Ok(report)
    }

    /// Valid access context, renewing the token once if needed.
    pub(crate) async fn ensure_token(&self) -> Result<AccessContext, ApiError> {
        if !self.tokens.is_token_valid().await && !self.tokens.refresh_token().await {
            tracing::warn!("Token expired and could not be renewed");
            self.tokens.logout().await;
            return Err(ApiError::TokenExpired);
        }

        match self.tokens.access_context().await {
            Some(context) => Ok(context),
            None => {
                self.tokens.logout().await;
                Err(ApiError::TokenExpired)
            }
        }
    }

    #[instrument(skip(self, query, body), fields(resource = resource.gateway_path()))]
    async fn request<T, B>(
        &self,
        method: Method,
        resource: Resource,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let context = self.ensure_token().await?;

        let mut request = self
            .tokens
            .http()
            .request(method, endpoint(self.tokens.gateway(), resource.gateway_path()))
            .header(ACCESS_TOKEN_HEADER, context.access_token.expose_secret())
            .header(CONTRACT_ID_HEADER, context.contract_id.as_str())
            .header(ENVIRONMENT_HEADER, context.environment.as_str());
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("Gateway rejected the access token");
            self.tokens.logout().await;
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .ok()
                .and_then(ErrorBody::into_message)
                .unwrap_or_else(|| messages::API_ERROR.to_string());
            tracing::warn!(status = %status, message = %message, "Gateway request failed");
            return Err(ApiError::Upstream { status, message });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl<S: CredentialStore> PageSource for CatalogApi<S> {
    async fn fetch_page(&self, resource: Resource, query: &[(&str, &str)]) -> Result<Value, ApiError> {
        self.list(resource, query).await
    }
}

/// Turn a one-item batch report into a per-item result.
fn single_outcome(report: &BatchReport, id: &str) -> Result<(), ApiError> {
    match report.failure_for(id).or_else(|| report.errors.first()) {
        Some(failure) => Err(ApiError::Rejected {
            id: id.to_string(),
            message: BatchReport::describe_error(failure),
        }),
        None => Ok(()),
    }
}

impl<S: CredentialStore> EntityUpdater<Product> for CatalogApi<S> {
    type Error = ApiError;

    async fn update(&self, update: &ProductUpdate) -> Result<(), ApiError> {
        let report = self.update_products(std::slice::from_ref(update)).await?;
        single_outcome(&report, update.product_id.as_str())
    }
}

impl<S: CredentialStore> EntityUpdater<Category> for CatalogApi<S> {
    type Error = ApiError;

    async fn update(&self, update: &CategoryUpdate) -> Result<(), ApiError> {
        let report = self.update_categories(std::slice::from_ref(update)).await?;
        single_outcome(&report, update.category_id.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::RawQuery;
    use axum::http::HeaderMap;
    use axum::routing::{get, patch, post};
    use axum::{Json, Router};
    use chrono::{TimeDelta, Utc};
    use display_toggle_core::{CategoryId, DisplayFlag, ProductId};
    use serde_json::json;

    use super::*;
    use crate::store::{MemoryStore, StorageKey};
    use crate::test_support::spawn_gateway;

    fn logged_in_store(expires_in: TimeDelta) -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .set_many(vec![
                (StorageKey::ContractId, "skaa0001".to_string()),
                (StorageKey::ClientId, "client".to_string()),
                (StorageKey::ClientSecret, "good".to_string()),
                (StorageKey::Environment, "prod".to_string()),
                (StorageKey::AccessToken, "tok-1".to_string()),
                (
                    StorageKey::TokenExpiresAt,
                    (Utc::now() + expires_in).timestamp_millis().to_string(),
                ),
            ])
            .unwrap();
        store
    }

    async fn api_for(router: Router, store: MemoryStore) -> CatalogApi<MemoryStore> {
        let gateway = spawn_gateway(router).await;
        CatalogApi::new(Arc::new(TokenManager::new(gateway, store).unwrap()))
    }

    #[tokio::test]
    async fn test_list_sends_headers_and_query() {
        let router = Router::new().route(
            "/products",
            get(|headers: HeaderMap, RawQuery(query): RawQuery| async move {
                let header = |name: &str| {
                    headers
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string()
                };
                Json(json!({
                    "token": header("x-access-token"),
                    "contract": header("x-contract-id"),
                    "environment": header("x-environment"),
                    "query": query,
                }))
            }),
        );
        let api = api_for(router, logged_in_store(TimeDelta::hours(1))).await;

        let body = api
            .list(Resource::Products, &[("limit", "100"), ("page", "1")])
            .await
            .unwrap();

        assert_eq!(body["token"], "tok-1");
        assert_eq!(body["contract"], "skaa0001");
        assert_eq!(body["environment"], "prod");
        assert_eq!(body["query"], "limit=100&page=1");
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session_even_when_token_is_fresh() {
        let router = Router::new().route(
            "/categories",
            get(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"success": false, "error": "Missing authentication headers."})),
                )
            }),
        );
        let api = api_for(router, logged_in_store(TimeDelta::hours(1))).await;

        let err = api.list(Resource::Categories, &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert!(err.is_session_ended());
        assert!(api.tokens().access_context().await.is_none());
        assert!(!api.tokens().is_logged_in().await);
    }

    #[tokio::test]
    async fn test_upstream_error_message_priority() {
        let router = Router::new()
            .route(
                "/products",
                get(|| async {
                    (
                        StatusCode::FORBIDDEN,
                        Json(json!({"success": false, "error": "scope missing", "message": "x"})),
                    )
                }),
            )
            .route(
                "/categories",
                get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
            );
        let api = api_for(router, logged_in_store(TimeDelta::hours(1))).await;

        match api.list(Resource::Products, &[]).await.unwrap_err() {
            ApiError::Upstream { status, message } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(message, "scope missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        match api.list(Resource::Categories, &[]).await.unwrap_err() {
            ApiError::Upstream { message, .. } => assert_eq!(message, messages::API_ERROR),
            other => panic!("unexpected error: {other:?}"),
        }

        // Non-401 failures keep the session.
        assert!(api.tokens().is_logged_in().await);
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_once_before_request() {
        let auth_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&auth_calls);
        let router = Router::new()
            .route(
                "/auth",
                post(move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Json(json!({"success": true, "access_token": "tok-2", "expires_in": 3600}))
                    }
                }),
            )
            .route(
                "/product-images",
                get(|headers: HeaderMap| async move {
                    let token = headers
                        .get("x-access-token")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    Json(json!([{ "token": token }]))
                }),
            );
        let api = api_for(router, logged_in_store(TimeDelta::minutes(4))).await;

        let body = api.list(Resource::ProductImages, &[]).await.unwrap();
        assert_eq!(body[0]["token"], "tok-2");
        assert_eq!(auth_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_logs_out_without_request() {
        let list_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&list_calls);
        let router = Router::new()
            .route(
                "/auth",
                post(|| async {
                    (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({"success": false, "error": "invalid_client"})),
                    )
                }),
            )
            .route(
                "/products",
                get(move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Json(json!([]))
                    }
                }),
            );
        let api = api_for(router, logged_in_store(-TimeDelta::minutes(1))).await;

        let err = api.list(Resource::Products, &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::TokenExpired));
        assert_eq!(list_calls.load(Ordering::SeqCst), 0);
        assert!(api.tokens().stored_credentials().await.is_none());
    }

    #[tokio::test]
    async fn test_updater_maps_rejected_item() {
        let router = Router::new()
            .route(
                "/products",
                patch(|| async {
                    (
                        StatusCode::MULTI_STATUS,
                        Json(json!({
                            "success": false,
                            "results": [],
                            "errors": [{"id": "9", "success": false, "error": {"detail": "locked"}}],
                        })),
                    )
                }),
            )
            .route(
                "/categories",
                patch(|Json(body): Json<Value>| async move {
                    let id = body["categories"][0]["categoryId"].clone();
                    Json(json!({
                        "success": true,
                        "results": [{"id": id, "success": true}],
                        "errors": [],
                    }))
                }),
            );
        let api = api_for(router, logged_in_store(TimeDelta::hours(1))).await;

        let product = ProductUpdate {
            product_id: ProductId::new("9"),
            display_flag: DisplayFlag::Hidden,
            product_name: None,
            category_id: None,
        };
        let err = EntityUpdater::<Product>::update(&api, &product)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "9: locked");

        let category = CategoryUpdate {
            category_id: CategoryId::new("4"),
            display_flag: DisplayFlag::Shown,
        };
        EntityUpdater::<Category>::update(&api, &category)
            .await
            .unwrap();
        assert!(api.tokens().is_logged_in().await);
    }

    #[tokio::test]
    async fn test_vendor_token_rejection_in_update_clears_session() {
        let router = Router::new().route(
            "/products",
            patch(|| async {
                (
                    StatusCode::MULTI_STATUS,
                    Json(json!({
                        "success": false,
                        "results": [],
                        "errors": [{
                            "id": "9",
                            "success": false,
                            "error": {"title": "Unauthorized"},
                            "status": 401,
                        }],
                    })),
                )
            }),
        );
        let api = api_for(router, logged_in_store(TimeDelta::hours(1))).await;

        let product = ProductUpdate {
            product_id: ProductId::new("9"),
            display_flag: DisplayFlag::Shown,
            product_name: None,
            category_id: None,
        };
        let err = EntityUpdater::<Product>::update(&api, &product)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert!(api.tokens().stored_credentials().await.is_none());
        assert!(!api.tokens().is_logged_in().await);
    }
}
