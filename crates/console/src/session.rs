//! The catalog view an operator front end drives.
//!
//! A [`ConsoleSession`] owns everything a screen shows: both trackers, the
//! image index, the selected category and the search text. Front ends read
//! from it and signal intent; they never mutate entities directly.

use std::collections::HashMap;

use display_toggle_core::{Category, CategoryId, Product, ProductId, ProductImage, Resource};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument;

use crate::api::{ApiError, CatalogApi};
use crate::pagination::fetch_all;
use crate::store::CredentialStore;
use crate::tracker::{ApplyReport, DirtyTracker, TrackerError};

/// Categories are listed in register order.
const CATEGORY_QUERY: &[(&str, &str)] = &[("sort", "displaySequence")];

/// Number of pending toggles per entity type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingChanges {
    /// Dirty products.
    pub products: usize,
    /// Dirty categories.
    pub categories: usize,
}

impl PendingChanges {
    /// Whether anything is waiting to be applied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.products == 0 && self.categories == 0
    }
}

/// Catalog state for one operator session.
pub struct ConsoleSession<S> {
    api: CatalogApi<S>,
    products: DirtyTracker<Product>,
    categories: DirtyTracker<Category>,
    images: HashMap<ProductId, String>,
    selected_category: Option<CategoryId>,
    search: String,
}

impl<S: CredentialStore> ConsoleSession<S> {
    /// Create an empty session. Nothing is fetched until [`Self::load_catalog`].
    #[must_use]
    pub fn new(api: CatalogApi<S>) -> Self {
        Self {
            api,
            products: DirtyTracker::new(),
            categories: DirtyTracker::new(),
            images: HashMap::new(),
            selected_category: None,
            search: String::new(),
        }
    }

    /// Client used for gateway calls.
    #[must_use]
    pub const fn api(&self) -> &CatalogApi<S> {
        &self.api
    }

    /// Fetch categories, the image index and products, then select the
    /// first category.
    ///
    /// Categories and images are fetched concurrently. A failed image fetch
    /// only costs the thumbnails.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::TokenExpired` if the token cannot be renewed, else
    /// the first category or product fetch error. The session is left
    /// exactly as it was.
    #[instrument(skip(self))]
    pub async fn load_catalog(&mut self) -> Result<(), ApiError> {
        // Renew up front so the concurrent fetches share one token.
        self.api.ensure_token().await?;

        let (categories, images) = tokio::join!(
            fetch_all(&self.api, Resource::Categories, CATEGORY_QUERY),
            fetch_all(&self.api, Resource::ProductImages, &[]),
        );
        let categories: Vec<Category> = parse_records(categories?, Resource::Categories);

        let images = match images {
            Ok(records) => parse_records::<ProductImage>(records, Resource::ProductImages)
                .into_iter()
                .map(|image| (image.product_id, image.url))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load product images, continuing without");
                HashMap::new()
            }
        };

        let products: Vec<Product> =
            parse_records(fetch_all(&self.api, Resource::Products, &[]).await?, Resource::Products);

        self.selected_category = categories.first().map(|c| c.category_id.clone());
        self.categories.load(categories);
        self.products.load(products);
        self.images = images;

        tracing::info!(
            categories = self.categories.len(),
            products = self.products.len(),
            images = self.images.len(),
            "Catalog loaded"
        );
        Ok(())
    }

    /// Refetch products only. Pending product toggles are discarded.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; current products are kept.
    #[instrument(skip(self))]
    pub async fn reload_products(&mut self) -> Result<(), ApiError> {
        let records = fetch_all(&self.api, Resource::Products, &[]).await?;
        self.products.load(parse_records(records, Resource::Products));
        tracing::info!(products = self.products.len(), "Products reloaded");
        Ok(())
    }

    /// Restrict [`Self::visible_products`] to one category, or lift the
    /// restriction with `None`.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::UnknownEntity` if the category is not loaded.
    pub fn select_category(&mut self, category: Option<CategoryId>) -> Result<(), TrackerError> {
        if let Some(id) = &category
            && self.categories.get(id).is_none()
        {
            return Err(TrackerError::UnknownEntity(id.to_string()));
        }
        self.selected_category = category;
        Ok(())
    }

    /// Currently selected category.
    #[must_use]
    pub const fn selected_category(&self) -> Option<&CategoryId> {
        self.selected_category.as_ref()
    }

    /// Set the product search text. Blank text matches everything.
    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search = text.into();
    }

    /// Current search text.
    #[must_use]
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Products in the selected category that match the search text.
    ///
    /// The search is case-insensitive over product code, name and ID.
    #[must_use]
    pub fn visible_products(&self) -> Vec<&Product> {
        let needle = self.search.trim().to_lowercase();
        self.products
            .entities()
            .filter(|product| {
                self.selected_category
                    .as_ref()
                    .is_none_or(|selected| product.category_id.as_ref() == Some(selected))
            })
            .filter(|product| needle.is_empty() || matches_search(product, &needle))
            .collect()
    }

    /// Product tracker.
    #[must_use]
    pub const fn products(&self) -> &DirtyTracker<Product> {
        &self.products
    }

    /// Category tracker.
    #[must_use]
    pub const fn categories(&self) -> &DirtyTracker<Category> {
        &self.categories
    }

    /// Image URL for a product, if the index has one.
    #[must_use]
    pub fn image_url(&self, product: &ProductId) -> Option<&str> {
        self.images.get(product).map(String::as_str)
    }

    /// Show or hide a product. Returns whether it is now dirty.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::UnknownEntity` if the product is not loaded.
    pub fn toggle_product(&mut self, id: &ProductId, shown: bool) -> Result<bool, TrackerError> {
        self.products.toggle(id, shown)
    }

    /// Show or hide a category. Returns whether it is now dirty.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::UnknownEntity` if the category is not loaded.
    pub fn toggle_category(&mut self, id: &CategoryId, shown: bool) -> Result<bool, TrackerError> {
        self.categories.toggle(id, shown)
    }

    /// Push every dirty product to the gateway.
    pub async fn apply_products(&mut self) -> ApplyReport {
        self.products.apply(&self.api).await
    }

    /// Push every dirty category to the gateway.
    pub async fn apply_categories(&mut self) -> ApplyReport {
        self.categories.apply(&self.api).await
    }

    /// Pending toggle counts.
    #[must_use]
    pub fn pending_changes(&self) -> PendingChanges {
        PendingChanges {
            products: self.products.dirty_count(),
            categories: self.categories.dirty_count(),
        }
    }
}

fn matches_search(product: &Product, needle: &str) -> bool {
    [
        product.product_code.as_deref(),
        product.product_name.as_deref(),
        Some(product.product_id.as_str()),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(needle))
}

/// Deserialize records, skipping the ones that do not parse.
fn parse_records<T: DeserializeOwned>(records: Vec<Value>, resource: Resource) -> Vec<T> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(
                    resource = resource.gateway_path(),
                    error = %e,
                    "Skipping unreadable record"
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::RawQuery;
    use axum::http::StatusCode;
    use axum::routing::{MethodRouter, get, post};
    use axum::{Json, Router};
    use chrono::{TimeDelta, Utc};
    use display_toggle_core::DisplayFlag;
    use serde_json::json;

    use super::*;
    use crate::store::{MemoryStore, StorageKey};
    use crate::test_support::spawn_gateway;
    use crate::token::TokenManager;
    use crate::tracker::ApplyStatus;

    fn logged_in_store() -> MemoryStore {
        store_expiring_in(TimeDelta::hours(1))
    }

    fn store_expiring_in(lifetime: TimeDelta) -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .set_many(vec![
                (StorageKey::ContractId, "skaa0001".to_string()),
                (StorageKey::ClientId, "client".to_string()),
                (StorageKey::ClientSecret, "secret".to_string()),
                (StorageKey::Environment, "dev".to_string()),
                (StorageKey::AccessToken, "tok".to_string()),
                (
                    StorageKey::TokenExpiresAt,
                    (Utc::now() + lifetime)
                        .timestamp_millis()
                        .to_string(),
                ),
            ])
            .unwrap();
        store
    }

    fn default_categories() -> MethodRouter {
        get(|RawQuery(query): RawQuery| async move {
            assert!(query.unwrap_or_default().contains("sort=displaySequence"));
            Json(json!([
                {"categoryId": "1", "categoryName": "Drinks", "displayFlag": "1"},
                {"categoryId": "2", "categoryName": "Snacks", "displayFlag": "0"},
            ]))
        })
    }

    fn default_products() -> MethodRouter {
        get(|| async {
            Json(json!({"products": [
                {"productId": "10", "productName": "Cola", "productCode": "JAN-001",
                 "categoryId": "1", "displayFlag": "1"},
                {"productId": "11", "productName": "Lemon Soda", "categoryId": "1",
                 "displayFlag": "0"},
                {"productId": "20", "productName": "Crisps", "categoryId": "2",
                 "displayFlag": "1"},
                {"productName": "no id"},
            ]}))
        })
    }

    fn catalog_router(
        images_fail: bool,
        categories: MethodRouter,
        products: MethodRouter,
    ) -> Router {
        Router::new()
            .route("/categories", categories)
            .route(
                "/product-images",
                get(move || async move {
                    if images_fail {
                        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "down"})))
                    } else {
                        (
                            StatusCode::OK,
                            Json(json!([{"productId": "10", "url": "https://img/10.png"}])),
                        )
                    }
                }),
            )
            .route("/products", products)
    }

    fn default_router() -> Router {
        catalog_router(false, default_categories(), default_products())
    }

    async fn session_for(router: Router) -> ConsoleSession<MemoryStore> {
        let gateway = spawn_gateway(router).await;
        let tokens = TokenManager::new(gateway, logged_in_store()).unwrap();
        ConsoleSession::new(CatalogApi::new(Arc::new(tokens)))
    }

    #[tokio::test]
    async fn test_load_catalog_selects_first_category() {
        let mut session = session_for(default_router()).await;
        session.load_catalog().await.unwrap();

        assert_eq!(session.categories().len(), 2);
        // The record without an ID is skipped.
        assert_eq!(session.products().len(), 3);
        assert_eq!(session.selected_category(), Some(&CategoryId::new("1")));
        assert_eq!(
            session.image_url(&ProductId::new("10")),
            Some("https://img/10.png")
        );

        let visible: Vec<&str> = session
            .visible_products()
            .iter()
            .map(|p| p.product_id.as_str())
            .collect();
        assert_eq!(visible, vec!["10", "11"]);
    }

    #[tokio::test]
    async fn test_load_catalog_renews_expired_token_once() {
        let auth_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&auth_calls);
        let router = default_router().route(
            "/auth",
            post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(json!({"success": true, "access_token": "tok-2", "expires_in": 3600}))
                }
            }),
        );
        let gateway = spawn_gateway(router).await;
        let tokens = TokenManager::new(gateway, store_expiring_in(-TimeDelta::minutes(1))).unwrap();
        let mut session = ConsoleSession::new(CatalogApi::new(Arc::new(tokens)));

        session.load_catalog().await.unwrap();

        assert_eq!(auth_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.categories().len(), 2);
        assert!(session.api().tokens().is_token_valid().await);
    }

    #[tokio::test]
    async fn test_image_failure_is_not_fatal() {
        let mut session = session_for(catalog_router(
            true,
            default_categories(),
            default_products(),
        ))
        .await;
        session.load_catalog().await.unwrap();

        assert_eq!(session.products().len(), 3);
        assert_eq!(session.image_url(&ProductId::new("10")), None);
    }

    #[tokio::test]
    async fn test_failed_load_leaves_state_untouched() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let products = get(move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    (
                        StatusCode::OK,
                        Json(json!([{"productId": "10", "categoryId": "1", "displayFlag": "1"}])),
                    )
                } else {
                    (StatusCode::BAD_GATEWAY, Json(json!({"error": "vendor down"})))
                }
            }
        });
        let router = catalog_router(false, default_categories(), products);
        let mut session = session_for(router).await;
        session.load_catalog().await.unwrap();
        session.toggle_product(&ProductId::new("10"), false).unwrap();

        let err = session.load_catalog().await.unwrap_err();
        assert_eq!(err.to_string(), "vendor down");
        assert_eq!(session.products().len(), 1);
        assert_eq!(session.pending_changes().products, 1);
    }

    #[tokio::test]
    async fn test_search_and_category_filter() {
        let mut session = session_for(default_router()).await;
        session.load_catalog().await.unwrap();

        session.select_category(None).unwrap();
        session.set_search("SODA");
        let visible: Vec<&str> = session
            .visible_products()
            .iter()
            .map(|p| p.product_id.as_str())
            .collect();
        assert_eq!(visible, vec!["11"]);

        session.set_search("jan-001");
        assert_eq!(session.visible_products().len(), 1);

        session.set_search("20");
        assert_eq!(session.visible_products().len(), 1);

        session.select_category(Some(CategoryId::new("1"))).unwrap();
        assert!(session.visible_products().is_empty());

        assert_eq!(
            session.select_category(Some(CategoryId::new("99"))),
            Err(TrackerError::UnknownEntity("99".to_string()))
        );
    }

    #[tokio::test]
    async fn test_apply_categories_reports_and_reconciles() {
        let categories = get(|| async {
            Json(json!([
                {"categoryId": "1", "displayFlag": "1"},
                {"categoryId": "2", "displayFlag": "1"},
            ]))
        })
        .patch(|Json(body): Json<Value>| async move {
            let id = body["categories"][0]["categoryId"].as_str().unwrap().to_string();
            if id == "2" {
                (
                    StatusCode::MULTI_STATUS,
                    Json(json!({
                        "success": false,
                        "results": [],
                        "errors": [{"id": id, "success": false, "error": "locked"}],
                    })),
                )
            } else {
                (
                    StatusCode::OK,
                    Json(json!({
                        "success": true,
                        "results": [{"id": id, "success": true}],
                        "errors": [],
                    })),
                )
            }
        });
        let router = catalog_router(false, categories, default_products());
        let mut session = session_for(router).await;
        session.load_catalog().await.unwrap();

        session.toggle_category(&CategoryId::new("1"), false).unwrap();
        session.toggle_category(&CategoryId::new("2"), false).unwrap();
        assert_eq!(
            session.pending_changes(),
            PendingChanges {
                products: 0,
                categories: 2
            }
        );

        let report = session.apply_categories().await;
        assert_eq!(report.status(), ApplyStatus::Partial);
        assert_eq!(report.succeeded, vec!["1"]);
        assert_eq!(report.failed[0].error, "2: locked");
        assert_eq!(session.pending_changes().categories, 1);
        assert_eq!(
            session.categories().get(&CategoryId::new("1")).unwrap().display_flag,
            DisplayFlag::Hidden
        );
    }

    #[tokio::test]
    async fn test_apply_products_without_changes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let products = default_products().patch(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Json(json!({"success": true, "results": [], "errors": []}))
            }
        });
        let router = catalog_router(false, default_categories(), products);
        let mut session = session_for(router).await;

        let report = session.apply_products().await;
        assert_eq!(report.status(), ApplyStatus::NoChanges);
        assert!(session.pending_changes().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
