//! End-to-end harness for Display Toggle.
//!
//! Each test gets three live pieces on ephemeral local ports:
//!
//! - a stand-in Smaregi vendor ([`FakeVendor`]) holding an in-memory catalog
//! - the real gateway app pointed at that vendor
//! - console clients talking to the gateway
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p display-toggle-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, RawQuery, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use display_toggle_console::{
    CatalogApi, ConsoleSession, Credentials, MemoryStore, TokenManager,
};
use display_toggle_core::Environment;
use display_toggle_gateway::{AppState, GatewayConfig, VendorEndpoints};
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

/// Contract every test logs in to.
pub const CONTRACT_ID: &str = "skaa0001";
/// Client ID the vendor accepts.
pub const CLIENT_ID: &str = "client";
/// Client secret the vendor accepts.
pub const CLIENT_SECRET: &str = "secret";

/// `Basic base64("client:secret")`.
const EXPECTED_BASIC: &str = "Basic Y2xpZW50OnNlY3JldA==";

/// Which vendor collection a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// `pos/products`
    Products,
    /// `pos/categories`
    Categories,
    /// `pos/products/images`
    Images,
}

#[derive(Default)]
struct VendorInner {
    products: Mutex<Vec<Value>>,
    categories: Mutex<Vec<Value>>,
    images: Mutex<Vec<Value>>,
    locked: Mutex<HashSet<String>>,
    issued: Mutex<Vec<String>>,
    revoked: AtomicBool,
    images_fail: AtomicBool,
    token_calls: AtomicUsize,
    list_queries: Mutex<Vec<(Collection, String)>>,
    patches: Mutex<Vec<(Collection, String, String)>>,
}

/// In-memory stand-in for the Smaregi identity and POS APIs.
#[derive(Clone, Default)]
pub struct FakeVendor {
    inner: Arc<VendorInner>,
}

impl FakeVendor {
    /// Vendor with `categories` categories and `products` products spread
    /// round-robin over them. Even-numbered records start shown.
    #[must_use]
    pub fn with_catalog(categories: usize, products: usize) -> Self {
        let vendor = Self::default();
        {
            let mut rows = vendor.inner.categories.lock().unwrap();
            for n in 1..=categories {
                rows.push(json!({
                    "categoryId": n.to_string(),
                    "categoryName": format!("Category {n}"),
                    "displayFlag": if n % 2 == 0 { "1" } else { "0" },
                    "level": "1",
                }));
            }
        }
        {
            let mut rows = vendor.inner.products.lock().unwrap();
            let mut images = vendor.inner.images.lock().unwrap();
            for n in 1..=products {
                let id = (1000 + n).to_string();
                let category = if categories == 0 { 0 } else { (n - 1) % categories + 1 };
                rows.push(json!({
                    "productId": id,
                    "productName": format!("Product {n}"),
                    "productCode": format!("JAN{n:05}"),
                    "categoryId": category.to_string(),
                    "displayFlag": if n % 2 == 0 { "1" } else { "0" },
                    "price": "100",
                }));
                images.push(json!({"productId": id, "url": format!("https://img.example/{id}.png")}));
            }
        }
        vendor
    }

    /// Reject display flag updates for this ID.
    pub fn lock(&self, id: &str) {
        self.inner.locked.lock().unwrap().insert(id.to_string());
    }

    /// Invalidate every token issued so far.
    pub fn revoke_tokens(&self) {
        self.inner.revoked.store(true, Ordering::SeqCst);
    }

    /// Make the image index endpoint fail.
    pub fn fail_images(&self) {
        self.inner.images_fail.store(true, Ordering::SeqCst);
    }

    /// Number of token exchanges attempted.
    #[must_use]
    pub fn token_calls(&self) -> usize {
        self.inner.token_calls.load(Ordering::SeqCst)
    }

    /// Raw query strings of list calls to one collection, in order.
    #[must_use]
    pub fn list_queries(&self, collection: Collection) -> Vec<String> {
        self.inner
            .list_queries
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == collection)
            .map(|(_, q)| q.clone())
            .collect()
    }

    /// Accepted display flag updates as `(id, flag)`, in order.
    #[must_use]
    pub fn patches(&self, collection: Collection) -> Vec<(String, String)> {
        self.inner
            .patches
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _, _)| *c == collection)
            .map(|(_, id, flag)| (id.clone(), flag.clone()))
            .collect()
    }

    /// Current vendor-side flag of a product.
    #[must_use]
    pub fn product_flag(&self, id: &str) -> Option<String> {
        Self::flag_of(&self.inner.products, "productId", id)
    }

    /// Current vendor-side flag of a category.
    #[must_use]
    pub fn category_flag(&self, id: &str) -> Option<String> {
        Self::flag_of(&self.inner.categories, "categoryId", id)
    }

    fn flag_of(rows: &Mutex<Vec<Value>>, key: &str, id: &str) -> Option<String> {
        rows.lock()
            .unwrap()
            .iter()
            .find(|row| row[key] == id)
            .and_then(|row| row["displayFlag"].as_str().map(str::to_string))
    }

    fn rows(&self, collection: Collection) -> &Mutex<Vec<Value>> {
        match collection {
            Collection::Products => &self.inner.products,
            Collection::Categories => &self.inner.categories,
            Collection::Images => &self.inner.images,
        }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        if self.inner.revoked.load(Ordering::SeqCst) {
            return false;
        }
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| self.inner.issued.lock().unwrap().iter().any(|t| t == token))
    }

    /// Router serving the identity and POS endpoints.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/app/{contract}/token", post(issue_token))
            .route(
                "/{contract}/pos/products",
                get(|state: State<Self>, params: ListParams, raw: RawQuery, headers: HeaderMap| {
                    list(state, Collection::Products, params, raw, headers)
                }),
            )
            .route(
                "/{contract}/pos/categories",
                get(|state: State<Self>, params: ListParams, raw: RawQuery, headers: HeaderMap| {
                    list(state, Collection::Categories, params, raw, headers)
                }),
            )
            .route(
                "/{contract}/pos/products/images",
                get(|state: State<Self>, params: ListParams, raw: RawQuery, headers: HeaderMap| {
                    list(state, Collection::Images, params, raw, headers)
                }),
            )
            .route(
                "/{contract}/pos/products/{id}",
                patch(
                    |state: State<Self>, path: IdPath, headers: HeaderMap, body: Json<Value>| {
                        update(state, Collection::Products, path, headers, body)
                    },
                ),
            )
            .route(
                "/{contract}/pos/categories/{id}",
                patch(
                    |state: State<Self>, path: IdPath, headers: HeaderMap, body: Json<Value>| {
                        update(state, Collection::Categories, path, headers, body)
                    },
                ),
            )
            .with_state(self.clone())
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"title": "Unauthorized", "detail": "access token is invalid"})),
    )
        .into_response()
}

async fn issue_token(State(vendor): State<FakeVendor>, headers: HeaderMap) -> Response {
    let n = vendor.inner.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let basic = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    if basic != Some(EXPECTED_BASIC) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "invalid_client",
                "error_description": "Client authentication failed",
            })),
        )
            .into_response();
    }

    let token = format!("tok-{n}");
    vendor.inner.issued.lock().unwrap().push(token.clone());
    vendor.inner.revoked.store(false, Ordering::SeqCst);
    Json(json!({
        "access_token": token,
        "expires_in": 3600,
        "token_type": "Bearer",
        "scope": "pos.products:read pos.products:write",
    }))
    .into_response()
}

type ListParams = Query<HashMap<String, String>>;
type IdPath = Path<(String, String)>;

async fn list(
    State(vendor): State<FakeVendor>,
    collection: Collection,
    Query(params): ListParams,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let query = query.unwrap_or_default();
    vendor
        .inner
        .list_queries
        .lock()
        .unwrap()
        .push((collection, query.clone()));

    if !vendor.authorized(&headers) {
        return unauthorized();
    }
    if collection == Collection::Images && vendor.inner.images_fail.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"title": "Internal Server Error"})),
        )
            .into_response();
    }

    let limit: usize = params.get("limit").and_then(|v| v.parse().ok()).unwrap_or(100);
    let page: usize = params.get("page").and_then(|v| v.parse().ok()).unwrap_or(1);

    let rows = vendor.rows(collection).lock().unwrap();
    let page_rows: Vec<Value> = rows
        .iter()
        .skip((page.max(1) - 1) * limit)
        .take(limit)
        .cloned()
        .collect();
    Json(Value::Array(page_rows)).into_response()
}

async fn update(
    State(vendor): State<FakeVendor>,
    collection: Collection,
    Path((_contract, id)): IdPath,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !vendor.authorized(&headers) {
        return unauthorized();
    }
    if vendor.inner.locked.lock().unwrap().contains(&id) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"title": "Bad Request", "detail": format!("{id} is locked")})),
        )
            .into_response();
    }

    let key = match collection {
        Collection::Categories => "categoryId",
        Collection::Products | Collection::Images => "productId",
    };
    let Some(flag) = body["displayFlag"].as_str().map(str::to_string) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"title": "Bad Request", "detail": "displayFlag is required"})),
        )
            .into_response();
    };

    let mut rows = vendor.rows(collection).lock().unwrap();
    let Some(row) = rows.iter_mut().find(|row| row[key] == id.as_str()) else {
        return (StatusCode::NOT_FOUND, Json(json!({"title": "Not Found"}))).into_response();
    };
    row["displayFlag"] = Value::String(flag.clone());
    let updated = row.clone();
    drop(rows);

    vendor
        .inner
        .patches
        .lock()
        .unwrap()
        .push((collection, id, flag));
    Json(updated).into_response()
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    Url::parse(&format!("http://{addr}")).unwrap()
}

/// A running vendor and gateway pair.
pub struct TestContext {
    /// The stand-in vendor.
    pub vendor: FakeVendor,
    /// Base URL of the gateway under test.
    pub gateway_url: Url,
}

impl TestContext {
    /// Start the vendor and a gateway pointed at it.
    pub async fn start(vendor: FakeVendor) -> Self {
        let vendor_url = serve(vendor.router()).await;
        let endpoints = VendorEndpoints::uniform(vendor_url.join("app").unwrap(), vendor_url);
        let state = AppState::new(GatewayConfig::with_endpoints(endpoints)).unwrap();
        let gateway_url = serve(display_toggle_gateway::app(state)).await;

        Self {
            vendor,
            gateway_url,
        }
    }

    /// Credentials for the test contract with the given secret.
    #[must_use]
    pub fn credentials(secret: &str) -> Credentials {
        Credentials {
            contract_id: CONTRACT_ID.to_string(),
            client_id: CLIENT_ID.to_string(),
            client_secret: SecretString::from(secret.to_string()),
            environment: Environment::Dev,
        }
    }

    /// Fresh, logged-out token manager talking to the gateway.
    #[must_use]
    pub fn tokens(&self) -> Arc<TokenManager<MemoryStore>> {
        Arc::new(TokenManager::new(self.gateway_url.clone(), MemoryStore::new()).unwrap())
    }

    /// Token manager that has logged in with the right credentials.
    pub async fn logged_in_tokens(&self) -> Arc<TokenManager<MemoryStore>> {
        let tokens = self.tokens();
        tokens
            .login(&Self::credentials(CLIENT_SECRET))
            .await
            .unwrap();
        tokens
    }

    /// Console session over a logged-in token manager.
    pub async fn session(&self) -> ConsoleSession<MemoryStore> {
        ConsoleSession::new(CatalogApi::new(self.logged_in_tokens().await))
    }

    /// Full URL of a gateway route.
    #[must_use]
    pub fn gateway(&self, path: &str) -> Url {
        self.gateway_url.join(path).unwrap()
    }
}
