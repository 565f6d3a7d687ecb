//! Catalog proxy routes: list resources and toggle display flags.
//!
//! Lists pass the vendor's body through untouched. Updates fan out to one
//! vendor `PATCH` per item, sequentially, and report per-item outcomes.

use axum::{
    Json,
    body::Bytes,
    extract::{RawQuery, State},
    http::StatusCode,
};
use display_toggle_core::{
    DisplayFlag, Resource,
    wire::{BatchItemResult, BatchReport, UpdateCategoriesRequest, UpdateProductsRequest},
};
use serde_json::Value;
use tracing::instrument;

use super::parse_body;
use crate::error::Result;
use crate::middleware::RequireVendorSession;
use crate::smaregi::{SmaregiError, VendorSession};
use crate::state::AppState;

// =============================================================================
// Lists
// =============================================================================

/// `GET /products`
#[instrument(skip_all, fields(contract_id = %session.contract_id))]
pub async fn list_products(
    State(state): State<AppState>,
    RequireVendorSession(session): RequireVendorSession,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>> {
    list(&state, &session, Resource::Products, query.as_deref()).await
}

/// `GET /categories`
#[instrument(skip_all, fields(contract_id = %session.contract_id))]
pub async fn list_categories(
    State(state): State<AppState>,
    RequireVendorSession(session): RequireVendorSession,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>> {
    list(&state, &session, Resource::Categories, query.as_deref()).await
}

/// `GET /product-images`
#[instrument(skip_all, fields(contract_id = %session.contract_id))]
pub async fn list_product_images(
    State(state): State<AppState>,
    RequireVendorSession(session): RequireVendorSession,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>> {
    list(&state, &session, Resource::ProductImages, query.as_deref()).await
}

async fn list(
    state: &AppState,
    session: &VendorSession,
    resource: Resource,
    query: Option<&str>,
) -> Result<Json<Value>> {
    let body = state.smaregi().list(session, resource, query).await?;
    Ok(Json(body))
}

// =============================================================================
// Updates
// =============================================================================

/// `PATCH /products`
#[instrument(skip_all, fields(contract_id = %session.contract_id))]
pub async fn update_products(
    State(state): State<AppState>,
    RequireVendorSession(session): RequireVendorSession,
    body: Bytes,
) -> Result<(StatusCode, Json<BatchReport>)> {
    let request: UpdateProductsRequest = parse_body(&body)?;

    let items = request.products.into_iter().map(|product| {
        tracing::debug!(
            product_id = %product.product_id,
            product_name = product.product_name.as_deref().unwrap_or_default(),
            category_id = product.category_id.as_ref().map(ToString::to_string),
            display_flag = %product.display_flag,
            "Queueing product update"
        );
        (product.product_id.to_string(), product.display_flag)
    });

    Ok(apply_updates(&state, &session, Resource::Products, items).await)
}

/// `PATCH /categories`
#[instrument(skip_all, fields(contract_id = %session.contract_id))]
pub async fn update_categories(
    State(state): State<AppState>,
    RequireVendorSession(session): RequireVendorSession,
    body: Bytes,
) -> Result<(StatusCode, Json<BatchReport>)> {
    let request: UpdateCategoriesRequest = parse_body(&body)?;

    let items = request
        .categories
        .into_iter()
        .map(|category| (category.category_id.to_string(), category.display_flag));

    Ok(apply_updates(&state, &session, Resource::Categories, items).await)
}

/// Update each item in order, one vendor call at a time.
///
/// A failed item never stops the rest. Responds 200 when everything
/// succeeded and 207 Multi-Status otherwise.
async fn apply_updates(
    state: &AppState,
    session: &VendorSession,
    resource: Resource,
    items: impl IntoIterator<Item = (String, DisplayFlag)>,
) -> (StatusCode, Json<BatchReport>) {
    let mut results = Vec::new();
    let mut errors = Vec::new();

    for (id, flag) in items {
        match state
            .smaregi()
            .update_display_flag(session, resource, &id, flag)
            .await
        {
            Ok(data) => results.push(BatchItemResult {
                id,
                success: true,
                data: Some(data),
                error: None,
                status: None,
            }),
            Err(e) => {
                let status = match &e {
                    SmaregiError::Upstream { status, .. } => Some(status.as_u16()),
                    _ => None,
                };
                let error = match e {
                    SmaregiError::Upstream { body, .. } if !body.is_null() => body,
                    other => Value::String(other.to_string()),
                };
                errors.push(BatchItemResult {
                    id,
                    success: false,
                    data: None,
                    error: Some(error),
                    status,
                });
            }
        }
    }

    if errors.is_empty() {
        tracing::info!(
            resource = resource.gateway_path(),
            count = results.len(),
            "Display flag update completed"
        );
        (
            StatusCode::OK,
            Json(BatchReport {
                success: true,
                results,
                errors,
            }),
        )
    } else {
        tracing::warn!(
            resource = resource.gateway_path(),
            success = results.len(),
            failed = errors.len(),
            "Display flag update completed with errors"
        );
        (
            StatusCode::MULTI_STATUS,
            Json(BatchReport {
                success: false,
                results,
                errors,
            }),
        )
    }
}
