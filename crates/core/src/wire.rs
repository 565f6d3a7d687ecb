//! Envelopes exchanged between the console and the gateway.
//!
//! Every gateway failure uses the same shape, `{"success": false, "error":
//! "..."}`, optionally with extra diagnostic fields. Successful list
//! responses are the vendor's body passed through untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{CategoryId, DisplayFlag, ProductId};

/// Header carrying the vendor access token.
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";
/// Header carrying the Smaregi contract ID.
pub const CONTRACT_ID_HEADER: &str = "x-contract-id";
/// Header carrying the target environment (`dev` / `prod`).
pub const ENVIRONMENT_HEADER: &str = "x-environment";

/// Body of `POST /auth`.
///
/// Fields default to empty so the gateway can report every missing field at
/// once instead of failing on the first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    /// Smaregi contract ID.
    #[serde(default)]
    pub contract_id: String,
    /// App client ID.
    #[serde(default)]
    pub client_id: String,
    /// App client secret.
    #[serde(default)]
    pub client_secret: String,
    /// `dev` or `prod`.
    #[serde(default)]
    pub environment: String,
}

/// Successful `POST /auth` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSuccess {
    /// Always `true`.
    pub success: bool,
    /// Bearer token for the vendor API.
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
    /// Usually `Bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
}

/// Failure envelope, as read by clients.
///
/// The gateway always sets `error`; `message` is kept for bodies produced
/// by other intermediaries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error.
    #[serde(default)]
    pub error: Option<String>,
    /// Alternative message field.
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// The most specific message available.
    #[must_use]
    pub fn into_message(self) -> Option<String> {
        self.error
            .filter(|e| !e.is_empty())
            .or(self.message.filter(|m| !m.is_empty()))
    }
}

/// One product in a `PATCH /products` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    /// Product to update.
    pub product_id: ProductId,
    /// New flag.
    pub display_flag: DisplayFlag,
    /// Name, sent for log correlation on the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    /// Category, sent for log correlation on the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
}

/// One category in a `PATCH /categories` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryUpdate {
    /// Category to update.
    pub category_id: CategoryId,
    /// New flag.
    pub display_flag: DisplayFlag,
}

/// `PATCH /products` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProductsRequest {
    /// Items to update, applied in order.
    #[serde(default)]
    pub products: Vec<ProductUpdate>,
}

/// `PATCH /categories` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCategoriesRequest {
    /// Items to update, applied in order.
    #[serde(default)]
    pub categories: Vec<CategoryUpdate>,
}

/// Outcome of one item in a batch update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemResult {
    /// Product or category ID.
    pub id: String,
    /// Whether the vendor accepted the update.
    pub success: bool,
    /// Vendor response body on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Vendor error body, or a transport error message, on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// HTTP status the vendor answered a failed item with. Absent when the
    /// vendor was never reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

/// Response of a batch update. Sent with 200 when every item succeeded and
/// 207 otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// `true` iff `errors` is empty.
    pub success: bool,
    /// Accepted items.
    #[serde(default)]
    pub results: Vec<BatchItemResult>,
    /// Rejected items.
    #[serde(default)]
    pub errors: Vec<BatchItemResult>,
}

impl BatchReport {
    /// Find the failure entry for an ID, if any.
    #[must_use]
    pub fn failure_for(&self, id: &str) -> Option<&BatchItemResult> {
        self.errors.iter().find(|item| item.id == id)
    }

    /// Whether the vendor refused the access token for any item.
    #[must_use]
    pub fn token_rejected(&self) -> bool {
        self.errors.iter().any(|item| item.status == Some(401))
    }

    /// Human-readable summary of a failed item's error.
    #[must_use]
    pub fn describe_error(item: &BatchItemResult) -> String {
        match &item.error {
            Some(Value::String(message)) => message.clone(),
            Some(Value::Object(map)) => map
                .get("detail")
                .or_else(|| map.get("title"))
                .or_else(|| map.get("error"))
                .and_then(Value::as_str)
                .map_or_else(|| Value::Object(map.clone()).to_string(), str::to_owned),
            Some(other) => other.to_string(),
            None => "update rejected".to_string(),
        }
    }
}
