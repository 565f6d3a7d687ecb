//! Catalog resources and their list-envelope adapters.
//!
//! List endpoints do not agree on where the records live. The vendor
//! returns a bare array, while proxies and older deployments wrap it in an
//! object under one of several keys. Rather than probing ad hoc at every
//! call site, each [`Resource`] declares a [`ListEnvelope`] and the fallback
//! order lives in one table, [`LIST_KEY_PRIORITY`].

use serde_json::Value;

/// Keys probed, in order, when a list response is an object.
pub const LIST_KEY_PRIORITY: &[&str] = &["items", "products", "categories", "data", "results"];

/// A catalog resource exposed by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Products (`/pos/products`).
    Products,
    /// Categories, called departments in the vendor UI (`/pos/categories`).
    Categories,
    /// Product image index (`/pos/products/images`).
    ProductImages,
}

impl Resource {
    /// Path segment on the gateway.
    #[must_use]
    pub const fn gateway_path(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Categories => "categories",
            Self::ProductImages => "product-images",
        }
    }

    /// Path below `{apiBase}/{contractId}/` on the vendor API.
    #[must_use]
    pub const fn vendor_path(self) -> &'static str {
        match self {
            Self::Products => "pos/products",
            Self::Categories => "pos/categories",
            Self::ProductImages => "pos/products/images",
        }
    }

    /// Shape of this resource's list responses.
    #[must_use]
    pub const fn envelope(self) -> ListEnvelope {
        match self {
            Self::Products | Self::Categories | Self::ProductImages => ListEnvelope {
                keys: LIST_KEY_PRIORITY,
                bare_array: true,
            },
        }
    }
}

/// Declares where the records of a list response are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListEnvelope {
    /// Object keys probed in order; the first one holding an array wins.
    pub keys: &'static [&'static str],
    /// Whether a top-level array is the record list itself.
    pub bare_array: bool,
}

impl ListEnvelope {
    /// Pull the record list out of a response body.
    ///
    /// Returns an empty list when no candidate holds an array.
    ///
    /// ```
    /// use display_toggle_core::Resource;
    /// use serde_json::json;
    ///
    /// let envelope = Resource::Products.envelope();
    /// let body = json!({"data": [1], "items": [1, 2]});
    /// assert_eq!(envelope.extract(body).len(), 2);
    /// ```
    #[must_use]
    pub fn extract(&self, body: Value) -> Vec<Value> {
        match body {
            Value::Array(records) if self.bare_array => records,
            Value::Object(mut map) => self
                .keys
                .iter()
                .find(|key| map.get(**key).is_some_and(Value::is_array))
                .and_then(|key| map.remove(*key))
                .and_then(|value| match value {
                    Value::Array(records) => Some(records),
                    _ => None,
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_extract_follows_priority_order() {
        let envelope = Resource::Categories.envelope();
        let body = json!({
            "results": [1, 2, 3],
            "categories": [1],
            "products": [1, 2],
        });
        assert_eq!(envelope.extract(body), vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_extract_skips_non_array_keys() {
        let envelope = Resource::Products.envelope();
        let body = json!({"items": null, "data": [{"productId": "1"}]});
        assert_eq!(envelope.extract(body).len(), 1);
    }

    #[test]
    fn test_extract_bare_array() {
        let envelope = Resource::ProductImages.envelope();
        assert_eq!(envelope.extract(json!([{}, {}])).len(), 2);
    }

    #[test]
    fn test_extract_without_list_is_empty() {
        let envelope = Resource::Products.envelope();
        assert!(envelope.extract(json!({"count": 3})).is_empty());
        assert!(envelope.extract(json!("nope")).is_empty());
    }

    #[test]
    fn test_paths() {
        assert_eq!(Resource::ProductImages.gateway_path(), "product-images");
        assert_eq!(Resource::ProductImages.vendor_path(), "pos/products/images");
    }
}
