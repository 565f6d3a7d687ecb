//! Catalog records as returned by the list endpoints.
//!
//! Field names follow the vendor's camelCase. Snake-case and bare `id`
//! spellings are accepted as aliases so records relayed through older
//! proxies still map.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::display_flag::DisplayFlag;
use super::id::{CategoryId, ProductId};

/// A product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Vendor product ID.
    #[serde(alias = "product_id", alias = "id")]
    pub product_id: ProductId,
    /// Display name.
    #[serde(default, alias = "product_name", alias = "name")]
    pub product_name: Option<String>,
    /// Merchant-assigned product code (JAN, SKU, ...).
    #[serde(default, alias = "product_code")]
    pub product_code: Option<String>,
    /// Owning category.
    #[serde(default, alias = "category_id")]
    pub category_id: Option<CategoryId>,
    /// Whether the product is shown at the register.
    #[serde(default, alias = "display_flag")]
    pub display_flag: DisplayFlag,
    /// Selling price.
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// A category (department) row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Vendor category ID.
    #[serde(alias = "category_id", alias = "id")]
    pub category_id: CategoryId,
    /// Display name.
    #[serde(default, alias = "category_name", alias = "name")]
    pub category_name: Option<String>,
    /// Whether the category is shown at the register.
    #[serde(default, alias = "display_flag")]
    pub display_flag: DisplayFlag,
    /// Hierarchy depth, `"1"` for top-level departments.
    #[serde(default, deserialize_with = "deserialize_level")]
    pub level: Option<String>,
}

/// One entry of the product image index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    /// Product the image belongs to.
    #[serde(alias = "product_id")]
    pub product_id: ProductId,
    /// Public image URL.
    pub url: String,
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<serde_json::Value>::deserialize(deserializer)?.and_then(|value| match value {
        serde_json::Value::String(text) => Some(text),
        serde_json::Value::Number(number) => Some(number.to_string()),
        _ => None,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_product_from_vendor_record() {
        let product: Product = serde_json::from_value(json!({
            "productId": "8000001",
            "productName": "Melon Soda",
            "productCode": "4901234567890",
            "categoryId": "3",
            "displayFlag": "1",
            "price": "280",
            "taxDivision": "1",
        }))
        .unwrap();

        assert_eq!(product.product_id, ProductId::new("8000001"));
        assert_eq!(product.category_id, Some(CategoryId::new("3")));
        assert_eq!(product.display_flag, DisplayFlag::Shown);
        assert_eq!(product.price, Some(Decimal::from(280)));
    }

    #[test]
    fn test_product_from_snake_case_record() {
        let product: Product = serde_json::from_value(json!({
            "product_id": 42,
            "product_name": "Gum",
            "display_flag": false,
        }))
        .unwrap();

        assert_eq!(product.product_id.as_str(), "42");
        assert_eq!(product.product_name.as_deref(), Some("Gum"));
        assert_eq!(product.display_flag, DisplayFlag::Hidden);
        assert_eq!(product.category_id, None);
    }

    #[test]
    fn test_missing_display_flag_is_hidden() {
        let category: Category = serde_json::from_value(json!({
            "categoryId": "1",
            "categoryName": "Drinks",
            "level": 1,
        }))
        .unwrap();

        assert_eq!(category.display_flag, DisplayFlag::Hidden);
        assert_eq!(category.level.as_deref(), Some("1"));
    }

    #[test]
    fn test_category_accepts_bare_id() {
        let category: Category = serde_json::from_value(json!({"id": "9", "name": "Food"})).unwrap();
        assert_eq!(category.category_id, CategoryId::new("9"));
        assert_eq!(category.category_name.as_deref(), Some("Food"));
    }
}
