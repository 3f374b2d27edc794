use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stylehub_core::{DomainError, ProductId};

/// Stock level under which a product counts as "low stock".
pub const LOW_STOCK_THRESHOLD: i32 = 20;

/// Structured selling attributes of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAttributes {
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    /// Free-form specification table (e.g. `{"material": "cotton"}`).
    #[serde(default = "empty_object")]
    pub specifications: serde_json::Value,
}

impl Default for ProductAttributes {
    fn default() -> Self {
        Self {
            sizes: Vec::new(),
            colors: Vec::new(),
            features: Vec::new(),
            specifications: empty_object(),
        }
    }
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// A catalog product as stored.
///
/// `stock` is mutated only by committed sales; `units_sold` counts units sold
/// through the sale processor and is unrelated to reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub old_price: Option<Decimal>,
    pub stock: i32,
    pub sku: String,
    pub badge: Option<String>,
    pub rating: Option<Decimal>,
    pub units_sold: i64,
    pub attributes: ProductAttributes,
    /// Stable URLs handed out by the external object storage.
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_in_stock(&self) -> bool {
        self.stock > 0
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock < LOW_STOCK_THRESHOLD
    }
}

/// Input for inserting a product row (seeding, fixtures, catalog tooling).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub old_price: Option<Decimal>,
    pub stock: i32,
    pub sku: String,
    pub badge: Option<String>,
    #[serde(default)]
    pub attributes: ProductAttributes,
    #[serde(default)]
    pub images: Vec<String>,
}

impl NewProduct {
    /// Minimal product with the given name, price and stock; the SKU is derived from the name.
    pub fn simple(name: impl Into<String>, price: Decimal, stock: i32) -> Self {
        let name = name.into();
        let sku = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect::<String>();
        Self {
            sku: format!("SKU-{sku}"),
            name,
            category: "general".to_string(),
            description: None,
            price,
            old_price: None,
            stock,
            badge: None,
            attributes: ProductAttributes::default(),
            images: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }
        if self.price.is_sign_negative() {
            return Err(DomainError::validation("price cannot be negative"));
        }
        if self.stock < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        Ok(())
    }

    /// Materialize the row as the store would persist it.
    pub fn into_product(self, id: ProductId, now: DateTime<Utc>) -> Product {
        Product {
            id,
            name: self.name,
            category: self.category,
            description: self.description,
            price: self.price,
            old_price: self.old_price,
            stock: self.stock,
            sku: self.sku,
            badge: self.badge,
            rating: None,
            units_sold: 0,
            attributes: self.attributes,
            images: self.images,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn simple_product_derives_sku_from_name() {
        let p = NewProduct::simple("Linen shirt", Decimal::new(2999, 2), 5);
        assert_eq!(p.sku, "SKU-LINENSHIRT");
        assert!(p.validate().is_ok());
    }

    #[test]
    fn validate_rejects_negative_stock() {
        let mut p = NewProduct::simple("Cap", Decimal::ONE, 1);
        p.stock = -1;
        match p.validate().unwrap_err() {
            DomainError::Validation(msg) => assert!(msg.contains("stock")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_empty_name_and_negative_price() {
        let p = NewProduct::simple("   ", Decimal::ONE, 1);
        assert!(matches!(p.validate(), Err(DomainError::Validation(_))));

        let p = NewProduct::simple("Hat", Decimal::new(-1, 0), 1);
        assert!(matches!(p.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn into_product_starts_with_zero_units_sold() {
        let now = Utc::now();
        let product = NewProduct::simple("Scarf", Decimal::TEN, 3).into_product(ProductId::new(), now);
        assert_eq!(product.units_sold, 0);
        assert_eq!(product.created_at, now);
        assert!(product.is_in_stock());
        assert!(product.is_low_stock());
    }

    #[test]
    fn attributes_default_specifications_to_empty_object() {
        let attrs: ProductAttributes = serde_json::from_str(r#"{"sizes":["M"]}"#).unwrap();
        assert_eq!(attrs.sizes, vec!["M".to_string()]);
        assert!(attrs.specifications.as_object().unwrap().is_empty());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: stock flags follow the stock level alone.
            #[test]
            fn stock_flags_follow_stock(stock in 0i32..1_000) {
                let product = NewProduct::simple("Sock", Decimal::ONE, stock)
                    .into_product(ProductId::new(), Utc::now());
                prop_assert_eq!(product.is_in_stock(), stock > 0);
                prop_assert_eq!(product.is_low_stock(), stock < LOW_STOCK_THRESHOLD);
            }
        }
    }
}
