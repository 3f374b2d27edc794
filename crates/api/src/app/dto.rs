use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use stylehub_auth::UserAccount;
use stylehub_core::ProductId;
use stylehub_infra::SaleFilter;
use stylehub_inventory::StockShortfall;
use stylehub_products::Product;
use stylehub_sales::{
    CheckoutLine, CheckoutRequest, CustomerSnapshot, PaymentDescriptor, Sale, SaleItem, SaleStatus,
    SaleSummary, SaleTotals, SaleWithItems, ShippingSnapshot,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDto {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDto {
    pub address: String,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    pub country: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDto {
    pub method: String,
    pub card_last4: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItemDto {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i32,
    pub size: Option<String>,
    pub color: Option<String>,
    pub price: Decimal,
    pub subtotal: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct TotalsDto {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub customer: CustomerDto,
    pub shipping: ShippingDto,
    pub payment: PaymentDto,
    pub items: Vec<SaleItemDto>,
    pub totals: TotalsDto,
    pub order_date: Option<DateTime<Utc>>,
}

impl CreateSaleRequest {
    /// Map to the domain request; fails only on malformed product ids.
    pub fn into_checkout(self) -> Result<CheckoutRequest, String> {
        let mut items = Vec::with_capacity(self.items.len());
        for (index, item) in self.items.into_iter().enumerate() {
            let product_id: ProductId = item
                .product_id
                .parse()
                .map_err(|_| format!("items[{index}].productId is not a valid id"))?;
            items.push(CheckoutLine {
                product_id,
                product_name: item.product_name,
                quantity: item.quantity,
                size: item.size,
                color: item.color,
                price: item.price,
                subtotal: item.subtotal,
            });
        }

        Ok(CheckoutRequest {
            customer: CustomerSnapshot {
                first_name: self.customer.first_name,
                last_name: self.customer.last_name,
                email: self.customer.email,
                phone: self.customer.phone,
            },
            shipping: ShippingSnapshot {
                address: self.shipping.address,
                city: self.shipping.city,
                state: self.shipping.state.unwrap_or_default(),
                zip_code: self.shipping.zip_code.unwrap_or_default(),
                country: self.shipping.country,
            },
            payment: PaymentDescriptor {
                method: self.payment.method,
                card_last4: self.payment.card_last4,
            },
            items,
            totals: SaleTotals {
                subtotal: self.totals.subtotal,
                shipping: self.totals.shipping,
                tax: self.totals.tax,
                total: self.totals.total,
            },
            order_date: self.order_date,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSalesQuery {
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl ListSalesQuery {
    pub fn into_filter(self) -> Result<SaleFilter, String> {
        let status = match self.status.as_deref() {
            None | Some("") | Some("all") => None,
            Some(s) => Some(s.parse::<SaleStatus>().map_err(|e| e.to_string())?),
        };

        let start_date = self
            .start_date
            .as_deref()
            .map(|s| parse_date_bound(s, false))
            .transpose()
            .map_err(|_| "startDate must be RFC 3339 or YYYY-MM-DD".to_string())?;
        let end_date = self
            .end_date
            .as_deref()
            .map(|s| parse_date_bound(s, true))
            .transpose()
            .map_err(|_| "endDate must be RFC 3339 or YYYY-MM-DD".to_string())?;

        // Month filtering needs both halves; either alone is ignored.
        let month = match (self.month, self.year) {
            (Some(m), Some(y)) if (1..=12).contains(&m) => Some((m, y)),
            (Some(_), Some(_)) => return Err("month must be between 1 and 12".to_string()),
            _ => None,
        };

        Ok(SaleFilter {
            status,
            start_date,
            end_date,
            month,
        })
    }
}

/// A full timestamp, or a bare date meaning the start (or end) of that UTC day.
fn parse_date_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, chrono::ParseError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
    } else {
        NaiveTime::MIN
    };
    Ok(date.and_time(time).and_utc())
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn sale_to_json(sale: &Sale) -> serde_json::Value {
    serde_json::json!({
        "id": sale.id.to_string(),
        "orderNumber": sale.order_number.as_str(),
        "customer": {
            "firstName": sale.customer.first_name,
            "lastName": sale.customer.last_name,
            "email": sale.customer.email,
            "phone": sale.customer.phone,
        },
        "shipping": {
            "address": sale.shipping.address,
            "city": sale.shipping.city,
            "state": sale.shipping.state,
            "zipCode": sale.shipping.zip_code,
            "country": sale.shipping.country,
        },
        "payment": {
            "method": sale.payment.method,
            "cardLast4": sale.payment.card_last4,
        },
        "totals": {
            "subtotal": sale.totals.subtotal,
            "shipping": sale.totals.shipping,
            "tax": sale.totals.tax,
            "total": sale.totals.total,
        },
        "status": sale.status.as_str(),
        "orderDate": sale.order_date.to_rfc3339(),
        "createdAt": sale.created_at.to_rfc3339(),
        "updatedAt": sale.updated_at.to_rfc3339(),
    })
}

pub fn sale_item_to_json(item: &SaleItem) -> serde_json::Value {
    serde_json::json!({
        "id": item.id.to_string(),
        "productId": item.product_id.to_string(),
        "productName": item.product_name,
        "quantity": item.quantity,
        "size": item.size,
        "color": item.color,
        "price": item.price,
        "subtotal": item.subtotal,
    })
}

pub fn sale_with_items_to_json(record: &SaleWithItems) -> serde_json::Value {
    let mut value = sale_to_json(&record.sale);
    value["items"] = record.items.iter().map(sale_item_to_json).collect();
    value
}

pub fn sale_summary_to_json(summary: &SaleSummary) -> serde_json::Value {
    let mut value = sale_to_json(&summary.sale);
    value["itemsCount"] = summary.items_count.into();
    value["totalItems"] = summary.total_items.into();
    value
}

pub fn shortfall_to_json(s: &StockShortfall) -> serde_json::Value {
    let mut value = serde_json::json!({
        "product": s.product,
        "requested": s.requested,
        "available": s.available,
    });
    if let Some(error) = &s.error {
        value["error"] = error.as_str().into();
    }
    value
}

pub fn product_to_json(p: &Product) -> serde_json::Value {
    serde_json::json!({
        "id": p.id.to_string(),
        "name": p.name,
        "category": p.category,
        "description": p.description,
        "price": p.price,
        "oldPrice": p.old_price,
        "stock": p.stock,
        "sku": p.sku,
        "badge": p.badge,
        "rating": p.rating,
        "unitsSold": p.units_sold,
        "sizes": p.attributes.sizes,
        "colors": p.attributes.colors,
        "features": p.attributes.features,
        "specifications": p.attributes.specifications,
        "images": p.images,
        "inStock": p.is_in_stock(),
        "lowStock": p.is_low_stock(),
        "createdAt": p.created_at.to_rfc3339(),
        "updatedAt": p.updated_at.to_rfc3339(),
    })
}

pub fn user_to_json(u: &UserAccount) -> serde_json::Value {
    serde_json::json!({
        "id": u.id.to_string(),
        "name": u.name,
        "email": u.email,
        "phone": u.phone,
        "role": u.role.as_str(),
        "avatar": u.avatar,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_maps_all_to_no_status() {
        let q = ListSalesQuery {
            status: Some("all".to_string()),
            ..Default::default()
        };
        assert_eq!(q.into_filter().unwrap(), SaleFilter::default());
    }

    #[test]
    fn list_query_rejects_unknown_status() {
        let q = ListSalesQuery {
            status: Some("shipped".to_string()),
            ..Default::default()
        };
        assert!(q.into_filter().is_err());
    }

    #[test]
    fn bare_end_date_covers_the_whole_day() {
        let q = ListSalesQuery {
            start_date: Some("2024-03-01".to_string()),
            end_date: Some("2024-03-31".to_string()),
            ..Default::default()
        };
        let f = q.into_filter().unwrap();
        assert_eq!(f.start_date.unwrap().to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(f.end_date.unwrap().to_rfc3339(), "2024-03-31T23:59:59.999+00:00");
    }

    #[test]
    fn create_sale_request_rejects_bad_product_id() {
        let body = serde_json::json!({
            "customer": {"firstName": "A", "lastName": "B", "email": "a@b.co"},
            "shipping": {"address": "x", "city": "y", "country": "z"},
            "payment": {"method": "cash"},
            "items": [{"productId": "nope", "productName": "Hat", "quantity": 1, "price": 5}],
            "totals": {"subtotal": 5, "shipping": 0, "tax": 0, "total": 5}
        });
        let req: CreateSaleRequest = serde_json::from_value(body).unwrap();
        let err = req.into_checkout().unwrap_err();
        assert!(err.contains("productId"));
    }

    #[test]
    fn shortfall_omits_absent_error() {
        let s = StockShortfall {
            product: "Hat".to_string(),
            requested: 2,
            available: 1,
            error: None,
        };
        assert!(shortfall_to_json(&s).get("error").is_none());
    }
}
