//! Storage boundary for sales, inventory, products and users.
//!
//! [`SalesStore`] is the injected handle. Writes that must be atomic go
//! through a [`UnitOfWork`] obtained from [`SalesStore::begin`]; dropping a
//! unit of work without committing rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};

use stylehub_auth::UserAccount;
use stylehub_core::{ProductId, SaleId};
use stylehub_inventory::{Debit, StockEntry};
use stylehub_products::{NewProduct, Product};
use stylehub_sales::{Sale, SaleItem, SaleStatus, SaleSummary, SaleWithItems, TransitionPolicy};

pub mod error;
pub mod in_memory;
pub mod postgres;

pub use error::{ORDER_NUMBER_CONSTRAINT, StoreError, USER_EMAIL_CONSTRAINT};
pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Stock operations that participate in the caller's unit of work.
#[async_trait]
pub trait InventoryLedger: Send {
    /// Take write-intent locks on the given products, in ascending id order.
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<(), StoreError>;

    /// Locked read of the current stock and name; `None` when the product does not exist.
    async fn get_stock_and_name(&mut self, id: ProductId) -> Result<Option<StockEntry>, StoreError>;

    /// `stock -= qty`, `units_sold += qty`. Fails instead of going negative.
    async fn debit(&mut self, debit: Debit) -> Result<(), StoreError>;
}

/// One atomic set of writes.
#[async_trait]
pub trait UnitOfWork: InventoryLedger {
    async fn insert_sale(&mut self, sale: &Sale) -> Result<(), StoreError>;

    async fn insert_sale_item(&mut self, item: &SaleItem) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Filters for [`SalesStore::list_sales`]. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaleFilter {
    pub status: Option<SaleStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Calendar month (1-12) and year of `order_date`.
    pub month: Option<(u32, i32)>,
}

impl SaleFilter {
    pub fn matches(&self, sale: &Sale) -> bool {
        if self.status.is_some_and(|s| s != sale.status) {
            return false;
        }
        if self.start_date.is_some_and(|start| sale.order_date < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| sale.order_date > end) {
            return false;
        }
        if let Some((month, year)) = self.month {
            if sale.order_date.month() != month || sale.order_date.year() != year {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait SalesStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    async fn get_sale(&self, id: SaleId) -> Result<Option<SaleWithItems>, StoreError>;

    /// Newest `order_date` first.
    async fn list_sales(&self, filter: &SaleFilter) -> Result<Vec<SaleSummary>, StoreError>;

    /// Single-row status change under `policy`. `NotFound` when the sale does not exist.
    async fn update_sale_status(
        &self,
        id: SaleId,
        status: SaleStatus,
        policy: TransitionPolicy,
    ) -> Result<Sale, StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError>;

    async fn insert_user(&self, user: &UserAccount) -> Result<(), StoreError>;
}
