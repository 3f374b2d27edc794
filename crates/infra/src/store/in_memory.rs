//! In-memory store for dev and tests.
//!
//! A unit of work holds the store-wide async mutex for its whole lifetime and
//! writes into a private copy of the tables. Commit swaps the copy in; drop
//! discards it. Units of work are therefore fully serialized.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stylehub_auth::UserAccount;
use stylehub_auth::user::normalize_email;
use stylehub_core::{ProductId, SaleId, UserId};
use stylehub_inventory::{Debit, StockEntry};
use stylehub_products::{NewProduct, Product};
use stylehub_sales::{Sale, SaleItem, SaleStatus, SaleSummary, SaleWithItems, TransitionPolicy};

use super::{
    InventoryLedger, ORDER_NUMBER_CONSTRAINT, SaleFilter, SalesStore, StoreError, USER_EMAIL_CONSTRAINT,
    UnitOfWork,
};

const PRODUCT_SKU_CONSTRAINT: &str = "products_sku_key";

#[derive(Debug, Clone, Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    sales: HashMap<SaleId, Sale>,
    sale_items: Vec<SaleItem>,
    users: HashMap<UserId, UserAccount>,
}

impl Tables {
    fn items_of(&self, sale_id: SaleId) -> Vec<SaleItem> {
        self.sale_items
            .iter()
            .filter(|i| i.sale_id == sale_id)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl InventoryLedger for InMemoryUnitOfWork {
    async fn lock_products(&mut self, _ids: &[ProductId]) -> Result<(), StoreError> {
        // The unit of work already holds the store-wide lock.
        Ok(())
    }

    async fn get_stock_and_name(&mut self, id: ProductId) -> Result<Option<StockEntry>, StoreError> {
        Ok(self.working.products.get(&id).map(|p| StockEntry {
            name: p.name.clone(),
            stock: p.stock,
        }))
    }

    async fn debit(&mut self, debit: Debit) -> Result<(), StoreError> {
        let product = self
            .working
            .products
            .get_mut(&debit.product_id)
            .ok_or(StoreError::NotFound)?;

        product.stock = debit
            .apply(product.stock)
            .map_err(|_| StoreError::InsufficientStock(debit.product_id))?;
        product.units_sold += i64::from(debit.quantity);
        product.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn insert_sale(&mut self, sale: &Sale) -> Result<(), StoreError> {
        let taken = self
            .working
            .sales
            .values()
            .any(|s| s.order_number == sale.order_number);
        if taken {
            return Err(StoreError::UniqueViolation {
                constraint: ORDER_NUMBER_CONSTRAINT.to_string(),
            });
        }
        self.working.sales.insert(sale.id, sale.clone());
        Ok(())
    }

    async fn insert_sale_item(&mut self, item: &SaleItem) -> Result<(), StoreError> {
        if !self.working.sales.contains_key(&item.sale_id) {
            return Err(StoreError::Database(format!(
                "sale item references missing sale {}",
                item.sale_id
            )));
        }
        self.working.sale_items.push(item.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl SalesStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryUnitOfWork { guard, working }))
    }

    async fn get_sale(&self, id: SaleId) -> Result<Option<SaleWithItems>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.sales.get(&id).map(|sale| SaleWithItems {
            sale: sale.clone(),
            items: tables.items_of(id),
        }))
    }

    async fn list_sales(&self, filter: &SaleFilter) -> Result<Vec<SaleSummary>, StoreError> {
        let tables = self.tables.lock().await;
        let mut sales: Vec<SaleSummary> = tables
            .sales
            .values()
            .filter(|s| filter.matches(s))
            .map(|s| SaleSummary::from_items(s.clone(), &tables.items_of(s.id)))
            .collect();
        sales.sort_by(|a, b| b.sale.order_date.cmp(&a.sale.order_date));
        Ok(sales)
    }

    async fn update_sale_status(
        &self,
        id: SaleId,
        status: SaleStatus,
        policy: TransitionPolicy,
    ) -> Result<Sale, StoreError> {
        let mut tables = self.tables.lock().await;
        let sale = tables.sales.get_mut(&id).ok_or(StoreError::NotFound)?;

        policy.ensure_allowed(sale.status, status)?;
        sale.status = status;
        sale.updated_at = Utc::now();
        Ok(sale.clone())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.tables.lock().await.products.get(&id).cloned())
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        product.validate()?;

        let mut tables = self.tables.lock().await;
        if tables.products.values().any(|p| p.sku == product.sku) {
            return Err(StoreError::UniqueViolation {
                constraint: PRODUCT_SKU_CONSTRAINT.to_string(),
            });
        }
        let product = product.into_product(ProductId::new(), Utc::now());
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        let email = normalize_email(email);
        Ok(self
            .tables
            .lock()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert_user(&self, user: &UserAccount) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation {
                constraint: USER_EMAIL_CONSTRAINT.to_string(),
            });
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }
}
