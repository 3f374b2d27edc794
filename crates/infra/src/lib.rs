//! Infrastructure layer: configuration, storage and checkout orchestration.

pub mod bootstrap;
pub mod config;
pub mod sale_processor;
pub mod store;

pub use config::{AdminSeed, AppConfig, ConfigError};
pub use sale_processor::{CheckoutError, OrderNumberSource, RandomOrderNumbers, SaleProcessor};
pub use store::{SaleFilter, SalesStore, StoreError};
