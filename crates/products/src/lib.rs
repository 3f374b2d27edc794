//! Products domain module.
//!
//! The catalog record the sales core reads (stock, name, price). Catalog
//! management itself lives outside this service; this crate only models the
//! row shape and the rules any writer of that row must respect.

pub mod product;

pub use product::{NewProduct, Product, ProductAttributes, LOW_STOCK_THRESHOLD};
