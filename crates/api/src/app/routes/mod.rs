use axum::{Router, routing::get};

pub mod auth;
pub mod common;
pub mod products;
pub mod sales;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/sales", sales::router())
}

/// Router for endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/auth", auth::router())
        .nest("/products", products::router())
}
