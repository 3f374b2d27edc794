use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use stylehub_core::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/:id", get(get_product))
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };

    match services.store.get_product(id).await {
        Ok(Some(product)) => (
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "product": dto::product_to_json(&product) })),
        )
            .into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "Product not found"),
        Err(e) => errors::store_error_to_response(e, "Product not found", "Error fetching product"),
    }
}
