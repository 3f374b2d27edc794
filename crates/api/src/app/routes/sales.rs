use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};

use stylehub_auth::Permission;
use stylehub_core::SaleId;
use stylehub_sales::SaleStatus;

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

const SALE_NOT_FOUND: &str = "Sale not found";

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_sale).get(list_sales))
        .route("/:id", get(get_sale))
        .route("/:id/status", patch(update_sale_status))
}

fn forbidden_unless(
    principal: &PrincipalContext,
    permission: Permission,
) -> Result<(), axum::response::Response> {
    let auth = CmdAuth {
        inner: (),
        required: vec![permission],
    };
    crate::authz::authorize_command(principal, &auth)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}

fn parse_sale_id(id: &str) -> Result<SaleId, axum::response::Response> {
    id.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid sale id"))
}

pub async fn create_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreateSaleRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = forbidden_unless(&principal, Permission::SALES_CREATE) {
        return resp;
    }

    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let checkout = match body.into_checkout() {
        Ok(c) => c,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
    };

    match services.processor.process(checkout).await {
        Ok(record) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "message": "Sale registered successfully",
                "orderNumber": record.sale.order_number.as_str(),
                "sale": dto::sale_with_items_to_json(&record),
            })),
        )
            .into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}

pub async fn list_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::ListSalesQuery>, QueryRejection>,
) -> axum::response::Response {
    if let Err(resp) = forbidden_unless(&principal, Permission::SALES_READ) {
        return resp;
    }

    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_query", rejection.body_text());
        }
    };

    let filter = match query.into_filter() {
        Ok(f) => f,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
    };

    match services.store.list_sales(&filter).await {
        Ok(sales) => {
            let sales = sales.iter().map(dto::sale_summary_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "success": true, "sales": sales }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e, SALE_NOT_FOUND, "Error fetching sales"),
    }
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = forbidden_unless(&principal, Permission::SALES_READ) {
        return resp;
    }
    let id = match parse_sale_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.store.get_sale(id).await {
        Ok(Some(record)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "sale": dto::sale_with_items_to_json(&record),
            })),
        )
            .into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", SALE_NOT_FOUND),
        Err(e) => errors::store_error_to_response(e, SALE_NOT_FOUND, "Error fetching sale"),
    }
}

pub async fn update_sale_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateStatusRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = forbidden_unless(&principal, Permission::SALES_UPDATE_STATUS) {
        return resp;
    }
    let id = match parse_sale_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    // Rejected before any write.
    let status: SaleStatus = match body.status.parse() {
        Ok(s) => s,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .store
        .update_sale_status(id, status, services.status_policy)
        .await
    {
        Ok(sale) => {
            tracing::info!(sale_id = %id, status = %status, "sale status updated");
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "success": true,
                    "message": "Status updated",
                    "sale": dto::sale_to_json(&sale),
                })),
            )
                .into_response()
        }
        Err(e) => errors::store_error_to_response(e, SALE_NOT_FOUND, "Error updating status"),
    }
}
