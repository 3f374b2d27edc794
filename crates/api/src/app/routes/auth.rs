//! Registration and login.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;

use stylehub_auth::{NewUser, Role, UserAccount, hash_password, verify_password};
use stylehub_infra::store::USER_EMAIL_CONSTRAINT;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

const BAD_CREDENTIALS: &str = "Invalid email or password";

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

fn token_response(services: &AppServices, user: &UserAccount) -> axum::response::Response {
    match services
        .tokens
        .issue(user.id, &user.email, vec![user.role.clone()], Utc::now())
    {
        Ok(token) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "token": token,
                "user": dto::user_to_json(user),
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to sign token");
            errors::internal_error("Error issuing token")
        }
    }
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::RegisterRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let new_user = NewUser {
        name: body.name,
        email: body.email,
        password: body.password,
        phone: body.phone,
    };
    if let Err(e) = new_user.validate() {
        return errors::domain_error_to_response(e);
    }

    match services.store.find_user_by_email(&new_user.email).await {
        Ok(Some(_)) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "email_taken", "Email already registered");
        }
        Ok(None) => {}
        Err(e) => return errors::store_error_to_response(e, "User not found", "Error registering user"),
    }

    let hash = match hash_password(&new_user.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!(error = %e, "password hashing failed");
            return errors::internal_error("Error registering user");
        }
    };
    let account = new_user.into_account(Role::CUSTOMER, hash, Utc::now());

    match services.store.insert_user(&account).await {
        Ok(()) => {
            tracing::info!(user_id = %account.id, "user registered");
            token_response(&services, &account)
        }
        Err(e) if e.is_unique_violation_of(USER_EMAIL_CONSTRAINT) => {
            errors::json_error(StatusCode::BAD_REQUEST, "email_taken", "Email already registered")
        }
        Err(e) => errors::store_error_to_response(e, "User not found", "Error registering user"),
    }
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let user = match services.store.find_user_by_email(&body.email).await {
        Ok(Some(user)) => user,
        Ok(None) => return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", BAD_CREDENTIALS),
        Err(e) => return errors::store_error_to_response(e, BAD_CREDENTIALS, "Error logging in"),
    };

    match verify_password(&user.password_hash, &body.password) {
        Ok(true) => token_response(&services, &user),
        Ok(false) => errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", BAD_CREDENTIALS),
        Err(e) => {
            tracing::error!(error = %e, user_id = %user.id, "stored password hash unusable");
            errors::internal_error("Error logging in")
        }
    }
}
