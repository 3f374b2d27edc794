use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

use stylehub_api::app::{AppServices, build_app};
use stylehub_auth::{JwtClaims, Role};
use stylehub_core::UserId;
use stylehub_infra::store::InMemoryStore;
use stylehub_infra::{AppConfig, SalesStore};
use stylehub_products::{NewProduct, Product};

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    store: InMemoryStore,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over an in-memory store, bound to an ephemeral port.
        let store = InMemoryStore::new();
        let config = AppConfig {
            jwt_secret: JWT_SECRET.to_string(),
            ..AppConfig::default()
        };
        let app = build_app(AppServices::new(&config, Arc::new(store.clone())));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            handle,
        }
    }

    async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> Product {
        self.store
            .insert_product(NewProduct::simple(name, price, stock))
            .await
            .expect("failed to seed product")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        email: "tester@example.com".to_string(),
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn checkout_body(product: &Product, quantity: i32) -> serde_json::Value {
    let subtotal = product.price * Decimal::from(quantity);
    json!({
        "customer": {
            "firstName": "Ana",
            "lastName": "Ruiz",
            "email": "ana@example.com",
            "phone": "555-0100"
        },
        "shipping": {
            "address": "1 Main St",
            "city": "Springfield",
            "state": "IL",
            "zipCode": "62701",
            "country": "US"
        },
        "payment": { "method": "card", "cardLast4": "4242" },
        "items": [{
            "productId": product.id.to_string(),
            "productName": product.name,
            "quantity": quantity,
            "size": "M",
            "color": "black",
            "price": product.price,
        }],
        "totals": {
            "subtotal": subtotal,
            "shipping": "5.00",
            "tax": "0.00",
            "total": subtotal + Decimal::new(500, 2),
        }
    })
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/whoami", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/sales", srv.base_url))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn principal_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(vec![Role::ADMIN]);

    let res = reqwest::Client::new()
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["email"], "tester@example.com");
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "admin"));
}

#[tokio::test]
async fn checkout_debits_stock_and_is_readable_by_admin() {
    let srv = TestServer::spawn().await;
    let product = srv.seed_product("Linen Shirt", Decimal::new(2500, 2), 3).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/sales", srv.base_url))
        .bearer_auth(mint_jwt(vec![Role::CUSTOMER]))
        .json(&checkout_body(&product, 2))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["success"], true);
    assert_eq!(created["message"], "Sale registered successfully");
    let order_number = created["orderNumber"].as_str().unwrap().to_string();
    assert!(order_number.starts_with("ORD-"));
    assert_eq!(created["sale"]["status"], "completed");
    assert_eq!(created["sale"]["items"][0]["subtotal"], "50.00");
    let sale_id = created["sale"]["id"].as_str().unwrap().to_string();

    // Stock and sales counter moved together.
    let res = client
        .get(format!("{}/products/{}", srv.base_url, product.id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["product"]["stock"], 1);
    assert_eq!(body["product"]["unitsSold"], 2);

    let admin = mint_jwt(vec![Role::ADMIN]);
    let res = client
        .get(format!("{}/sales/{}", srv.base_url, sale_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["sale"]["orderNumber"], order_number.as_str());
    assert_eq!(body["sale"]["items"].as_array().unwrap().len(), 1);

    let res = client
        .get(format!("{}/sales?status=completed", srv.base_url))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let sales = body["sales"].as_array().unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0]["itemsCount"], 1);
    assert_eq!(sales[0]["totalItems"], 2);

    let res = client
        .get(format!("{}/sales?status=cancelled", srv.base_url))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["sales"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn insufficient_stock_is_reported_per_line_and_changes_nothing() {
    let srv = TestServer::spawn().await;
    let product = srv.seed_product("Wool Scarf", Decimal::new(1999, 2), 1).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/sales", srv.base_url))
        .bearer_auth(mint_jwt(vec![Role::CUSTOMER]))
        .json(&checkout_body(&product, 2))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["product"], "Wool Scarf");
    assert_eq!(errors[0]["requested"], 2);
    assert_eq!(errors[0]["available"], 1);

    let res = client
        .get(format!("{}/products/{}", srv.base_url, product.id))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["product"]["stock"], 1);

    let res = client
        .get(format!("{}/sales", srv.base_url))
        .bearer_auth(mint_jwt(vec![Role::ADMIN]))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["sales"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_checkout_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(vec![Role::CUSTOMER]);

    let res = client
        .post(format!("{}/sales", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "customer": {} }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let product = srv.seed_product("Canvas Tote", Decimal::new(1200, 2), 5).await;
    let mut body = checkout_body(&product, 1);
    body["items"] = json!([]);
    let res = client
        .post(format!("{}/sales", srv.base_url))
        .bearer_auth(&token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    // Amounts beyond the stored precision are rejected, not overflowed.
    let mut body = checkout_body(&product, 2);
    body["items"][0]["price"] = json!("9999999999.99");
    let res = client
        .post(format!("{}/sales", srv.base_url))
        .bearer_auth(&token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn customers_cannot_read_or_update_sales() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(vec![Role::CUSTOMER]);

    let res = client
        .get(format!("{}/sales", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .patch(format!("{}/sales/{}/status", srv.base_url, UserId::new()))
        .bearer_auth(&token)
        .json(&json!({ "status": "cancelled" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn status_update_validates_before_writing() {
    let srv = TestServer::spawn().await;
    let product = srv.seed_product("Denim Jacket", Decimal::new(8900, 2), 4).await;
    let client = reqwest::Client::new();
    let admin = mint_jwt(vec![Role::ADMIN]);

    let res = client
        .post(format!("{}/sales", srv.base_url))
        .bearer_auth(&admin)
        .json(&checkout_body(&product, 1))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let created: serde_json::Value = res.json().await.unwrap();
    let sale_id = created["sale"]["id"].as_str().unwrap().to_string();

    let res = client
        .patch(format!("{}/sales/{}/status", srv.base_url, sale_id))
        .bearer_auth(&admin)
        .json(&json!({ "status": "shipped" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(format!("{}/sales/{}", srv.base_url, sale_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["sale"]["status"], "completed");

    let res = client
        .patch(format!("{}/sales/{}/status", srv.base_url, sale_id))
        .bearer_auth(&admin)
        .json(&json!({ "status": "cancelled" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Status updated");
    assert_eq!(body["sale"]["status"], "cancelled");

    let res = client
        .patch(format!("{}/sales/{}/status", srv.base_url, UserId::new()))
        .bearer_auth(&admin)
        .json(&json!({ "status": "pending" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn register_then_login() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/auth/register", srv.base_url))
        .json(&json!({
            "name": "Maria Lopez",
            "email": "Maria@Example.com",
            "password": "hunter22"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["user"]["email"], "maria@example.com");
    assert_eq!(body["user"]["role"], "customer");
    assert!(body["user"].get("passwordHash").is_none());
    let token = body["token"].as_str().unwrap().to_string();

    // Issued tokens are accepted by the protected surface.
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/auth/register", srv.base_url))
        .json(&json!({
            "name": "Maria Again",
            "email": "maria@example.com",
            "password": "hunter22"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(format!("{}/auth/login", srv.base_url))
        .json(&json!({ "email": "maria@example.com", "password": "hunter22" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/auth/login", srv.base_url))
        .json(&json!({ "email": "maria@example.com", "password": "wrong-one" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/products/{}", srv.base_url, UserId::new()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(format!("{}/products/not-an-id", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
