//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                       - Liveness
//! GET  /health/ready                 - Readiness (database ping)
//!
//! # Auth
//! POST /auth/register                - Create account
//! POST /auth/login                   - Open a session
//! POST /auth/refresh                 - New access token
//! POST /auth/logout                  - End session (bearer)
//!
//! # Users (bearer)
//! GET    /users/{id}                 - Profile (self or admin)
//! PUT    /users/{id}                 - Update profile
//! PUT    /users/{id}/password        - Change password
//! DELETE /users/{id}                 - Delete account
//!
//! # Catalog
//! GET  /products                     - Active products
//! GET  /products/{id}                - Active product detail
//!
//! # Addresses (bearer)
//! POST   /addresses                  - Add address
//! GET    /addresses                  - List addresses
//! GET    /addresses/default          - Default address
//! PUT    /addresses/{id}/default     - Make default
//! DELETE /addresses/{id}             - Delete address
//!
//! # Orders (bearer)
//! POST /orders                       - Place order
//! GET  /orders                       - Order history
//! GET  /orders/{id}                  - Order with lines
//! POST /orders/{id}/cancel           - Cancel pending order
//! GET  /orders/{id}/items            - Lines of an order
//! GET  /orders/{id}/items/{item_id}  - One line
//! GET  /items                        - All of the caller's lines
//!
//! # Admin
//! GET    /admin/users                - All accounts
//! POST   /admin/sessions/{id}/revoke - Revoke a session
//! GET    /admin/products             - All products, including inactive
//! POST   /admin/products             - Create product
//! PUT    /admin/products/{id}        - Replace product fields
//! PUT    /admin/products/{id}/stock  - Set stock level
//! DELETE /admin/products/{id}        - Delete product
//! PUT    /admin/orders/{id}/status   - Move order through its lifecycle
//! ```

pub mod addresses;
pub mod auth;
pub mod orders;
pub mod products;
pub mod users;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};

use crate::db::Store;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/register", post(auth::register::<S>))
        .route("/login", post(auth::login::<S>))
        .route("/refresh", post(auth::refresh::<S>))
        .route("/logout", post(auth::logout::<S>))
}

/// Create the user routes router.
pub fn user_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route(
            "/{id}",
            get(users::show::<S>)
                .put(users::update::<S>)
                .delete(users::delete::<S>),
        )
        .route("/{id}/password", put(users::change_password::<S>))
}

/// Create the product routes router.
pub fn product_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(products::index::<S>))
        .route("/{id}", get(products::show::<S>))
}

/// Create the address routes router.
pub fn address_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route(
            "/",
            get(addresses::index::<S>).post(addresses::create::<S>),
        )
        .route("/default", get(addresses::default::<S>))
        .route("/{id}/default", put(addresses::set_default::<S>))
        .route("/{id}", axum::routing::delete(addresses::delete::<S>))
}

/// Create the order routes router.
pub fn order_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(orders::index::<S>).post(orders::place::<S>))
        .route("/{id}", get(orders::show::<S>))
        .route("/{id}/cancel", post(orders::cancel::<S>))
        .route("/{id}/items", get(orders::items::<S>))
        .route("/{id}/items/{item_id}", get(orders::item::<S>))
}

/// Create the admin routes router.
///
/// Every handler here takes `RequireAdmin`.
pub fn admin_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/users", get(users::list::<S>))
        .route("/sessions/{id}/revoke", post(users::revoke_session::<S>))
        .route(
            "/products",
            get(products::admin_index::<S>).post(products::create::<S>),
        )
        .route(
            "/products/{id}",
            put(products::update::<S>).delete(products::delete::<S>),
        )
        .route("/products/{id}/stock", put(products::set_stock::<S>))
        .route("/orders/{id}/status", put(orders::update_status::<S>))
}

/// Create all routes for the API.
pub fn routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness::<S>))
        .nest("/auth", auth_routes())
        .nest("/users", user_routes())
        .nest("/products", product_routes())
        .nest("/addresses", address_routes())
        .nest("/orders", order_routes())
        .route("/items", get(orders::user_items::<S>))
        .nest("/admin", admin_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness<S: Store>(State(state): State<AppState<S>>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, header},
    };
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use storekeep_core::Money;

    use super::*;
    use crate::db::{MemoryStore, ProductStore};
    use crate::models::{NewProduct, Product};
    use crate::services::auth::{SessionSettings, TokenCodec};

    const PASSWORD: &str = "correct-horse-battery";

    struct TestApp {
        state: AppState<MemoryStore>,
    }

    impl TestApp {
        fn new() -> Self {
            let tokens = TokenCodec::new(SecretString::from(
                "route-test-signing-key-0a9b8c7d6e5f".to_owned(),
            ));
            Self {
                state: AppState::new(MemoryStore::new(), tokens, SessionSettings::default()),
            }
        }

        async fn send(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let request = match body {
                Some(body) => request
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string())),
                None => request.body(Body::empty()),
            }
            .unwrap();

            let response = crate::app(self.state.clone())
                .oneshot(request)
                .await
                .unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, json)
        }

        /// Register (or create as admin) and log in, returning the login body.
        async fn login_as(&self, email: &str, admin: bool) -> Value {
            if admin {
                self.state
                    .auth()
                    .create_account("Admin", email, PASSWORD, true)
                    .await
                    .unwrap();
            } else {
                let (status, _) = self
                    .send(
                        "POST",
                        "/auth/register",
                        None,
                        Some(json!({"name": "Customer", "email": email, "password": PASSWORD})),
                    )
                    .await;
                assert_eq!(status, StatusCode::CREATED);
            }
            let (status, body) = self
                .send(
                    "POST",
                    "/auth/login",
                    None,
                    Some(json!({"email": email, "password": PASSWORD})),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            body
        }

        async fn product(&self, sku: &str, cents: u32, stock: i32) -> Product {
            self.state
                .store()
                .create_product(NewProduct {
                    sku: sku.to_owned(),
                    name: sku.to_owned(),
                    description: String::new(),
                    price: Money::from_cents(cents),
                    stock_quantity: stock,
                    active: true,
                })
                .await
                .unwrap()
        }
    }

    fn token(login: &Value) -> &str {
        login["access_token"].as_str().unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new();
        let response = crate::app(app.state.clone())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (status, _) = app.send("GET", "/health/ready", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_routes_require_bearer() {
        let app = TestApp::new();
        for (method, uri) in [("GET", "/orders"), ("GET", "/addresses"), ("GET", "/items")] {
            let (status, body) = app.send(method, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert!(body["error"].is_string());
        }

        let (status, _) = app.send("GET", "/orders", Some("not.a.jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_routes_reject_customers() {
        let app = TestApp::new();
        let customer = app.login_as("cust@example.com", false).await;

        let (status, _) = app
            .send("GET", "/admin/users", Some(token(&customer)), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = app.login_as("admin@example.com", true).await;
        let (status, body) = app.send("GET", "/admin/users", Some(token(&admin)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_order_lifecycle_over_http() {
        let app = TestApp::new();
        let product = app.product("MUG-01", 1000, 5).await;
        let login = app.login_as("buyer@example.com", false).await;
        let bearer = token(&login);

        let (status, address) = app
            .send(
                "POST",
                "/addresses",
                Some(bearer),
                Some(json!({"line1": "1 Main St", "city": "Springfield", "country": "US"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, placed) = app
            .send(
                "POST",
                "/orders",
                Some(bearer),
                Some(json!({
                    "address_id": address["id"],
                    "items": [{"product_id": product.id, "quantity": 3}],
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(placed["total_amount"], "30.00");
        assert_eq!(placed["status"], "pending");

        let order_uri = format!("/orders/{}", placed["order_id"].as_str().unwrap());
        let (status, details) = app.send("GET", &order_uri, Some(bearer), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(details["items"].as_array().unwrap().len(), 1);
        assert_eq!(details["items"][0]["unit_price"], "10.00");

        let (_, shown) = app
            .send("GET", &format!("/products/{}", product.id), None, None)
            .await;
        assert_eq!(shown["stock_quantity"], 2);

        let cancel_uri = format!("{order_uri}/cancel");
        let (status, cancelled) = app.send("POST", &cancel_uri, Some(bearer), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["status"], "cancelled");

        let (status, _) = app.send("POST", &cancel_uri, Some(bearer), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, shown) = app
            .send("GET", &format!("/products/{}", product.id), None, None)
            .await;
        assert_eq!(shown["stock_quantity"], 5);
    }

    #[tokio::test]
    async fn test_other_users_order_is_forbidden() {
        let app = TestApp::new();
        let product = app.product("PEN-01", 250, 10).await;
        let owner = app.login_as("owner@example.com", false).await;
        let (_, address) = app
            .send(
                "POST",
                "/addresses",
                Some(token(&owner)),
                Some(json!({"line1": "2 Side St", "city": "Shelbyville", "country": "US"})),
            )
            .await;
        let (_, placed) = app
            .send(
                "POST",
                "/orders",
                Some(token(&owner)),
                Some(json!({
                    "address_id": address["id"],
                    "items": [{"product_id": product.id, "quantity": 1}],
                })),
            )
            .await;

        let intruder = app.login_as("intruder@example.com", false).await;
        let uri = format!("/orders/{}", placed["order_id"].as_str().unwrap());
        let (status, _) = app.send("GET", &uri, Some(token(&intruder)), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_logout_invalidates_access_token() {
        let app = TestApp::new();
        let login = app.login_as("leaver@example.com", false).await;
        let bearer = token(&login);

        let (status, _) = app.send("POST", "/auth/logout", Some(bearer), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = app.send("GET", "/orders", Some(bearer), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .send(
                "POST",
                "/auth/refresh",
                None,
                Some(json!({"refresh_token": login["refresh_token"]})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_revocation_blocks_refresh() {
        let app = TestApp::new();
        let admin = app.login_as("ops@example.com", true).await;
        let customer = app.login_as("victim@example.com", false).await;

        let uri = format!(
            "/admin/sessions/{}/revoke",
            customer["session_id"].as_str().unwrap()
        );
        let (status, _) = app.send("POST", &uri, Some(token(&admin)), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = app
            .send(
                "POST",
                "/auth/refresh",
                None,
                Some(json!({"refresh_token": customer["refresh_token"]})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "session has been revoked");
    }

    #[tokio::test]
    async fn test_admin_status_transitions() {
        let app = TestApp::new();
        let product = app.product("LAMP-01", 4500, 3).await;
        let admin = app.login_as("boss@example.com", true).await;
        let buyer = app.login_as("shopper@example.com", false).await;
        let (_, address) = app
            .send(
                "POST",
                "/addresses",
                Some(token(&buyer)),
                Some(json!({"line1": "3 Elm St", "city": "Ogdenville", "country": "US"})),
            )
            .await;
        let (_, placed) = app
            .send(
                "POST",
                "/orders",
                Some(token(&buyer)),
                Some(json!({
                    "address_id": address["id"],
                    "items": [{"product_id": product.id, "quantity": 1}],
                })),
            )
            .await;
        let uri = format!("/admin/orders/{}/status", placed["order_id"].as_str().unwrap());

        let (status, _) = app
            .send("PUT", &uri, Some(token(&admin)), Some(json!({"status": "shipped"})))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = app
            .send("PUT", &uri, Some(token(&admin)), Some(json!({"status": "paid"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "paid");

        let (status, body) = app
            .send("PUT", &uri, Some(token(&admin)), Some(json!({"status": "shipped"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "shipped");
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_conflict() {
        let app = TestApp::new();
        let product = app.product("RARE-01", 9999, 1).await;
        let login = app.login_as("eager@example.com", false).await;
        let (_, address) = app
            .send(
                "POST",
                "/addresses",
                Some(token(&login)),
                Some(json!({"line1": "4 Oak St", "city": "Capital City", "country": "US"})),
            )
            .await;

        let (status, body) = app
            .send(
                "POST",
                "/orders",
                Some(token(&login)),
                Some(json!({
                    "address_id": address["id"],
                    "items": [{"product_id": product.id, "quantity": 2}],
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("insufficient stock"));

        let (status, orders) = app.send("GET", "/orders", Some(token(&login)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(orders.as_array().unwrap().is_empty());
    }
}
