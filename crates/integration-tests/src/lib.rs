//! Integration tests for Storekeep.
//!
//! Scenarios run against the in-memory store, which implements every store
//! trait with the same guarantees as `PostgreSQL`: guarded stock decrements,
//! all-or-nothing order placement and compare-and-swap status writes.
//!
//! The concurrency scenarios also have `PostgreSQL` variants. They are
//! ignored by default and need a migratable database:
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p storekeep-integration-tests
//! STOREKEEP_DATABASE_URL=postgres://... cargo test -p storekeep-integration-tests -- --ignored
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use secrecy::SecretString;

use storekeep_api::db::{MemoryStore, PgStore, ProductStore, Store, create_pool};
use storekeep_api::models::{Address, NewProduct, Product, User};
use storekeep_api::services::addresses::AddressInput;
use storekeep_api::services::auth::{SessionSettings, TokenCodec};
use storekeep_api::services::{AddressService, AuthService, OrderService};
use storekeep_core::Money;

/// Password used for every account created by [`TestContext`].
pub const PASSWORD: &str = "integration-password";

/// A store plus the token codec and settings the services need.
#[derive(Clone)]
pub struct TestContext<S = MemoryStore> {
    pub store: S,
    pub tokens: TokenCodec,
    pub sessions: SessionSettings,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

fn test_codec() -> TokenCodec {
    TokenCodec::new(SecretString::from(
        "integration-signing-key-9f8e7d6c5b4a".to_owned(),
    ))
}

impl TestContext<MemoryStore> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_sessions(SessionSettings::default())
    }

    #[must_use]
    pub fn with_sessions(sessions: SessionSettings) -> Self {
        Self {
            store: MemoryStore::new(),
            tokens: test_codec(),
            sessions,
        }
    }
}

impl TestContext<PgStore> {
    /// Connect to `STOREKEEP_DATABASE_URL` and apply migrations.
    ///
    /// Returns `None` when the variable is unset.
    ///
    /// # Panics
    ///
    /// Panics if the database is unreachable or a migration fails.
    pub async fn postgres() -> Option<Self> {
        let url = std::env::var("STOREKEEP_DATABASE_URL").ok()?;
        let pool = match create_pool(&SecretString::from(url)).await {
            Ok(pool) => pool,
            Err(e) => panic!("connect to test database: {e}"),
        };
        if let Err(e) = sqlx::migrate!("../api/migrations").run(&pool).await {
            panic!("migrate test database: {e}");
        }
        Some(Self {
            store: PgStore::new(pool),
            tokens: test_codec(),
            sessions: SessionSettings::default(),
        })
    }
}

/// `prefix` plus a random suffix, for emails and skus in shared databases.
#[must_use]
pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

impl<S: Store> TestContext<S> {
    #[must_use]
    pub fn auth(&self) -> AuthService<'_, S> {
        AuthService::new(&self.store, &self.tokens, self.sessions)
    }

    #[must_use]
    pub fn orders(&self) -> OrderService<'_, S> {
        OrderService::new(&self.store)
    }

    /// Register a customer.
    ///
    /// # Panics
    ///
    /// Panics if registration fails.
    pub async fn customer(&self, email: &str) -> User {
        match self.auth().register("Customer", email, PASSWORD).await {
            Ok(user) => user,
            Err(e) => panic!("register {email}: {e}"),
        }
    }

    /// Add a shipping address for `user`.
    ///
    /// # Panics
    ///
    /// Panics if the address is rejected.
    pub async fn address(&self, user: &User) -> Address {
        let input = AddressInput {
            line1: "742 Evergreen Terrace".to_owned(),
            city: "Springfield".to_owned(),
            province: String::new(),
            postal_code: "49007".to_owned(),
            country: "US".to_owned(),
        };
        match AddressService::new(&self.store).add_address(user.id, input).await {
            Ok(address) => address,
            Err(e) => panic!("add address: {e}"),
        }
    }

    /// Insert an active product.
    ///
    /// # Panics
    ///
    /// Panics if the sku is already taken.
    pub async fn product(&self, sku: &str, price: Money, stock: i32) -> Product {
        let product = NewProduct {
            sku: sku.to_owned(),
            name: sku.to_owned(),
            description: String::new(),
            price,
            stock_quantity: stock,
            active: true,
        };
        match self.store.create_product(product).await {
            Ok(product) => product,
            Err(e) => panic!("create product {sku}: {e}"),
        }
    }

    /// Current stock of a product.
    ///
    /// # Panics
    ///
    /// Panics if the product is gone.
    pub async fn stock(&self, product: &Product) -> i32 {
        match self.store.get_product(product.id).await {
            Ok(Some(p)) => p.stock_quantity,
            other => panic!("load product {}: {other:?}", product.id),
        }
    }
}
