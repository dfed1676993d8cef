//! Persistence for the order API.
//!
//! Each entity family is a capability trait ([`UserStore`], [`ProductStore`],
//! [`AddressStore`], [`OrderStore`], [`SessionStore`]). Services are generic
//! over the traits they need; [`Store`] bundles all of them for the HTTP layer.
//!
//! Two implementations exist:
//!
//! - [`PgStore`] - `PostgreSQL` via `sqlx`, used by the binary
//! - [`MemoryStore`] - a mutex-guarded in-process store for tests and local runs
//!
//! # Atomicity
//!
//! Three operations must be atomic in every implementation:
//!
//! - [`OrderStore::place_order`]: stock decrement, order insert and line inserts
//! - [`OrderStore::transition_status`]: compare-and-swap status write (plus
//!   restock when the target is `cancelled`)
//! - [`AddressStore::set_default_address`]: unset-all then set-one
//! - [`UserStore::delete_user`]: session revocation and the user delete
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p storekeep-cli -- migrate
//! ```

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use storekeep_core::{
    AddressId, Email, OrderId, OrderLineId, OrderStatus, ProductId, SessionId, UserId,
};

use crate::models::{
    Address, NewAddress, NewOrder, NewProduct, NewUser, Order, OrderLine, Product, Session, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is invalid or corrupted.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// Conflict (e.g., duplicate unique key, row still referenced).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A guarded stock decrement found fewer units than requested.
    #[error("insufficient stock for product {0}")]
    StockExhausted(ProductId),
}

/// Map a unique violation to [`RepositoryError::Conflict`] with `message`.
pub(crate) fn unique_violation(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

/// Map a foreign key violation to [`RepositoryError::Conflict`] with `message`.
pub(crate) fn still_referenced(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// User accounts.
pub trait UserStore: Send + Sync {
    /// Insert a user. `Conflict` if the email is taken.
    fn create_user(&self, user: NewUser)
    -> impl Future<Output = Result<User, RepositoryError>> + Send;

    fn get_user(&self, id: UserId)
    -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send;

    fn get_user_by_email(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Look up a user together with their password digest.
    fn get_credentials(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<(User, String)>, RepositoryError>> + Send;

    fn get_password_hash(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<String>, RepositoryError>> + Send;

    fn set_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Replace name and email. `NotFound` or `Conflict` (email taken).
    fn update_user(
        &self,
        id: UserId,
        name: &str,
        email: &Email,
    ) -> impl Future<Output = Result<User, RepositoryError>> + Send;

    /// Delete a user with their addresses and orders, revoking every session
    /// issued to their email in the same step. Returns whether a row existed.
    fn delete_user(&self, id: UserId)
    -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    fn list_users(&self) -> impl Future<Output = Result<Vec<User>, RepositoryError>> + Send;
}

/// Product catalog.
pub trait ProductStore: Send + Sync {
    /// Insert a product. `Conflict` if the sku is taken.
    fn create_product(
        &self,
        product: NewProduct,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    fn get_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    fn get_product_by_sku(
        &self,
        sku: &str,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// Fetch every product whose id is in `ids`. Missing ids are skipped.
    fn get_products(
        &self,
        ids: &[ProductId],
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    /// List products ordered by name.
    fn list_products(
        &self,
        active_only: bool,
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    /// Replace the editable fields of a product. `NotFound` or `Conflict` (sku taken).
    fn update_product(
        &self,
        id: ProductId,
        product: NewProduct,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    /// Set the absolute stock level. `NotFound` if absent.
    fn update_stock(
        &self,
        id: ProductId,
        stock_quantity: i32,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a product. `Conflict` if order lines still reference it.
    fn delete_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}

/// Shipping addresses.
pub trait AddressStore: Send + Sync {
    fn create_address(
        &self,
        address: NewAddress,
    ) -> impl Future<Output = Result<Address, RepositoryError>> + Send;

    fn get_address(
        &self,
        id: AddressId,
    ) -> impl Future<Output = Result<Option<Address>, RepositoryError>> + Send;

    /// A user's addresses, default first.
    fn list_addresses(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Address>, RepositoryError>> + Send;

    fn get_default_address(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Address>, RepositoryError>> + Send;

    /// Make `id` the user's only default address, atomically.
    ///
    /// `NotFound` if `id` does not exist or belongs to another user.
    fn set_default_address(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> impl Future<Output = Result<Address, RepositoryError>> + Send;

    /// Delete an address. `Conflict` if an order ships to it.
    fn delete_address(
        &self,
        id: AddressId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}

/// Orders and their (immutable) lines.
pub trait OrderStore: Send + Sync {
    /// Create an order in `pending` with one line per priced line.
    ///
    /// Stock for every product is decremented in the same transaction, guarded
    /// by `stock_quantity >= requested`. A failed guard rolls everything back
    /// and returns [`RepositoryError::StockExhausted`].
    fn place_order(
        &self,
        order: NewOrder,
    ) -> impl Future<Output = Result<(Order, Vec<OrderLine>), RepositoryError>> + Send;

    fn get_order(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// A user's orders, newest first.
    fn list_orders_by_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// Move an order from `from` to `to` if its status is still `from`.
    ///
    /// Returns `None` when the order is missing or its status already changed.
    /// When `to` is `cancelled`, every line's quantity is returned to stock
    /// in the same transaction.
    fn transition_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    fn list_lines_by_order(
        &self,
        order_id: OrderId,
    ) -> impl Future<Output = Result<Vec<OrderLine>, RepositoryError>> + Send;

    /// Every line of every order the user owns.
    fn list_lines_by_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<OrderLine>, RepositoryError>> + Send;

    fn get_line(
        &self,
        id: OrderLineId,
    ) -> impl Future<Output = Result<Option<OrderLine>, RepositoryError>> + Send;
}

/// Server-side sessions.
pub trait SessionStore: Send + Sync {
    /// Insert a session. `Conflict` if the id exists.
    fn create_session(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn get_session(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    /// Flag a session revoked. Returns whether it existed.
    fn revoke_session(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Delete a session if it exists. Returns whether it existed.
    fn delete_session(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Delete every session that expired before `now`. Returns the count.
    fn purge_expired_sessions(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;
}

/// Every store capability, plus a readiness check.
pub trait Store:
    UserStore + ProductStore + AddressStore + OrderStore + SessionStore + Clone + 'static
{
    /// Check the backing store is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}
