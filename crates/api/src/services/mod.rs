//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Accounts, login sessions and bearer tokens
//! - `orders` - Order placement, pricing and the status lifecycle
//! - `catalog` - Product administration
//! - `addresses` - Shipping address book
//!
//! Services borrow a store (and whatever else they need) for the duration of
//! one call and are generic over the store traits they use, so the same code
//! runs on [`crate::db::PgStore`] and [`crate::db::MemoryStore`].

pub mod addresses;
pub mod auth;
pub mod catalog;
pub mod orders;

pub use addresses::{AddressError, AddressService};
pub use auth::{AuthError, AuthService};
pub use catalog::{CatalogError, CatalogService};
pub use orders::{OrderError, OrderService};
