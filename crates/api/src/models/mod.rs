//! Domain models for the order API.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`].

pub mod address;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use address::{Address, NewAddress};
pub use order::{NewOrder, Order, OrderLine};
pub use product::{NewProduct, Product};
pub use session::Session;
pub use user::{NewUser, User};
