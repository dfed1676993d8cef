//! HTTP middleware.
//!
//! - [`request_id`]: correlation ids on every request
//! - [`auth`]: bearer-token extractors for customer and admin routes

pub mod auth;
pub mod request_id;

pub use auth::{RequireAdmin, RequireAuth};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
