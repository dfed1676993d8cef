//! Shipping address types.

use serde::Serialize;

use storekeep_core::{AddressId, UserId};

/// A user's shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub line1: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub country: String,
    /// At most one address per user is the default.
    pub is_default: bool,
}

/// Input for creating an address.
#[derive(Debug, Clone)]
pub struct NewAddress {
    pub user_id: UserId,
    pub line1: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub country: String,
}
