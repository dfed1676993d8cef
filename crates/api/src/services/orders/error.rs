//! Order workflow error types.

use thiserror::Error;

use storekeep_core::OrderStatus;

use super::pricing::PricingError;
use crate::db::RepositoryError;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The requested lines failed validation or pricing.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("order not found")]
    OrderNotFound,

    /// The order exists but belongs to someone else.
    #[error("order belongs to another user")]
    NotOrderOwner,

    /// Only pending orders can be cancelled.
    #[error("order cannot be cancelled while {0}")]
    CannotCancelOrder(OrderStatus),

    /// The transition table forbids this status change.
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("address not found")]
    AddressNotFound,

    #[error("address belongs to another user")]
    NotAddressOwner,

    /// The line does not exist or is not part of the given order.
    #[error("order item not found")]
    LineNotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl OrderError {
    /// Whether the order failed because stock ran out, either at validation
    /// or at the guarded decrement.
    #[must_use]
    pub const fn is_insufficient_stock(&self) -> bool {
        matches!(self, Self::Pricing(PricingError::InsufficientStock { .. }))
    }
}
