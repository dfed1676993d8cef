//! Shipping addresses.

use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use storekeep_core::{AddressId, UserId};

use crate::db::{AddressStore, RepositoryError};
use crate::models::{Address, NewAddress};

/// Errors that can occur during address operations.
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("address not found")]
    AddressNotFound,

    #[error("address belongs to another user")]
    NotAddressOwner,

    #[error("no default address set")]
    NoDefaultAddress,

    /// An order ships to the address.
    #[error("address is referenced by orders")]
    AddressInUse,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Address fields supplied by the user.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    pub line1: String,
    pub city: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub postal_code: String,
    pub country: String,
}

/// Address book service.
pub struct AddressService<'a, S> {
    store: &'a S,
}

impl<'a, S: AddressStore> AddressService<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Returns `InvalidAddress` if a required field is blank.
    #[instrument(skip(self, input))]
    pub async fn add_address(
        &self,
        user_id: UserId,
        input: AddressInput,
    ) -> Result<Address, AddressError> {
        let required = [
            ("line1", &input.line1),
            ("city", &input.city),
            ("country", &input.country),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(AddressError::InvalidAddress(format!("{field} is required")));
        }

        let address = self
            .store
            .create_address(NewAddress {
                user_id,
                line1: input.line1.trim().to_owned(),
                city: input.city.trim().to_owned(),
                province: input.province.trim().to_owned(),
                postal_code: input.postal_code.trim().to_owned(),
                country: input.country.trim().to_owned(),
            })
            .await?;
        Ok(address)
    }

    /// The user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Repository` if the store fails.
    pub async fn list_addresses(&self, user_id: UserId) -> Result<Vec<Address>, AddressError> {
        Ok(self.store.list_addresses(user_id).await?)
    }

    /// # Errors
    ///
    /// Returns `NoDefaultAddress` if none is set.
    pub async fn get_default(&self, user_id: UserId) -> Result<Address, AddressError> {
        self.store
            .get_default_address(user_id)
            .await?
            .ok_or(AddressError::NoDefaultAddress)
    }

    /// Make `id` the user's only default address.
    ///
    /// # Errors
    ///
    /// Returns `AddressNotFound` or `NotAddressOwner`.
    #[instrument(skip(self))]
    pub async fn set_default(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Address, AddressError> {
        self.owned(user_id, id).await?;
        self.store
            .set_default_address(user_id, id)
            .await
            .map_err(|e| match e {
                // Deleted between the ownership check and the toggle.
                RepositoryError::NotFound => AddressError::AddressNotFound,
                other => other.into(),
            })
    }

    /// # Errors
    ///
    /// Returns `AddressNotFound`, `NotAddressOwner`, or `AddressInUse`.
    #[instrument(skip(self))]
    pub async fn delete_address(&self, user_id: UserId, id: AddressId) -> Result<(), AddressError> {
        self.owned(user_id, id).await?;
        match self.store.delete_address(id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AddressError::AddressNotFound),
            Err(RepositoryError::Conflict(_)) => Err(AddressError::AddressInUse),
            Err(e) => Err(e.into()),
        }
    }

    async fn owned(&self, user_id: UserId, id: AddressId) -> Result<Address, AddressError> {
        let address = self
            .store
            .get_address(id)
            .await?
            .ok_or(AddressError::AddressNotFound)?;
        if address.user_id != user_id {
            return Err(AddressError::NotAddressOwner);
        }
        Ok(address)
    }
}
