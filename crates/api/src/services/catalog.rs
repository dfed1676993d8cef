//! Catalog administration.

use thiserror::Error;
use tracing::instrument;

use storekeep_core::{Money, ProductId};

use crate::db::{ProductStore, RepositoryError};
use crate::models::{NewProduct, Product};

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A field failed validation.
    #[error("invalid product: {0}")]
    InvalidProduct(String),

    #[error("product not found")]
    ProductNotFound,

    #[error("a product with this sku already exists")]
    SkuTaken,

    /// Order lines still reference the product.
    #[error("product is referenced by orders")]
    ProductInUse,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Product catalog service.
pub struct CatalogService<'a, S> {
    store: &'a S,
}

impl<'a, S: ProductStore> CatalogService<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// List products by name. Inactive products are included only on request.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store fails.
    pub async fn list_products(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<Product>, CatalogError> {
        Ok(self.store.list_products(!include_inactive).await?)
    }

    /// Get one product. Inactive products are not found unless requested.
    ///
    /// # Errors
    ///
    /// Returns `ProductNotFound`.
    pub async fn get_product(
        &self,
        id: ProductId,
        include_inactive: bool,
    ) -> Result<Product, CatalogError> {
        self.store
            .get_product(id)
            .await?
            .filter(|p| p.active || include_inactive)
            .ok_or(CatalogError::ProductNotFound)
    }

    /// # Errors
    ///
    /// Returns `InvalidProduct` or `SkuTaken`.
    #[instrument(skip(self, product), fields(sku = %product.sku))]
    pub async fn create_product(&self, product: NewProduct) -> Result<Product, CatalogError> {
        let product = validate(product)?;
        let created = self.store.create_product(product).await.map_err(conflict)?;
        tracing::info!(product_id = %created.id, "Product created");
        Ok(created)
    }

    /// Replace a product's editable fields.
    ///
    /// Existing orders keep their price snapshots.
    ///
    /// # Errors
    ///
    /// Returns `InvalidProduct`, `ProductNotFound`, or `SkuTaken`.
    #[instrument(skip(self, product))]
    pub async fn update_product(
        &self,
        id: ProductId,
        product: NewProduct,
    ) -> Result<Product, CatalogError> {
        let product = validate(product)?;
        self.store.update_product(id, product).await.map_err(conflict)
    }

    /// Set the absolute stock level.
    ///
    /// # Errors
    ///
    /// Returns `InvalidProduct` for a negative level or `ProductNotFound`.
    #[instrument(skip(self))]
    pub async fn set_stock(
        &self,
        id: ProductId,
        stock_quantity: i32,
    ) -> Result<Product, CatalogError> {
        if stock_quantity < 0 {
            return Err(CatalogError::InvalidProduct(
                "stock quantity cannot be negative".to_owned(),
            ));
        }
        self.store
            .update_stock(id, stock_quantity)
            .await
            .map_err(conflict)?;
        self.get_product(id, true).await
    }

    /// # Errors
    ///
    /// Returns `ProductNotFound` or `ProductInUse`.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), CatalogError> {
        match self.store.delete_product(id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(CatalogError::ProductNotFound),
            Err(RepositoryError::Conflict(_)) => Err(CatalogError::ProductInUse),
            Err(e) => Err(e.into()),
        }
    }
}

fn conflict(e: RepositoryError) -> CatalogError {
    match e {
        RepositoryError::NotFound => CatalogError::ProductNotFound,
        RepositoryError::Conflict(_) => CatalogError::SkuTaken,
        other => CatalogError::Repository(other),
    }
}

fn validate(mut product: NewProduct) -> Result<NewProduct, CatalogError> {
    product.sku = product.sku.trim().to_owned();
    product.name = product.name.trim().to_owned();

    if product.sku.is_empty() {
        return Err(CatalogError::InvalidProduct("sku is required".to_owned()));
    }
    if product.name.is_empty() {
        return Err(CatalogError::InvalidProduct("name is required".to_owned()));
    }
    if product.price.is_zero() {
        return Err(CatalogError::InvalidProduct(
            "price must be greater than zero".to_owned(),
        ));
    }
    if product.price > Money::MAX_PRICE {
        return Err(CatalogError::InvalidProduct(format!(
            "price must be at most {}",
            Money::MAX_PRICE
        )));
    }
    if product.stock_quantity < 0 {
        return Err(CatalogError::InvalidProduct(
            "stock quantity cannot be negative".to_owned(),
        ));
    }
    Ok(product)
}
