//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! products:
//!   - sku: MUG-01
//!     name: Enamel mug
//!     description: 350ml, dishwasher safe
//!     price: "12.50"
//!     stock_quantity: 40
//!   - sku: PEN-02
//!     name: Brass pen
//!     price: "30.00"
//!     stock_quantity: 5
//!     active: false
//! ```
//!
//! Products are matched by sku: existing ones are updated in place, new ones
//! created.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use storekeep_api::db::ProductStore;
use storekeep_api::models::NewProduct;
use storekeep_api::services::{CatalogError, CatalogService};

use super::CliError;

/// Top-level layout of a seed file.
#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub products: Vec<NewProduct>,
}

/// What a seeding run changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub deactivated: usize,
}

/// Seed products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, a product fails
/// validation, or the database is unreachable.
pub async fn products(file_path: &str, clear: bool) -> Result<(), CliError> {
    let path = Path::new(file_path);
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Io {
            path: file_path.to_owned(),
            source,
        })?;
    let seed: ProductSeed = serde_yaml::from_str(&content)?;
    info!(path = %file_path, products = seed.products.len(), "Parsed seed file");

    let store = super::connect().await?;
    let summary = upsert_products(&store, seed.products, clear).await?;

    info!("Seeding complete!");
    info!("  Created: {}", summary.created);
    info!("  Updated: {}", summary.updated);
    if clear {
        info!("  Removed: {}", summary.removed);
        info!("  Deactivated (referenced by orders): {}", summary.deactivated);
    }
    Ok(())
}

/// Upsert `products` by sku, optionally clearing products not listed.
///
/// # Errors
///
/// Returns `CatalogError` on the first product that fails.
pub async fn upsert_products<S: ProductStore>(
    store: &S,
    products: Vec<NewProduct>,
    clear: bool,
) -> Result<SeedSummary, CatalogError> {
    let catalog = CatalogService::new(store);
    let mut summary = SeedSummary::default();
    let mut seeded = HashSet::new();

    for product in products {
        let sku = product.sku.trim().to_owned();
        match store.get_product_by_sku(&sku).await? {
            Some(existing) => {
                catalog.update_product(existing.id, product).await?;
                summary.updated += 1;
            }
            None => {
                catalog.create_product(product).await?;
                summary.created += 1;
            }
        }
        seeded.insert(sku);
    }

    if clear {
        for stale in catalog.list_products(true).await? {
            if seeded.contains(&stale.sku) {
                continue;
            }
            match catalog.delete_product(stale.id).await {
                Ok(()) => summary.removed += 1,
                Err(CatalogError::ProductInUse) => {
                    let id = stale.id;
                    catalog
                        .update_product(
                            id,
                            NewProduct {
                                sku: stale.sku,
                                name: stale.name,
                                description: stale.description,
                                price: stale.price,
                                stock_quantity: stale.stock_quantity,
                                active: false,
                            },
                        )
                        .await?;
                    summary.deactivated += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(summary)
}
