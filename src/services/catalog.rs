//! Catalog lookups needed to decide whether an order line is source-managed.

use async_trait::async_trait;
use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;
use std::collections::HashSet;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::ProductType;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn sku_by_product_id(&self, product_id: Uuid) -> Result<String, ServiceError>;

    async fn product_type_by_sku(&self, sku: &str) -> Result<ProductType, ServiceError>;

    async fn is_source_item_management_allowed(&self, product_type: ProductType) -> bool;
}

/// Catalog kept in process, keyed by product id.
#[derive(Debug)]
pub struct InMemoryCatalog {
    skus: DashMap<Uuid, String>,
    types: DashMap<String, ProductType>,
    source_managed: HashSet<ProductType>,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCatalog {
    /// Physical and downloadable goods track stock per source; composite types do not.
    pub fn new() -> Self {
        Self::with_source_managed_types([
            ProductType::Simple,
            ProductType::Virtual,
            ProductType::Downloadable,
        ])
    }

    pub fn with_source_managed_types(types: impl IntoIterator<Item = ProductType>) -> Self {
        Self {
            skus: DashMap::new(),
            types: DashMap::new(),
            source_managed: types.into_iter().collect(),
        }
    }

    pub fn add_product(&self, product_id: Uuid, sku: impl Into<String>, product_type: ProductType) {
        let sku = sku.into();
        self.types.insert(sku.clone(), product_type);
        self.skus.insert(product_id, sku);
    }
}

#[async_trait]
impl CatalogLookup for InMemoryCatalog {
    async fn sku_by_product_id(&self, product_id: Uuid) -> Result<String, ServiceError> {
        self.skus
            .get(&product_id)
            .map(|sku| sku.value().clone())
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No SKU found for product {}", product_id))
            })
    }

    async fn product_type_by_sku(&self, sku: &str) -> Result<ProductType, ServiceError> {
        self.types
            .get(sku)
            .map(|product_type| *product_type.value())
            .ok_or_else(|| ServiceError::NotFound(format!("Product type for SKU {} not found", sku)))
    }

    async fn is_source_item_management_allowed(&self, product_type: ProductType) -> bool {
        self.source_managed.contains(&product_type)
    }
}
