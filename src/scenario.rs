//! Replayable order edit scenarios.
//!
//! A scenario describes the catalog, stocks, one order with its existing shipments and
//! an edit to apply. It is loaded into the reference adapters and run through
//! [`OrderEditService`](crate::services::OrderEditService).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::UpdateMode;
use crate::errors::ServiceError;
use crate::models::{Order, ProductType, Shipment, ShipmentItem};
use crate::repositories::InMemoryOrderStore;
use crate::services::catalog::InMemoryCatalog;
use crate::services::inventory_reservation::{InMemoryInventory, Reservation, SourceReturn};
use crate::services::{InMemoryAdapters, ItemChange, OrderEditOutcome, OrderEditRequest, ShipmentSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteSeed {
    pub id: i32,
    pub code: String,
    pub stock_id: i32,
}

/// A source linked to a stock, with its quantity per SKU.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSeed {
    pub code: String,
    pub stock_id: i32,
    #[serde(default)]
    pub items: BTreeMap<String, Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSeed {
    pub product_id: Uuid,
    pub sku: String,
    pub product_type: ProductType,
}

/// A shipment that already exists for the scenario order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentSeed {
    pub source_code: String,
    pub items: Vec<ShipmentItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub websites: Vec<WebsiteSeed>,
    #[serde(default)]
    pub sources: Vec<SourceSeed>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
    /// Product types tracked per source; the catalog default applies when absent.
    #[serde(default)]
    pub source_managed_types: Option<Vec<ProductType>>,
    pub order: Order,
    /// Seeded shipments also count as shipped quantity on the order items.
    #[serde(default)]
    pub shipments: Vec<ShipmentSeed>,
    pub changes: Vec<ItemChange>,
    #[serde(default)]
    pub update_mode: Option<UpdateMode>,
}

/// Everything a scenario run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub outcome: OrderEditOutcome,
    pub reservations: Vec<Reservation>,
    pub source_returns: Vec<SourceReturn>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self, ServiceError> {
        serde_json::from_str(json)
            .map_err(|e| ServiceError::InvalidInput(format!("Invalid scenario: {}", e)))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::InvalidInput(format!("Cannot read scenario {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Loads the scenario into fresh reference adapters and returns them with the id of
    /// the stored order.
    pub fn seed(&self) -> Result<(InMemoryAdapters, Uuid), ServiceError> {
        let catalog = match &self.source_managed_types {
            Some(types) => InMemoryCatalog::with_source_managed_types(types.iter().copied()),
            None => InMemoryCatalog::new(),
        };
        for product in &self.products {
            catalog.add_product(product.product_id, product.sku.clone(), product.product_type);
        }

        let inventory = InMemoryInventory::new();
        for website in &self.websites {
            inventory.add_website(website.id, website.code.clone(), website.stock_id);
        }
        for source in &self.sources {
            inventory.assign_source(source.stock_id, source.code.clone());
            for (sku, qty) in &source.items {
                inventory.set_source_qty(source.code.clone(), sku.clone(), *qty);
            }
        }

        let store = InMemoryOrderStore::new();
        let mut order = self.order.clone();
        for seed in &self.shipments {
            for shipped in &seed.items {
                let item = order.item_mut(shipped.order_item_id).ok_or_else(|| {
                    ServiceError::InvalidInput(format!(
                        "Shipment references unknown order item {}",
                        shipped.order_item_id
                    ))
                })?;
                item.qty_shipped += shipped.qty;
            }
        }
        order.refresh_shipping_state();
        let order = store.seed_order(order);
        let order_id = order.persisted_id()?;
        for seed in &self.shipments {
            store.seed_shipment(Shipment::new(order_id, seed.source_code.clone(), seed.items.clone()));
        }

        let adapters = InMemoryAdapters {
            store: Arc::new(store),
            catalog: Arc::new(catalog),
            inventory: Arc::new(inventory),
        };
        Ok((adapters, order_id))
    }

    pub async fn run(&self, settings: Arc<dyn ShipmentSettings>) -> Result<ScenarioReport, ServiceError> {
        let (adapters, order_id) = self.seed()?;
        info!(
            order = %self.order.increment_id,
            changes = self.changes.len(),
            update_mode = %settings.update_mode(),
            "replaying order edit scenario"
        );

        let request = OrderEditRequest {
            order_id,
            changes: self.changes.clone(),
        };
        let outcome = adapters.factory(settings).order_edit_service().apply_edit(request).await?;

        Ok(ScenarioReport {
            outcome,
            reservations: adapters.inventory.reservations(),
            source_returns: adapters.inventory.source_returns(),
        })
    }
}
