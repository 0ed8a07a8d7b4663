use std::sync::Arc;

use crate::{
    events::OrderEditEventBus,
    repositories::{InMemoryOrderStore, OrderRepository, ShipmentRepository},
    services::{
        catalog::{CatalogLookup, InMemoryCatalog},
        inventory_reservation::{
            InMemoryInventory, RefundProcessor, ReservationExecutor, StockResolver,
        },
        order_edit::OrderEditService,
        shipments::{ShipmentManager, ShipmentSettings},
        stock_qty::StockQtyManager,
    },
};

/// Host capabilities the edit workflow depends on
#[derive(Clone)]
pub struct Ports {
    pub orders: Arc<dyn OrderRepository>,
    pub shipments: Arc<dyn ShipmentRepository>,
    pub catalog: Arc<dyn CatalogLookup>,
    pub stock_resolver: Arc<dyn StockResolver>,
    pub reservations: Arc<dyn ReservationExecutor>,
    pub refunds: Arc<dyn RefundProcessor>,
    pub settings: Arc<dyn ShipmentSettings>,
}

/// Factory for creating service instances with shared dependencies
#[derive(Clone)]
pub struct ServiceFactory {
    ports: Ports,
}

impl ServiceFactory {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }

    pub fn stock_qty_manager(&self) -> StockQtyManager {
        StockQtyManager::new(
            self.ports.catalog.clone(),
            self.ports.stock_resolver.clone(),
            self.ports.reservations.clone(),
            self.ports.refunds.clone(),
        )
    }

    pub fn shipment_manager(&self) -> ShipmentManager {
        ShipmentManager::new(
            self.ports.orders.clone(),
            self.ports.shipments.clone(),
            self.ports.settings.clone(),
        )
    }

    /// Event bus with the stock handlers subscribed
    pub fn event_bus(&self) -> OrderEditEventBus {
        OrderEditEventBus::with_stock_handlers(Arc::new(self.stock_qty_manager()))
    }

    pub fn order_edit_service(&self) -> OrderEditService {
        OrderEditService::new(
            self.ports.orders.clone(),
            self.ports.shipments.clone(),
            self.shipment_manager(),
            self.event_bus(),
        )
    }

    pub fn ports(&self) -> &Ports {
        &self.ports
    }
}

/// Reference adapters wired into one factory.
#[derive(Clone, Default)]
pub struct InMemoryAdapters {
    pub store: Arc<InMemoryOrderStore>,
    pub catalog: Arc<InMemoryCatalog>,
    pub inventory: Arc<InMemoryInventory>,
}

impl InMemoryAdapters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self, settings: Arc<dyn ShipmentSettings>) -> ServiceFactory {
        ServiceFactory::new(Ports {
            orders: self.store.clone(),
            shipments: self.store.clone(),
            catalog: self.catalog.clone(),
            stock_resolver: self.inventory.clone(),
            reservations: self.inventory.clone(),
            refunds: self.inventory.clone(),
            settings,
        })
    }
}
