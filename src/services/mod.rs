// Host-facing ports with in-process reference adapters
pub mod catalog;
pub mod inventory_reservation;

// Order edit reconciliation
pub mod order_edit;
pub mod shipments;
pub mod stock_qty;

// Service factory for dependency injection
pub mod factory;

pub use factory::{InMemoryAdapters, Ports, ServiceFactory};
pub use order_edit::{ItemChange, OrderEditOutcome, OrderEditRequest, OrderEditService};
pub use shipments::{ShipmentManager, ShipmentSettings};
pub use stock_qty::{StockAdjustment, StockQtyManagement, StockQtyManager};
