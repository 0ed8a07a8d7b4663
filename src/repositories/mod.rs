//! Persistence ports the edit workflow reaches into the host through.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{Order, Payment, Shipment};

pub mod in_memory;

pub use in_memory::InMemoryOrderStore;

/// Load/save access to orders and their payment.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, ServiceError>;

    /// Saves the order with its items, assigning an id on first save.
    async fn save(&self, order: &Order) -> Result<Order, ServiceError>;

    async fn save_payment(&self, order_id: Uuid, payment: &Payment) -> Result<(), ServiceError>;
}

/// Shipment records of an order.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ShipmentRepository: Send + Sync {
    async fn find_by_order(&self, order_id: Uuid) -> Result<Vec<Shipment>, ServiceError>;

    async fn delete(&self, shipment_id: Uuid) -> Result<(), ServiceError>;

    /// Persists a new shipment together with the order it ships from. Either both are
    /// stored or neither is.
    async fn register(&self, shipment: &Shipment, order: &Order) -> Result<(), ServiceError>;
}
