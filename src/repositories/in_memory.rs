use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::{OrderRepository, ShipmentRepository};
use crate::errors::ServiceError;
use crate::models::{Order, Payment, Shipment};

#[derive(Debug, Default)]
struct StoreState {
    orders: HashMap<Uuid, Order>,
    shipments: HashMap<Uuid, Shipment>,
}

/// Process-local order and shipment store.
///
/// Orders and shipments share one lock so that [`ShipmentRepository::register`] is
/// applied atomically.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    state: Mutex<StoreState>,
    fail_next_register: AtomicBool,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores an order as-is, assigning an id when it has none.
    pub fn seed_order(&self, mut order: Order) -> Order {
        let id = *order.id.get_or_insert_with(Uuid::new_v4);
        self.state().orders.insert(id, order.clone());
        order
    }

    pub fn seed_shipment(&self, shipment: Shipment) {
        self.state().shipments.insert(shipment.id, shipment);
    }

    pub fn order(&self, id: Uuid) -> Option<Order> {
        self.state().orders.get(&id).cloned()
    }

    /// Shipments of an order, oldest first.
    pub fn shipments_for(&self, order_id: Uuid) -> Vec<Shipment> {
        let mut shipments: Vec<Shipment> = self
            .state()
            .shipments
            .values()
            .filter(|shipment| shipment.order_id == order_id)
            .cloned()
            .collect();
        shipments.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.source_code.cmp(&b.source_code))
        });
        shipments
    }

    /// Makes the next `register` call fail without persisting anything.
    pub fn fail_next_register(&self) {
        self.fail_next_register.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, ServiceError> {
        Ok(self.order(id))
    }

    async fn save(&self, order: &Order) -> Result<Order, ServiceError> {
        let mut saved = order.clone();
        saved.touch();
        let id = *saved.id.get_or_insert_with(Uuid::new_v4);
        self.state().orders.insert(id, saved.clone());
        debug!(order_id = %id, "order saved");
        Ok(saved)
    }

    async fn save_payment(&self, order_id: Uuid, payment: &Payment) -> Result<(), ServiceError> {
        let mut state = self.state();
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        order.payment = payment.clone();
        Ok(())
    }
}

#[async_trait]
impl ShipmentRepository for InMemoryOrderStore {
    async fn find_by_order(&self, order_id: Uuid) -> Result<Vec<Shipment>, ServiceError> {
        Ok(self.shipments_for(order_id))
    }

    async fn delete(&self, shipment_id: Uuid) -> Result<(), ServiceError> {
        self.state()
            .shipments
            .remove(&shipment_id)
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(format!("Shipment {} not found", shipment_id)))
    }

    async fn register(&self, shipment: &Shipment, order: &Order) -> Result<(), ServiceError> {
        let order_id = order.persisted_id()?;
        if self.fail_next_register.swap(false, Ordering::SeqCst) {
            return Err(ServiceError::ExternalServiceError(format!(
                "Can not create shipment for order {}",
                order_id
            )));
        }
        if shipment.order_id != order_id {
            return Err(ServiceError::InvalidOperation(format!(
                "Shipment {} belongs to order {}, not {}",
                shipment.id, shipment.order_id, order_id
            )));
        }

        let mut state = self.state();
        if !state.orders.contains_key(&order_id) {
            return Err(ServiceError::NotFound(format!("Order {} not found", order_id)));
        }
        state.shipments.insert(shipment.id, shipment.clone());
        state.orders.insert(order_id, order.clone());
        Ok(())
    }
}
