//! Stock reconciliation handlers for order edit events.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{OrderEditEvent, OrderEditEventHandler};
use crate::errors::ServiceError;
use crate::services::stock_qty::StockQtyManagement;

/// Reserves stock for added or increased lines.
pub struct AddNewProductHandler {
    stock: Arc<dyn StockQtyManagement>,
}

impl AddNewProductHandler {
    pub fn new(stock: Arc<dyn StockQtyManagement>) -> Self {
        Self { stock }
    }
}

#[async_trait]
impl OrderEditEventHandler for AddNewProductHandler {
    async fn handle(&self, event: &OrderEditEvent) -> Result<(), ServiceError> {
        let OrderEditEvent::ItemAdded { order, item, qty } = event else {
            warn!(event = %event.kind(), "AddNewProductHandler received an unrelated event");
            return Ok(());
        };
        let adjustment = self.stock.deduct_qty_from_stock(order, item, *qty).await?;
        debug!(item_id = %item.id, ?adjustment, "stock deducted for added item");
        Ok(())
    }

    fn name(&self) -> &str {
        "add_new_product"
    }
}

/// Returns stock for removed or decreased lines.
pub struct RemoveItemQtyHandler {
    stock: Arc<dyn StockQtyManagement>,
}

impl RemoveItemQtyHandler {
    pub fn new(stock: Arc<dyn StockQtyManagement>) -> Self {
        Self { stock }
    }
}

#[async_trait]
impl OrderEditEventHandler for RemoveItemQtyHandler {
    async fn handle(&self, event: &OrderEditEvent) -> Result<(), ServiceError> {
        let OrderEditEvent::ItemQtyRemoved {
            order,
            item,
            qty_to_remove,
        } = event
        else {
            warn!(event = %event.kind(), "RemoveItemQtyHandler received an unrelated event");
            return Ok(());
        };
        let adjustment = self
            .stock
            .return_qty_to_stock(order, item, Some(*qty_to_remove))
            .await?;
        debug!(item_id = %item.id, ?adjustment, "stock returned for removed quantity");
        Ok(())
    }

    fn name(&self) -> &str {
        "remove_item_qty"
    }
}
