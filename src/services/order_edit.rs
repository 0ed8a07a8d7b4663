//! Order edit workflow.
//!
//! Applies line changes to a stored order, raises one edit event per change so stock
//! follows the order, then brings the order's shipments in line.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::errors::ServiceError;
use crate::events::{DispatchReport, OrderEditEvent, OrderEditEventBus};
use crate::models::{Order, OrderEditDiff, OrderItem, ProductType, Shipment};
use crate::repositories::{OrderRepository, ShipmentRepository};
use crate::services::shipments::{ShipmentAction, ShipmentManager};

/// One change to an order line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ItemChange {
    AddItem {
        product_id: Uuid,
        #[serde(default)]
        sku: Option<String>,
        #[serde(default)]
        name: String,
        #[serde(default)]
        product_type: Option<ProductType>,
        #[serde(default)]
        is_virtual: bool,
        qty: Decimal,
    },
    /// Sets the line's outstanding quantity to `qty`.
    ChangeQty { item_id: Uuid, qty: Decimal },
    RemoveItem { item_id: Uuid },
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderEditRequest {
    pub order_id: Uuid,
    #[validate(length(min = 1, message = "At least one item change is required"))]
    pub changes: Vec<ItemChange>,
}

impl OrderEditRequest {
    pub fn new(order_id: Uuid) -> Self {
        Self {
            order_id,
            changes: Vec::new(),
        }
    }

    pub fn change(mut self, change: ItemChange) -> Self {
        self.changes.push(change);
        self
    }

    /// Derive validation plus quantity checks on every change.
    pub fn check(&self) -> Result<(), ValidationErrors> {
        self.validate()?;
        let mut errors = ValidationErrors::new();
        for change in &self.changes {
            match change {
                ItemChange::AddItem { qty, .. } if *qty <= Decimal::ZERO => {
                    let mut err = ValidationError::new("qty");
                    err.message = Some("Added items need a positive quantity".into());
                    errors.add("changes", err);
                }
                ItemChange::ChangeQty { qty, .. } if *qty < Decimal::ZERO => {
                    let mut err = ValidationError::new("qty");
                    err.message = Some("Quantity cannot be negative".into());
                    errors.add("changes", err);
                }
                _ => {}
            }
        }
        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderEditOutcome {
    pub order: Order,
    pub shipments: Vec<Shipment>,
    pub shipment_action: Option<ShipmentAction>,
    pub dispatch_reports: Vec<DispatchReport>,
}

impl OrderEditOutcome {
    pub fn failed_dispatches(&self) -> usize {
        self.dispatch_reports
            .iter()
            .map(|report| report.failures.len())
            .sum()
    }
}

/// Applies edits to orders and reconciles stock and shipments.
#[derive(Clone)]
pub struct OrderEditService {
    orders: Arc<dyn OrderRepository>,
    shipments: Arc<dyn ShipmentRepository>,
    shipment_manager: ShipmentManager,
    events: OrderEditEventBus,
}

impl OrderEditService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        shipments: Arc<dyn ShipmentRepository>,
        shipment_manager: ShipmentManager,
        events: OrderEditEventBus,
    ) -> Self {
        Self {
            orders,
            shipments,
            shipment_manager,
            events,
        }
    }

    #[instrument(skip(self, request), fields(order_id = %request.order_id, changes = request.changes.len()))]
    pub async fn apply_edit(&self, request: OrderEditRequest) -> Result<OrderEditOutcome, ServiceError> {
        request.check().map_err(|e| {
            let msg = format!("Invalid order edit: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        let mut order = self
            .orders
            .find_by_id(request.order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", request.order_id)))?;

        let mut dispatch_reports = Vec::new();
        for change in &request.changes {
            if let Some(event) = apply_change(&mut order, change)? {
                dispatch_reports.push(self.events.publish(&event).await);
            }
        }

        order.touch();
        let order = self.orders.save(&order).await?;
        let sync = self.shipment_manager.synchronize(order).await?;

        let mut order = sync.order;
        order.edit_diff = OrderEditDiff::default();
        let order = self.orders.save(&order).await?;
        let order_id = order.persisted_id()?;
        let shipments = self.shipments.find_by_order(order_id).await?;

        let outcome = OrderEditOutcome {
            order,
            shipments,
            shipment_action: sync.action,
            dispatch_reports,
        };
        if outcome.failed_dispatches() > 0 {
            warn!(
                failed = outcome.failed_dispatches(),
                "order edited with stock reconciliation failures"
            );
        }
        info!(
            order = %outcome.order.increment_id,
            shipments = outcome.shipments.len(),
            "order edit applied"
        );
        Ok(outcome)
    }
}

fn item_not_found(order: &Order, item_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!(
        "Item {} not found in order {}",
        item_id, order.increment_id
    ))
}

/// Mutates the order for one change and returns the event describing it, if any.
fn apply_change(order: &mut Order, change: &ItemChange) -> Result<Option<OrderEditEvent>, ServiceError> {
    match change {
        ItemChange::AddItem {
            product_id,
            sku,
            name,
            product_type,
            is_virtual,
            qty,
        } => {
            let mut item = OrderItem::new(*product_id, String::new(), *qty);
            item.sku = sku.clone();
            item.name = name.clone();
            item.product_type = *product_type;
            item.is_virtual = *is_virtual;
            order.items.push(item.clone());
            order.edit_diff.added_items = true;
            Ok(Some(OrderEditEvent::ItemAdded {
                order: order.clone(),
                item,
                qty: None,
            }))
        }
        ItemChange::ChangeQty { item_id, qty } => {
            let missing = item_not_found(order, *item_id);
            let item = order.item_mut(*item_id).ok_or(missing)?;
            let current = item.qty_to_ship();
            if *qty > current {
                let delta = *qty - current;
                item.qty_ordered += delta;
                let item = item.clone();
                order.edit_diff.increased_qty = true;
                Ok(Some(OrderEditEvent::ItemAdded {
                    order: order.clone(),
                    item,
                    qty: Some(delta),
                }))
            } else if *qty < current {
                let delta = item.cancel_qty(current - *qty);
                let item = item.clone();
                order.edit_diff.decreased_qty = true;
                Ok(Some(OrderEditEvent::ItemQtyRemoved {
                    order: order.clone(),
                    item,
                    qty_to_remove: delta,
                }))
            } else {
                Ok(None)
            }
        }
        ItemChange::RemoveItem { item_id } => {
            let item = order
                .item(*item_id)
                .cloned()
                .ok_or_else(|| item_not_found(order, *item_id))?;
            let remaining = item.qty_to_ship();
            order.edit_diff.removed_items = true;
            if remaining.is_zero() {
                return Ok(None);
            }
            // The event carries the line as it was before cancellation.
            if let Some(line) = order.item_mut(*item_id) {
                line.cancel_qty(remaining);
            }
            Ok(Some(OrderEditEvent::ItemQtyRemoved {
                order: order.clone(),
                item,
                qty_to_remove: remaining,
            }))
        }
    }
}
