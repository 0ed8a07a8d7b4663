//! Shipment synchronization for edited orders.
//!
//! After an edit the existing shipments of an order are kept, extended, dropped or
//! rebuilt depending on the configured [`UpdateMode`] and on how the edit changed the
//! order. The decision is made by [`shipment_action`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use strum::{Display, EnumIter};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::UpdateMode;
use crate::errors::ServiceError;
use crate::metrics;
use crate::models::{Order, OrderState, Shipment, ShipmentItem};
use crate::repositories::{OrderRepository, ShipmentRepository};

/// Shipment-related settings provided by the host configuration.
pub trait ShipmentSettings: Send + Sync {
    fn update_mode(&self) -> UpdateMode;

    /// Source used for items that were never shipped from a specific source.
    fn default_source_code(&self) -> String;
}

/// How an edit changed the order, as far as shipments are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EditKind {
    /// Items were added or increased and nothing was removed or decreased.
    TotalIncreased,
    /// At least one item was removed or decreased.
    Reduced,
    Unchanged,
}

impl EditKind {
    pub fn of(order: &Order) -> Self {
        if order.is_total_increased() {
            EditKind::TotalIncreased
        } else if order.edit_diff.has_reductions() {
            EditKind::Reduced
        } else {
            EditKind::Unchanged
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShipmentAction {
    /// Leave existing shipments untouched.
    Keep,
    /// Keep existing shipments and ship whatever is left to ship.
    AppendNew,
    /// Delete every shipment and do not recreate any.
    RemoveAll,
    /// Delete every shipment, then ship the current items again.
    RebuildAll,
}

/// Action for every `(mode, kind)` pair.
pub fn shipment_action(mode: UpdateMode, kind: EditKind) -> ShipmentAction {
    match (mode, kind) {
        (UpdateMode::Add, EditKind::TotalIncreased) => ShipmentAction::AppendNew,
        (UpdateMode::Add, EditKind::Reduced) => ShipmentAction::RebuildAll,
        (UpdateMode::Add, EditKind::Unchanged) => ShipmentAction::RebuildAll,
        (UpdateMode::Rebuild, _) => ShipmentAction::RebuildAll,
        (UpdateMode::Nothing, EditKind::TotalIncreased) => ShipmentAction::Keep,
        (UpdateMode::Nothing, EditKind::Reduced) => ShipmentAction::RemoveAll,
        (UpdateMode::Nothing, EditKind::Unchanged) => ShipmentAction::Keep,
    }
}

/// Quantities each source shipped per order item before the edit, in shipment order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceAllocations {
    by_item: BTreeMap<Uuid, Vec<(String, Decimal)>>,
}

impl SourceAllocations {
    pub fn from_shipments(shipments: &[Shipment]) -> Self {
        let mut by_item: BTreeMap<Uuid, Vec<(String, Decimal)>> = BTreeMap::new();
        for shipment in shipments {
            for item in &shipment.items {
                let sources = by_item.entry(item.order_item_id).or_default();
                match sources
                    .iter_mut()
                    .find(|(source_code, _)| *source_code == shipment.source_code)
                {
                    Some((_, qty)) => *qty += item.qty,
                    None => sources.push((shipment.source_code.clone(), item.qty)),
                }
            }
        }
        Self { by_item }
    }

    pub fn sources_for(&self, order_item_id: Uuid) -> &[(String, Decimal)] {
        self.by_item
            .get(&order_item_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.by_item.is_empty()
    }
}

/// Splits what is left to ship into one group per source code.
///
/// Each item first fills the sources it shipped from before, up to the quantity each
/// of them shipped; quantity already shipped now is counted against those sources
/// first. Any surplus goes to the item's first source, and items without history go to
/// `default_source`.
pub fn plan_shipment_groups(
    order: &Order,
    allocations: &SourceAllocations,
    default_source: &str,
) -> BTreeMap<String, Vec<ShipmentItem>> {
    let mut groups: BTreeMap<String, Vec<ShipmentItem>> = BTreeMap::new();

    for item in order.items.iter().filter(|item| item.is_shippable()) {
        let mut remaining = item.qty_remaining_to_ship();
        if remaining.is_zero() {
            continue;
        }

        let sources = allocations.sources_for(item.id);
        let mut split: Vec<(String, Decimal)> = Vec::new();
        let mut already_shipped = item.qty_shipped;
        for (source_code, previous_qty) in sources {
            let consumed = already_shipped.min(*previous_qty);
            already_shipped -= consumed;
            let capacity = (*previous_qty - consumed).min(remaining);
            if capacity > Decimal::ZERO {
                split.push((source_code.clone(), capacity));
                remaining -= capacity;
            }
        }
        if remaining > Decimal::ZERO {
            let primary = sources
                .first()
                .map(|(source_code, _)| source_code.as_str())
                .unwrap_or(default_source);
            match split.iter_mut().find(|(source_code, _)| source_code.as_str() == primary) {
                Some((_, qty)) => *qty += remaining,
                None => split.push((primary.to_string(), remaining)),
            }
        }

        for (source_code, qty) in split {
            groups.entry(source_code).or_default().push(ShipmentItem {
                order_item_id: item.id,
                sku: item.sku.clone(),
                qty,
            });
        }
    }

    groups.retain(|_, items| items.iter().any(|item| item.qty > Decimal::ZERO));
    groups
}

/// Result of one synchronization pass.
#[derive(Debug, Clone)]
pub struct ShipmentSync {
    pub order: Order,
    pub action: Option<ShipmentAction>,
    pub removed: usize,
    pub created: Vec<Shipment>,
}

/// Keeps shipment records in line with edited orders.
#[derive(Clone)]
pub struct ShipmentManager {
    orders: Arc<dyn OrderRepository>,
    shipments: Arc<dyn ShipmentRepository>,
    settings: Arc<dyn ShipmentSettings>,
}

impl ShipmentManager {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        shipments: Arc<dyn ShipmentRepository>,
        settings: Arc<dyn ShipmentSettings>,
    ) -> Self {
        Self {
            orders,
            shipments,
            settings,
        }
    }

    /// Adds or removes shipments of the order after an edit and returns the updated order.
    pub async fn update_shipments_on_order_edit(&self, order: Order) -> Result<Order, ServiceError> {
        Ok(self.synchronize(order).await?.order)
    }

    /// Same as [`update_shipments_on_order_edit`](Self::update_shipments_on_order_edit),
    /// reporting what was done.
    #[instrument(skip(self, order), fields(order = %order.increment_id))]
    pub async fn synchronize(&self, mut order: Order) -> Result<ShipmentSync, ServiceError> {
        let order_id = order.persisted_id()?;
        let existing = self.shipments.find_by_order(order_id).await?;
        if existing.is_empty() {
            debug!("order has no shipments, nothing to synchronize");
            return Ok(ShipmentSync {
                order,
                action: None,
                removed: 0,
                created: Vec::new(),
            });
        }

        let allocations = SourceAllocations::from_shipments(&existing);
        let mode = self.settings.update_mode();
        let kind = EditKind::of(&order);
        let action = shipment_action(mode, kind);
        info!(mode = %mode, kind = %kind, action = %action, "synchronizing shipments");

        let mut removed = 0;
        let mut created = Vec::new();
        match action {
            ShipmentAction::Keep => {}
            ShipmentAction::AppendNew => {
                created = self.create_shipment_for_order(&mut order, &allocations).await?;
            }
            ShipmentAction::RemoveAll => {
                removed = self.remove_all_shipments(&mut order, &existing).await?;
            }
            ShipmentAction::RebuildAll => {
                removed = self.remove_all_shipments(&mut order, &existing).await?;
                created = self.create_shipment_for_order(&mut order, &allocations).await?;
            }
        }

        Ok(ShipmentSync {
            order,
            action: Some(action),
            removed,
            created,
        })
    }

    /// Deletes the given shipments and resets everything they recorded on the order and
    /// its payment.
    pub async fn remove_all_shipments(
        &self,
        order: &mut Order,
        shipments: &[Shipment],
    ) -> Result<usize, ServiceError> {
        let order_id = order.persisted_id()?;
        for shipment in shipments {
            self.shipments.delete(shipment.id).await?;
            metrics::SHIPMENTS_REMOVED.inc();
        }

        for item in order.items.iter_mut() {
            item.qty_shipped = Decimal::ZERO;
        }
        order.state = OrderState::Processing;
        *order = self.orders.save(order).await?;

        order.payment.reset_shipping_totals();
        self.orders.save_payment(order_id, &order.payment).await?;

        info!(removed = shipments.len(), "removed all shipments");
        Ok(shipments.len())
    }

    /// Creates one shipment per source code for whatever is left to ship. Does nothing
    /// when the order cannot be shipped.
    pub async fn create_shipment_for_order(
        &self,
        order: &mut Order,
        allocations: &SourceAllocations,
    ) -> Result<Vec<Shipment>, ServiceError> {
        if !order.can_ship() {
            debug!(state = %order.state, "order cannot be shipped, no shipment created");
            return Ok(Vec::new());
        }
        let order_id = order.persisted_id()?;
        let default_source = self.settings.default_source_code();
        let groups = plan_shipment_groups(order, allocations, &default_source);

        let mut created = Vec::with_capacity(groups.len());
        for (source_code, items) in groups {
            let items: Vec<ShipmentItem> = items
                .into_iter()
                .filter(|item| item.qty > Decimal::ZERO)
                .collect();
            if items.is_empty() {
                continue;
            }

            let mut registered = order.clone();
            for shipment_item in &items {
                if let Some(order_item) = registered.item_mut(shipment_item.order_item_id) {
                    let qty = shipment_item.qty.min(order_item.qty_remaining_to_ship());
                    order_item.qty_shipped += qty;
                }
            }
            registered.refresh_shipping_state();
            registered.touch();

            let shipment = Shipment::new(order_id, source_code.clone(), items);
            self.shipments.register(&shipment, &registered).await?;
            *order = registered;

            metrics::SHIPMENTS_CREATED.inc();
            info!(
                shipment_id = %shipment.id,
                source_code = %source_code,
                qty = %shipment.total_qty(),
                "shipment created"
            );
            created.push(shipment);
        }
        Ok(created)
    }
}
