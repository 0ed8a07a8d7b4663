use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::{order_item::OrderItem, payment::Payment};

/// Lifecycle state of an order as tracked by the host.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderState {
    #[default]
    New,
    PendingPayment,
    Processing,
    Complete,
    Closed,
    Canceled,
    Holded,
    PaymentReview,
}

impl OrderState {
    /// States in which no new shipment may be registered. A completed order accepts
    /// shipments again once an edit leaves something to ship.
    pub fn blocks_shipping(self) -> bool {
        matches!(
            self,
            OrderState::Canceled | OrderState::Holded | OrderState::PaymentReview
        )
    }
}

/// What the edit workflow changed on the order since it was loaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEditDiff {
    #[serde(default)]
    pub added_items: bool,
    #[serde(default)]
    pub removed_items: bool,
    #[serde(default)]
    pub increased_qty: bool,
    #[serde(default)]
    pub decreased_qty: bool,
}

impl OrderEditDiff {
    pub fn has_reductions(&self) -> bool {
        self.removed_items || self.decreased_qty
    }

    pub fn has_additions(&self) -> bool {
        self.added_items || self.increased_qty
    }

    pub fn is_empty(&self) -> bool {
        !self.has_additions() && !self.has_reductions()
    }
}

/// Order aggregate as seen by the edit workflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// `None` until the host has persisted the order.
    #[serde(default)]
    pub id: Option<Uuid>,
    pub increment_id: String,
    pub website_id: i32,
    #[serde(default)]
    pub state: OrderState,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub payment: Payment,
    #[serde(default)]
    pub edit_diff: OrderEditDiff,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(increment_id: impl Into<String>, website_id: i32) -> Self {
        Self {
            id: None,
            increment_id: increment_id.into(),
            website_id,
            state: OrderState::New,
            items: Vec::new(),
            payment: Payment::default(),
            edit_diff: OrderEditDiff::default(),
            updated_at: Utc::now(),
        }
    }

    /// Persisted identity, or the error every reconciliation reports without one.
    pub fn persisted_id(&self) -> Result<Uuid, crate::errors::ServiceError> {
        self.id.ok_or_else(crate::errors::ServiceError::order_not_persisted)
    }

    pub fn item(&self, item_id: Uuid) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn item_mut(&mut self, item_id: Uuid) -> Option<&mut OrderItem> {
        self.items.iter_mut().find(|item| item.id == item_id)
    }

    /// True when the edit only grew the order: something was added or increased and
    /// nothing was removed or decreased.
    pub fn is_total_increased(&self) -> bool {
        self.edit_diff.has_additions() && !self.edit_diff.has_reductions()
    }

    pub fn can_ship(&self) -> bool {
        !self.state.blocks_shipping()
            && self
                .items
                .iter()
                .any(|item| item.is_shippable() && item.qty_remaining_to_ship() > Decimal::ZERO)
    }

    /// Moves the order to `Complete` once every shippable line is fully shipped, and a
    /// `Complete` order back to `Processing` while something is left to ship.
    pub fn refresh_shipping_state(&mut self) {
        if self.state.blocks_shipping() || self.state == OrderState::Closed {
            return;
        }
        let fully_shipped = self
            .items
            .iter()
            .filter(|item| item.is_shippable())
            .all(|item| item.qty_remaining_to_ship() == Decimal::ZERO);
        if fully_shipped && self.items.iter().any(|item| item.qty_shipped > Decimal::ZERO) {
            self.state = OrderState::Complete;
        } else if self.state == OrderState::Complete {
            self.state = OrderState::Processing;
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order_with_item(ordered: Decimal, shipped: Decimal) -> Order {
        let mut order = Order::new("000000042", 1);
        order.id = Some(Uuid::new_v4());
        order.state = OrderState::Processing;
        let mut item = OrderItem::new(Uuid::new_v4(), "SKU-1", ordered);
        item.qty_shipped = shipped;
        order.items.push(item);
        order
    }

    #[test]
    fn unpersisted_order_is_rejected() {
        let order = Order::new("000000001", 1);
        let err = order.persisted_id().unwrap_err();
        assert_eq!(err.error_code(), "invalid_input");
    }

    #[test]
    fn total_increased_requires_no_reductions() {
        let mut order = order_with_item(dec!(1), dec!(0));
        order.edit_diff.added_items = true;
        assert!(order.is_total_increased());
        order.edit_diff.decreased_qty = true;
        assert!(!order.is_total_increased());
        order.edit_diff = OrderEditDiff::default();
        assert!(!order.is_total_increased());
    }

    #[test]
    fn can_ship_needs_remaining_qty_and_open_state() {
        let order = order_with_item(dec!(2), dec!(1));
        assert!(order.can_ship());

        let shipped = order_with_item(dec!(2), dec!(2));
        assert!(!shipped.can_ship());

        let mut held = order_with_item(dec!(2), dec!(0));
        held.state = OrderState::Holded;
        assert!(!held.can_ship());
    }

    #[test]
    fn refresh_marks_fully_shipped_order_complete() {
        let mut order = order_with_item(dec!(2), dec!(2));
        order.refresh_shipping_state();
        assert_eq!(order.state, OrderState::Complete);

        let mut partial = order_with_item(dec!(2), dec!(1));
        partial.refresh_shipping_state();
        assert_eq!(partial.state, OrderState::Processing);
    }

    #[test]
    fn completed_order_with_new_qty_can_ship_again() {
        let mut order = order_with_item(dec!(2), dec!(2));
        order.refresh_shipping_state();
        assert!(!order.can_ship());

        order.items.push(OrderItem::new(Uuid::new_v4(), "SKU-2", dec!(1)));
        assert_eq!(order.state, OrderState::Complete);
        assert!(order.can_ship());

        order.refresh_shipping_state();
        assert_eq!(order.state, OrderState::Processing);
    }

    #[test]
    fn closed_order_keeps_its_state() {
        let mut order = order_with_item(dec!(2), dec!(2));
        order.state = OrderState::Closed;
        order.refresh_shipping_state();
        assert_eq!(order.state, OrderState::Closed);
    }
}
