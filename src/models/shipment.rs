use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source used when an item carries no multi-source allocation.
pub const DEFAULT_SOURCE_CODE: &str = "default";

/// One order line inside a shipment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub order_item_id: Uuid,
    #[serde(default)]
    pub sku: Option<String>,
    pub qty: Decimal,
}

/// Shipment record, tied to a single inventory source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub source_code: String,
    pub items: Vec<ShipmentItem>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Shipment {
    pub fn new(order_id: Uuid, source_code: impl Into<String>, items: Vec<ShipmentItem>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            source_code: source_code.into(),
            items,
            created_at: Utc::now(),
        }
    }

    pub fn total_qty(&self) -> Decimal {
        self.items.iter().map(|item| item.qty).sum()
    }
}
