use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Signed quantity change against a stock; negative values hold back salable quantity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemToSell {
    pub sku: String,
    pub qty: Decimal,
}

/// Quantity going back to the sources on refund, with the part already processed
/// (invoiced and not yet refunded) at the time of the return.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemToRefund {
    pub sku: String,
    pub qty: Decimal,
    pub processed_qty: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SalesEventType {
    OrderPlaced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SalesEventObjectType {
    Order,
}

/// Describes why a reservation is placed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SalesEvent {
    pub event_type: SalesEventType,
    pub object_type: SalesEventObjectType,
    pub object_id: String,
    /// Correlates all reservations of one order.
    pub object_increment_id: String,
}

impl SalesEvent {
    pub fn order_placed(order_id: impl Into<String>, increment_id: impl Into<String>) -> Self {
        Self {
            event_type: SalesEventType::OrderPlaced,
            object_type: SalesEventObjectType::Order,
            object_id: order_id.into(),
            object_increment_id: increment_id.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SalesChannelType {
    Website,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SalesChannel {
    pub channel_type: SalesChannelType,
    pub code: String,
}

impl SalesChannel {
    pub fn website(code: impl Into<String>) -> Self {
        Self {
            channel_type: SalesChannelType::Website,
            code: code.into(),
        }
    }
}
