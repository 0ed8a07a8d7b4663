use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Shipping amounts tracked on the order payment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(default)]
    pub shipping_captured: Decimal,
    #[serde(default)]
    pub base_shipping_captured: Decimal,
    #[serde(default)]
    pub shipping_refunded: Decimal,
    #[serde(default)]
    pub base_shipping_refunded: Decimal,
}

impl Payment {
    pub fn reset_shipping_totals(&mut self) {
        self.shipping_captured = Decimal::ZERO;
        self.base_shipping_captured = Decimal::ZERO;
        self.shipping_refunded = Decimal::ZERO;
        self.base_shipping_refunded = Decimal::ZERO;
    }

    pub fn has_shipping_totals(&self) -> bool {
        [
            self.shipping_captured,
            self.base_shipping_captured,
            self.shipping_refunded,
            self.base_shipping_refunded,
        ]
        .iter()
        .any(|amount| !amount.is_zero())
    }
}
