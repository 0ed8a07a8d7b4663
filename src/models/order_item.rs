use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

/// Catalog product types known to the inventory layer.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProductType {
    Simple,
    Virtual,
    Downloadable,
    Configurable,
    Bundle,
    Grouped,
    GiftCard,
}

impl ProductType {
    /// Simple products bought as part of a grouped product are recorded on the order
    /// line as `grouped`, but their stock is tracked like any simple product.
    pub fn for_source_management(self) -> Self {
        match self {
            ProductType::Grouped => ProductType::Simple,
            other => other,
        }
    }
}

/// One line of an order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub product_type: Option<ProductType>,
    #[serde(default)]
    pub is_virtual: bool,
    pub qty_ordered: Decimal,
    #[serde(default)]
    pub qty_refunded: Decimal,
    #[serde(default)]
    pub qty_canceled: Decimal,
    #[serde(default)]
    pub qty_invoiced: Decimal,
    #[serde(default)]
    pub qty_shipped: Decimal,
}

impl OrderItem {
    pub fn new(product_id: Uuid, sku: impl Into<String>, qty_ordered: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            sku: Some(sku.into()),
            name: String::new(),
            product_type: None,
            is_virtual: false,
            qty_ordered,
            qty_refunded: Decimal::ZERO,
            qty_canceled: Decimal::ZERO,
            qty_invoiced: Decimal::ZERO,
            qty_shipped: Decimal::ZERO,
        }
    }

    pub fn with_product_type(mut self, product_type: ProductType) -> Self {
        self.product_type = Some(product_type);
        self
    }

    /// Quantity still owed to the customer: ordered minus refunded minus canceled.
    pub fn qty_to_ship(&self) -> Decimal {
        (self.qty_ordered - self.qty_refunded - self.qty_canceled).max(Decimal::ZERO)
    }

    /// Part of [`qty_to_ship`](Self::qty_to_ship) that no shipment covers yet.
    pub fn qty_remaining_to_ship(&self) -> Decimal {
        (self.qty_to_ship() - self.qty_shipped).max(Decimal::ZERO)
    }

    /// Whether the line produces physical shipments at all.
    pub fn is_shippable(&self) -> bool {
        !self.is_virtual
            && !matches!(
                self.product_type,
                Some(ProductType::Virtual) | Some(ProductType::Downloadable)
            )
    }

    /// Cancels `qty` of the outstanding quantity. Never drives `qty_to_ship` below zero.
    pub fn cancel_qty(&mut self, qty: Decimal) -> Decimal {
        let cancellable = qty.min(self.qty_to_ship()).max(Decimal::ZERO);
        self.qty_canceled += cancellable;
        if self.qty_shipped > self.qty_to_ship() {
            self.qty_shipped = self.qty_to_ship();
        }
        cancellable
    }
}
