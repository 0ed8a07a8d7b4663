#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use order_edit_inventory::{
    config::{ShipmentsConfig, UpdateMode},
    models::{Order, OrderItem, OrderState, ProductType, Shipment, ShipmentItem},
    services::{InMemoryAdapters, OrderEditService, ServiceFactory, StockQtyManager},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

pub const WEBSITE_ID: i32 = 1;
pub const WEBSITE_CODE: &str = "base";
pub const STOCK_ID: i32 = 1;
pub const PRIMARY_SOURCE: &str = "eu-warehouse";
pub const SECONDARY_SOURCE: &str = "us-warehouse";

/// Helper harness wiring the reference adapters with a small catalog and one stock.
///
/// Stock 1 sells on website `base` from two sources. `MUG-01` and `CUP-01` are simple,
/// `KIT-01` is a bundle and `EBOOK-01` is downloadable.
pub struct TestApp {
    pub adapters: InMemoryAdapters,
    products: HashMap<&'static str, Uuid>,
}

impl TestApp {
    pub fn new() -> Self {
        let adapters = InMemoryAdapters::new();
        adapters.inventory.add_website(WEBSITE_ID, WEBSITE_CODE, STOCK_ID);
        adapters.inventory.assign_source(STOCK_ID, PRIMARY_SOURCE);
        adapters.inventory.assign_source(STOCK_ID, SECONDARY_SOURCE);

        let mut products = HashMap::new();
        for (sku, product_type, eu, us) in [
            ("MUG-01", ProductType::Simple, dec!(10), dec!(5)),
            ("CUP-01", ProductType::Simple, dec!(2), dec!(0)),
            ("KIT-01", ProductType::Bundle, dec!(0), dec!(0)),
            ("EBOOK-01", ProductType::Downloadable, dec!(100), dec!(0)),
        ] {
            let product_id = Uuid::new_v4();
            adapters.catalog.add_product(product_id, sku, product_type);
            adapters.inventory.set_source_qty(PRIMARY_SOURCE, sku, eu);
            adapters.inventory.set_source_qty(SECONDARY_SOURCE, sku, us);
            products.insert(sku, product_id);
        }

        Self { adapters, products }
    }

    pub fn product_id(&self, sku: &str) -> Uuid {
        self.products[sku]
    }

    pub fn item(&self, sku: &str, qty: Decimal) -> OrderItem {
        let item = OrderItem::new(self.product_id(sku), sku, qty);
        match sku {
            "EBOOK-01" => item.with_product_type(ProductType::Downloadable),
            "KIT-01" => item.with_product_type(ProductType::Bundle),
            _ => item.with_product_type(ProductType::Simple),
        }
    }

    /// Stores a processing order with the given lines.
    pub fn seed_order(&self, items: Vec<OrderItem>) -> Order {
        let mut order = Order::new("000000500", WEBSITE_ID);
        order.state = OrderState::Processing;
        order.items = items;
        self.adapters.store.seed_order(order)
    }

    /// Records a shipment from `source` and the shipped quantity on the stored order.
    pub fn ship(&self, order_id: Uuid, source: &str, lines: &[(Uuid, Decimal)]) -> Shipment {
        let mut order = self.stored_order(order_id);
        let mut items = Vec::new();
        for (item_id, qty) in lines {
            let item = order.item_mut(*item_id).expect("item exists");
            item.qty_shipped += *qty;
            items.push(ShipmentItem {
                order_item_id: *item_id,
                sku: item.sku.clone(),
                qty: *qty,
            });
        }
        order.refresh_shipping_state();
        self.adapters.store.seed_order(order);
        let shipment = Shipment::new(order_id, source, items);
        self.adapters.store.seed_shipment(shipment.clone());
        shipment
    }

    pub fn stored_order(&self, order_id: Uuid) -> Order {
        self.adapters.store.order(order_id).expect("order is stored")
    }

    pub fn shipments(&self, order_id: Uuid) -> Vec<Shipment> {
        self.adapters.store.shipments_for(order_id)
    }

    pub fn factory(&self, mode: UpdateMode) -> ServiceFactory {
        self.adapters.factory(Arc::new(ShipmentsConfig {
            update_mode: mode,
            default_source_code: "default".to_string(),
        }))
    }

    pub fn order_edit_service(&self, mode: UpdateMode) -> OrderEditService {
        self.factory(mode).order_edit_service()
    }

    pub fn stock_manager(&self) -> StockQtyManager {
        self.factory(UpdateMode::Rebuild).stock_qty_manager()
    }

    pub fn salable(&self, sku: &str) -> Decimal {
        self.adapters.inventory.salable_qty(STOCK_ID, sku)
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
