//! Inventory Reservation ports
//!
//! Stock resolution, salable-quantity checks, sales-event reservations and source
//! deductions on refund. The host owns these primitives; [`InMemoryInventory`] models
//! them closely enough to run the edit workflow end to end.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{ItemToRefund, ItemToSell, Order, SalesChannel, SalesEvent};

/// Resolves the stock and sales channel a website sells from.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StockResolver: Send + Sync {
    async fn stock_id_by_website(&self, website_id: i32) -> Result<i32, ServiceError>;

    async fn website_code(&self, website_id: i32) -> Result<String, ServiceError>;
}

/// Places reservations against a stock's salable quantity.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReservationExecutor: Send + Sync {
    /// Fails with [`ServiceError::InsufficientStock`] if any SKU lacks salable quantity.
    async fn check_items_quantity(
        &self,
        items_by_sku: &BTreeMap<String, Decimal>,
        stock_id: i32,
    ) -> Result<(), ServiceError>;

    async fn place_reservations_for_sales_event(
        &self,
        items: &[ItemToSell],
        sales_channel: &SalesChannel,
        sales_event: &SalesEvent,
    ) -> Result<(), ServiceError>;
}

/// Returns refunded quantity to the sources it was taken from.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RefundProcessor: Send + Sync {
    async fn deduct_source_item_quantity_on_refund(
        &self,
        order: &Order,
        items: &[ItemToRefund],
        refunded_order_item_ids: &[Uuid],
    ) -> Result<(), ServiceError>;
}

/// Reservation recorded by [`InMemoryInventory`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub stock_id: i32,
    pub sku: String,
    pub qty: Decimal,
    pub sales_channel: SalesChannel,
    pub sales_event: SalesEvent,
    pub created_at: DateTime<Utc>,
}

/// Refund processed by [`InMemoryInventory`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReturn {
    pub order_increment_id: String,
    pub source_code: String,
    pub sku: String,
    pub qty: Decimal,
    pub processed_qty: Decimal,
    pub order_item_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
struct WebsiteStock {
    code: String,
    stock_id: i32,
}

/// Sources, stocks and reservations kept in process.
///
/// Salable quantity of a SKU in a stock is the sum of its source items across the
/// stock's sources plus every reservation placed against that stock.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    websites: DashMap<i32, WebsiteStock>,
    stock_sources: DashMap<i32, Vec<String>>,
    source_items: DashMap<(String, String), Decimal>,
    reservations: Mutex<Vec<Reservation>>,
    returns: Mutex<Vec<SourceReturn>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_website(&self, website_id: i32, code: impl Into<String>, stock_id: i32) {
        self.websites.insert(
            website_id,
            WebsiteStock {
                code: code.into(),
                stock_id,
            },
        );
    }

    /// Links a source to a stock; the first linked source is the stock's primary one.
    pub fn assign_source(&self, stock_id: i32, source_code: impl Into<String>) {
        let source_code = source_code.into();
        let mut sources = self.stock_sources.entry(stock_id).or_default();
        if !sources.contains(&source_code) {
            sources.push(source_code);
        }
    }

    pub fn set_source_qty(&self, source_code: impl Into<String>, sku: impl Into<String>, qty: Decimal) {
        self.source_items.insert((source_code.into(), sku.into()), qty);
    }

    pub fn source_qty(&self, source_code: &str, sku: &str) -> Decimal {
        self.source_items
            .get(&(source_code.to_string(), sku.to_string()))
            .map(|qty| *qty.value())
            .unwrap_or_default()
    }

    pub fn salable_qty(&self, stock_id: i32, sku: &str) -> Decimal {
        let physical: Decimal = self
            .stock_sources
            .get(&stock_id)
            .map(|sources| {
                sources
                    .iter()
                    .map(|source| self.source_qty(source, sku))
                    .sum()
            })
            .unwrap_or_default();
        let reserved: Decimal = self
            .reservations()
            .iter()
            .filter(|reservation| reservation.stock_id == stock_id && reservation.sku == sku)
            .map(|reservation| reservation.qty)
            .sum();
        physical + reserved
    }

    pub fn reservations(&self) -> Vec<Reservation> {
        self.reservations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn source_returns(&self) -> Vec<SourceReturn> {
        self.returns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn stock_by_channel(&self, channel: &SalesChannel) -> Result<i32, ServiceError> {
        self.websites
            .iter()
            .find(|website| website.code == channel.code)
            .map(|website| website.stock_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No stock assigned to website {}", channel.code))
            })
    }

    fn primary_source(&self, stock_id: i32) -> Result<String, ServiceError> {
        self.stock_sources
            .get(&stock_id)
            .and_then(|sources| sources.first().cloned())
            .ok_or_else(|| ServiceError::NotFound(format!("Stock {} has no sources", stock_id)))
    }

    fn website(&self, website_id: i32) -> Result<WebsiteStock, ServiceError> {
        self.websites
            .get(&website_id)
            .map(|website| website.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("Website {} not found", website_id)))
    }
}

#[async_trait]
impl StockResolver for InMemoryInventory {
    async fn stock_id_by_website(&self, website_id: i32) -> Result<i32, ServiceError> {
        self.website(website_id).map(|website| website.stock_id)
    }

    async fn website_code(&self, website_id: i32) -> Result<String, ServiceError> {
        self.website(website_id).map(|website| website.code)
    }
}

#[async_trait]
impl ReservationExecutor for InMemoryInventory {
    async fn check_items_quantity(
        &self,
        items_by_sku: &BTreeMap<String, Decimal>,
        stock_id: i32,
    ) -> Result<(), ServiceError> {
        for (sku, requested) in items_by_sku {
            let available = self.salable_qty(stock_id, sku);
            if available < *requested {
                return Err(ServiceError::InsufficientStock(format!(
                    "The requested qty {} of SKU {} is not available in stock {} (salable: {})",
                    requested, sku, stock_id, available
                )));
            }
        }
        Ok(())
    }

    async fn place_reservations_for_sales_event(
        &self,
        items: &[ItemToSell],
        sales_channel: &SalesChannel,
        sales_event: &SalesEvent,
    ) -> Result<(), ServiceError> {
        let stock_id = self.stock_by_channel(sales_channel)?;
        let now = Utc::now();
        let mut reservations = self
            .reservations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for item in items {
            debug!(
                stock_id,
                sku = %item.sku,
                qty = %item.qty,
                increment_id = %sales_event.object_increment_id,
                "placing reservation"
            );
            reservations.push(Reservation {
                stock_id,
                sku: item.sku.clone(),
                qty: item.qty,
                sales_channel: sales_channel.clone(),
                sales_event: sales_event.clone(),
                created_at: now,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RefundProcessor for InMemoryInventory {
    async fn deduct_source_item_quantity_on_refund(
        &self,
        order: &Order,
        items: &[ItemToRefund],
        refunded_order_item_ids: &[Uuid],
    ) -> Result<(), ServiceError> {
        let stock_id = self.website(order.website_id)?.stock_id;
        let source_code = self.primary_source(stock_id)?;

        let mut returns = self.returns.lock().unwrap_or_else(PoisonError::into_inner);
        for item in items {
            *self
                .source_items
                .entry((source_code.clone(), item.sku.clone()))
                .or_default() += item.qty;
            info!(
                source_code = %source_code,
                sku = %item.sku,
                qty = %item.qty,
                processed_qty = %item.processed_qty,
                "returned quantity to source"
            );
            returns.push(SourceReturn {
                order_increment_id: order.increment_id.clone(),
                source_code: source_code.clone(),
                sku: item.sku.clone(),
                qty: item.qty,
                processed_qty: item.processed_qty,
                order_item_ids: refunded_order_item_ids.to_vec(),
            });
        }
        Ok(())
    }
}
