//! Stock quantity reconciliation for edited order lines.
//!
//! Added or increased lines hold back salable quantity through a sales-event
//! reservation; removed or decreased lines give quantity back to the sources.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::errors::ServiceError;
use crate::metrics;
use crate::models::{
    ItemToRefund, ItemToSell, Order, OrderItem, ProductType, SalesChannel, SalesEvent,
};
use crate::services::catalog::CatalogLookup;
use crate::services::inventory_reservation::{RefundProcessor, ReservationExecutor, StockResolver};

/// What a reconciliation call did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockAdjustment {
    /// Nothing was sent to the inventory services.
    Skipped { reason: SkipReason },
    Deducted {
        sku: String,
        qty: Decimal,
        stock_id: i32,
    },
    Returned {
        sku: String,
        qty: Decimal,
        processed_qty: Decimal,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotSourceManaged,
    ZeroQuantity,
}

impl StockAdjustment {
    pub fn is_skipped(&self) -> bool {
        matches!(self, StockAdjustment::Skipped { .. })
    }
}

/// Stock reconciliation contract used by the edit workflow.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StockQtyManagement: Send + Sync {
    /// Reserves `qty` (default: the ordered quantity) of the line's SKU.
    async fn deduct_qty_from_stock(
        &self,
        order: &Order,
        item: &OrderItem,
        qty: Option<Decimal>,
    ) -> Result<StockAdjustment, ServiceError>;

    /// Returns `qty` (default: the line's remaining quantity) to the sources.
    async fn return_qty_to_stock(
        &self,
        order: &Order,
        item: &OrderItem,
        qty: Option<Decimal>,
    ) -> Result<StockAdjustment, ServiceError>;
}

/// Reconciler backed by the host's catalog, stock and reservation services.
#[derive(Clone)]
pub struct StockQtyManager {
    catalog: Arc<dyn CatalogLookup>,
    stock_resolver: Arc<dyn StockResolver>,
    reservations: Arc<dyn ReservationExecutor>,
    refunds: Arc<dyn RefundProcessor>,
}

impl StockQtyManager {
    pub fn new(
        catalog: Arc<dyn CatalogLookup>,
        stock_resolver: Arc<dyn StockResolver>,
        reservations: Arc<dyn ReservationExecutor>,
        refunds: Arc<dyn RefundProcessor>,
    ) -> Self {
        Self {
            catalog,
            stock_resolver,
            reservations,
            refunds,
        }
    }

    async fn is_source_managed(&self, product_type: ProductType) -> bool {
        self.catalog
            .is_source_item_management_allowed(product_type.for_source_management())
            .await
    }

    /// Type recorded on the line wins over the catalog; grouped children count as simple.
    async fn line_product_type(&self, sku: &str, item: &OrderItem) -> Result<ProductType, ServiceError> {
        match item.product_type {
            Some(product_type) => Ok(product_type),
            None => self.catalog.product_type_by_sku(sku).await,
        }
    }

    async fn line_sku(&self, item: &OrderItem) -> Result<String, ServiceError> {
        match item.sku.as_deref() {
            Some(sku) if !sku.is_empty() => Ok(sku.to_string()),
            _ => self.catalog.sku_by_product_id(item.product_id).await,
        }
    }
}

fn requested_qty(explicit: Option<Decimal>, default: Decimal) -> Result<Decimal, ServiceError> {
    let qty = explicit.unwrap_or(default);
    if qty.is_sign_negative() && !qty.is_zero() {
        return Err(ServiceError::InvalidInput(format!(
            "Quantity must not be negative, got {}",
            qty
        )));
    }
    Ok(qty)
}

fn skipped(reason: SkipReason) -> StockAdjustment {
    metrics::STOCK_SKIPPED.inc();
    StockAdjustment::Skipped { reason }
}

#[async_trait]
impl StockQtyManagement for StockQtyManager {
    #[instrument(skip(self, order, item), fields(order = %order.increment_id, item_id = %item.id))]
    async fn deduct_qty_from_stock(
        &self,
        order: &Order,
        item: &OrderItem,
        qty: Option<Decimal>,
    ) -> Result<StockAdjustment, ServiceError> {
        let order_id = order.persisted_id()?;

        let sku = self.catalog.sku_by_product_id(item.product_id).await?;
        let product_type = self.catalog.product_type_by_sku(&sku).await?;
        if !self.is_source_managed(product_type).await {
            debug!(sku = %sku, product_type = %product_type, "product is not source-managed");
            return Ok(skipped(SkipReason::NotSourceManaged));
        }

        let qty = requested_qty(qty, item.qty_ordered)?;
        if qty.is_zero() {
            return Ok(skipped(SkipReason::ZeroQuantity));
        }

        let website_code = self.stock_resolver.website_code(order.website_id).await?;
        let stock_id = self
            .stock_resolver
            .stock_id_by_website(order.website_id)
            .await?;

        let mut items_by_sku = BTreeMap::new();
        items_by_sku.insert(sku.clone(), qty);
        self.reservations
            .check_items_quantity(&items_by_sku, stock_id)
            .await?;

        let items_to_sell = [ItemToSell {
            sku: sku.clone(),
            qty: -qty,
        }];
        let sales_event = SalesEvent::order_placed(order_id.to_string(), order.increment_id.clone());
        let sales_channel = SalesChannel::website(website_code);
        self.reservations
            .place_reservations_for_sales_event(&items_to_sell, &sales_channel, &sales_event)
            .await?;

        metrics::STOCK_DEDUCTIONS.inc();
        info!(sku = %sku, qty = %qty, stock_id, "deducted quantity from stock");
        Ok(StockAdjustment::Deducted { sku, qty, stock_id })
    }

    #[instrument(skip(self, order, item), fields(order = %order.increment_id, item_id = %item.id))]
    async fn return_qty_to_stock(
        &self,
        order: &Order,
        item: &OrderItem,
        qty: Option<Decimal>,
    ) -> Result<StockAdjustment, ServiceError> {
        order.persisted_id()?;

        let sku = self.line_sku(item).await?;
        let product_type = self.line_product_type(&sku, item).await?;
        if !self.is_source_managed(product_type).await {
            debug!(sku = %sku, product_type = %product_type, "product is not source-managed");
            return Ok(skipped(SkipReason::NotSourceManaged));
        }

        let qty_to_return = requested_qty(qty, item.qty_to_ship())?;
        if qty_to_return.is_zero() {
            return Ok(skipped(SkipReason::ZeroQuantity));
        }
        let processed_qty =
            (item.qty_invoiced - item.qty_refunded + qty_to_return).max(Decimal::ZERO);

        let items_to_refund = [ItemToRefund {
            sku: sku.clone(),
            qty: qty_to_return,
            processed_qty,
        }];
        self.refunds
            .deduct_source_item_quantity_on_refund(order, &items_to_refund, &[item.id])
            .await?;

        metrics::STOCK_RETURNS.inc();
        info!(sku = %sku, qty = %qty_to_return, processed_qty = %processed_qty, "returned quantity to stock");
        Ok(StockAdjustment::Returned {
            sku,
            qty: qty_to_return,
            processed_qty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SalesEventType;
    use crate::services::catalog::MockCatalogLookup;
    use crate::services::inventory_reservation::{
        MockRefundProcessor, MockReservationExecutor, MockStockResolver,
    };
    use assert_matches::assert_matches;
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    struct Mocks {
        catalog: MockCatalogLookup,
        resolver: MockStockResolver,
        reservations: MockReservationExecutor,
        refunds: MockRefundProcessor,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                catalog: MockCatalogLookup::new(),
                resolver: MockStockResolver::new(),
                reservations: MockReservationExecutor::new(),
                refunds: MockRefundProcessor::new(),
            }
        }

        fn catalog_knows(mut self, sku: &'static str, product_type: ProductType) -> Self {
            self.catalog
                .expect_sku_by_product_id()
                .returning(move |_| Ok(sku.to_string()));
            self.catalog
                .expect_product_type_by_sku()
                .returning(move |_| Ok(product_type));
            self.catalog
                .expect_is_source_item_management_allowed()
                .returning(|product_type| {
                    matches!(
                        product_type,
                        ProductType::Simple | ProductType::Virtual | ProductType::Downloadable
                    )
                });
            self
        }

        fn website(mut self) -> Self {
            self.resolver
                .expect_website_code()
                .with(eq(1))
                .returning(|_| Ok("base".to_string()));
            self.resolver
                .expect_stock_id_by_website()
                .with(eq(1))
                .returning(|_| Ok(7));
            self
        }

        fn build(self) -> StockQtyManager {
            StockQtyManager::new(
                Arc::new(self.catalog),
                Arc::new(self.resolver),
                Arc::new(self.reservations),
                Arc::new(self.refunds),
            )
        }
    }

    fn persisted_order() -> Order {
        let mut order = Order::new("000000042", 1);
        order.id = Some(Uuid::new_v4());
        order
    }

    fn line(qty: Decimal) -> OrderItem {
        OrderItem::new(Uuid::new_v4(), "MUG-01", qty)
    }

    #[tokio::test]
    async fn deduct_rejects_unpersisted_order() {
        let manager = Mocks::new().build();
        let err = manager
            .deduct_qty_from_stock(&Order::new("000000001", 1), &line(dec!(1)), None)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InvalidInput(_));
    }

    #[tokio::test]
    async fn return_rejects_unpersisted_order() {
        let manager = Mocks::new().build();
        let err = manager
            .return_qty_to_stock(&Order::new("000000001", 1), &line(dec!(1)), None)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InvalidInput(_));
    }

    #[tokio::test]
    async fn deduct_places_single_sale_reservation() {
        let order = persisted_order();
        let expected_order_id = order.id.unwrap().to_string();
        let mut mocks = Mocks::new()
            .catalog_knows("MUG-01", ProductType::Simple)
            .website();
        mocks
            .reservations
            .expect_check_items_quantity()
            .withf(|items, stock_id| {
                *stock_id == 7 && items.get("MUG-01") == Some(&dec!(3)) && items.len() == 1
            })
            .times(1)
            .returning(|_, _| Ok(()));
        mocks
            .reservations
            .expect_place_reservations_for_sales_event()
            .withf(move |items, channel, event| {
                items.len() == 1
                    && items[0].sku == "MUG-01"
                    && items[0].qty == dec!(-3)
                    && channel.code == "base"
                    && event.event_type == SalesEventType::OrderPlaced
                    && event.object_id == expected_order_id
                    && event.object_increment_id == "000000042"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let adjustment = mocks
            .build()
            .deduct_qty_from_stock(&order, &line(dec!(3)), None)
            .await
            .unwrap();
        assert_eq!(
            adjustment,
            StockAdjustment::Deducted {
                sku: "MUG-01".into(),
                qty: dec!(3),
                stock_id: 7
            }
        );
    }

    #[tokio::test]
    async fn deduct_uses_explicit_qty() {
        let mut mocks = Mocks::new()
            .catalog_knows("MUG-01", ProductType::Simple)
            .website();
        mocks
            .reservations
            .expect_check_items_quantity()
            .returning(|_, _| Ok(()));
        mocks
            .reservations
            .expect_place_reservations_for_sales_event()
            .withf(|items, _, _| items[0].qty == dec!(-2))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let adjustment = mocks
            .build()
            .deduct_qty_from_stock(&persisted_order(), &line(dec!(10)), Some(dec!(2)))
            .await
            .unwrap();
        assert_matches!(adjustment, StockAdjustment::Deducted { qty, .. } if qty == dec!(2));
    }

    #[tokio::test]
    async fn deduct_skips_products_without_source_management() {
        let mut mocks = Mocks::new().catalog_knows("KIT-01", ProductType::Bundle);
        mocks.reservations.expect_check_items_quantity().never();
        mocks
            .reservations
            .expect_place_reservations_for_sales_event()
            .never();

        let adjustment = mocks
            .build()
            .deduct_qty_from_stock(&persisted_order(), &line(dec!(1)), None)
            .await
            .unwrap();
        assert_eq!(
            adjustment,
            StockAdjustment::Skipped {
                reason: SkipReason::NotSourceManaged
            }
        );
    }

    #[tokio::test]
    async fn deduct_reports_insufficient_stock_without_reserving() {
        let mut mocks = Mocks::new()
            .catalog_knows("MUG-01", ProductType::Simple)
            .website();
        mocks
            .reservations
            .expect_check_items_quantity()
            .returning(|_, _| Err(ServiceError::InsufficientStock("MUG-01".into())));
        mocks
            .reservations
            .expect_place_reservations_for_sales_event()
            .never();

        let err = mocks
            .build()
            .deduct_qty_from_stock(&persisted_order(), &line(dec!(99)), None)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InsufficientStock(_));
    }

    #[tokio::test]
    async fn deduct_rejects_negative_qty() {
        let mocks = Mocks::new().catalog_knows("MUG-01", ProductType::Simple);
        let err = mocks
            .build()
            .deduct_qty_from_stock(&persisted_order(), &line(dec!(1)), Some(dec!(-1)))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InvalidInput(_));
    }

    #[tokio::test]
    async fn deduct_propagates_unknown_website() {
        let mut mocks = Mocks::new().catalog_knows("MUG-01", ProductType::Simple);
        mocks
            .resolver
            .expect_website_code()
            .returning(|id| Err(ServiceError::NotFound(format!("Website {}", id))));
        let err = mocks
            .build()
            .deduct_qty_from_stock(&persisted_order(), &line(dec!(1)), None)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }

    #[tokio::test]
    async fn return_defaults_to_remaining_qty_and_tracks_processed_qty() {
        let mut mocks = Mocks::new().catalog_knows("MUG-01", ProductType::Simple);
        let mut item = line(dec!(5));
        item.qty_refunded = dec!(1);
        item.qty_invoiced = dec!(3);
        let item_id = item.id;
        mocks
            .refunds
            .expect_deduct_source_item_quantity_on_refund()
            .withf(move |_, items, ids| {
                items.len() == 1
                    && items[0].sku == "MUG-01"
                    && items[0].qty == dec!(4)
                    && items[0].processed_qty == dec!(6)
                    && ids.len() == 1
                    && ids[0] == item_id
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let adjustment = mocks
            .build()
            .return_qty_to_stock(&persisted_order(), &item, None)
            .await
            .unwrap();
        assert_eq!(
            adjustment,
            StockAdjustment::Returned {
                sku: "MUG-01".into(),
                qty: dec!(4),
                processed_qty: dec!(6)
            }
        );
    }

    #[tokio::test]
    async fn return_treats_grouped_lines_as_simple() {
        let mut mocks = Mocks::new().catalog_knows("MUG-01", ProductType::Simple);
        mocks
            .refunds
            .expect_deduct_source_item_quantity_on_refund()
            .times(1)
            .returning(|_, _, _| Ok(()));
        let item = line(dec!(2)).with_product_type(ProductType::Grouped);

        let adjustment = mocks
            .build()
            .return_qty_to_stock(&persisted_order(), &item, Some(dec!(1)))
            .await
            .unwrap();
        assert!(!adjustment.is_skipped());
    }

    #[tokio::test]
    async fn return_skips_configurable_lines() {
        let mut mocks = Mocks::new().catalog_knows("MUG-01", ProductType::Simple);
        mocks
            .refunds
            .expect_deduct_source_item_quantity_on_refund()
            .never();
        let item = line(dec!(2)).with_product_type(ProductType::Configurable);

        let adjustment = mocks
            .build()
            .return_qty_to_stock(&persisted_order(), &item, None)
            .await
            .unwrap();
        assert!(adjustment.is_skipped());
    }

    #[tokio::test]
    async fn return_of_zero_qty_is_a_no_op() {
        let mut mocks = Mocks::new().catalog_knows("MUG-01", ProductType::Simple);
        mocks
            .refunds
            .expect_deduct_source_item_quantity_on_refund()
            .never();
        let mut item = line(dec!(2));
        item.qty_canceled = dec!(2);

        let adjustment = mocks
            .build()
            .return_qty_to_stock(&persisted_order(), &item, None)
            .await
            .unwrap();
        assert_eq!(
            adjustment,
            StockAdjustment::Skipped {
                reason: SkipReason::ZeroQuantity
            }
        );
    }

    #[tokio::test]
    async fn refund_failures_propagate() {
        let mut mocks = Mocks::new().catalog_knows("MUG-01", ProductType::Simple);
        mocks
            .refunds
            .expect_deduct_source_item_quantity_on_refund()
            .returning(|_, _, _| Err(ServiceError::ExternalServiceError("down".into())));

        let err = mocks
            .build()
            .return_qty_to_stock(&persisted_order(), &line(dec!(1)), None)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ExternalServiceError(_));
    }
}
