use async_trait::async_trait;
use futures::future::BoxFuture;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use strum::{AsRefStr, Display, EnumIter};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::metrics;
use crate::models::{Order, OrderItem};
use crate::services::stock_qty::StockQtyManagement;

pub mod handlers;

pub use handlers::{AddNewProductHandler, RemoveItemQtyHandler};

/// Events raised while an order is being edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEditEvent {
    /// A line was added or its quantity increased. `qty` is the increase; `None`
    /// stands for the whole ordered quantity of a new line.
    ItemAdded {
        order: Order,
        item: OrderItem,
        qty: Option<Decimal>,
    },
    /// A line was removed or its quantity decreased by `qty_to_remove`.
    ItemQtyRemoved {
        order: Order,
        item: OrderItem,
        qty_to_remove: Decimal,
    },
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderEditEventKind {
    ItemAdded,
    ItemQtyRemoved,
}

impl OrderEditEvent {
    pub fn kind(&self) -> OrderEditEventKind {
        match self {
            OrderEditEvent::ItemAdded { .. } => OrderEditEventKind::ItemAdded,
            OrderEditEvent::ItemQtyRemoved { .. } => OrderEditEventKind::ItemQtyRemoved,
        }
    }

    pub fn order(&self) -> &Order {
        match self {
            OrderEditEvent::ItemAdded { order, .. } | OrderEditEvent::ItemQtyRemoved { order, .. } => {
                order
            }
        }
    }

    pub fn item(&self) -> &OrderItem {
        match self {
            OrderEditEvent::ItemAdded { item, .. } | OrderEditEvent::ItemQtyRemoved { item, .. } => {
                item
            }
        }
    }
}

/// Reacts to order edit events.
#[async_trait]
pub trait OrderEditEventHandler: Send + Sync {
    async fn handle(&self, event: &OrderEditEvent) -> Result<(), ServiceError>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[async_trait]
impl<F> OrderEditEventHandler for F
where
    F: Fn(OrderEditEvent) -> BoxFuture<'static, Result<(), ServiceError>> + Send + Sync,
{
    async fn handle(&self, event: &OrderEditEvent) -> Result<(), ServiceError> {
        (self)(event.clone()).await
    }

    fn name(&self) -> &str {
        "closure"
    }
}

/// A handler failure absorbed by the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerFailure {
    pub handler: String,
    pub error: String,
    pub error_code: String,
}

/// Outcome of one [`OrderEditEventBus::publish`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReport {
    pub event: OrderEditEventKind,
    pub order_increment_id: String,
    pub item_id: Uuid,
    pub handled: usize,
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Delivers edit events to the handlers subscribed to their kind.
///
/// Handlers run one after another in subscription order. A failing handler never fails
/// the publisher: the error is logged, counted and recorded in the [`DispatchReport`],
/// and the remaining handlers still run.
#[derive(Clone, Default)]
pub struct OrderEditEventBus {
    handlers: HashMap<OrderEditEventKind, Vec<Arc<dyn OrderEditEventHandler>>>,
}

impl OrderEditEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus with the stock reconciliation handlers subscribed.
    pub fn with_stock_handlers(stock: Arc<dyn StockQtyManagement>) -> Self {
        let mut bus = Self::new();
        bus.subscribe(
            OrderEditEventKind::ItemAdded,
            Arc::new(AddNewProductHandler::new(stock.clone())),
        )
        .subscribe(
            OrderEditEventKind::ItemQtyRemoved,
            Arc::new(RemoveItemQtyHandler::new(stock)),
        );
        bus
    }

    pub fn subscribe(
        &mut self,
        kind: OrderEditEventKind,
        handler: Arc<dyn OrderEditEventHandler>,
    ) -> &mut Self {
        debug!(event = %kind, handler = handler.name(), "subscribing handler");
        self.handlers.entry(kind).or_default().push(handler);
        self
    }

    pub fn handler_count(&self, kind: OrderEditEventKind) -> usize {
        self.handlers.get(&kind).map(Vec::len).unwrap_or(0)
    }

    pub async fn publish(&self, event: &OrderEditEvent) -> DispatchReport {
        let kind = event.kind();
        let order = event.order();
        let item = event.item();
        let mut report = DispatchReport {
            event: kind,
            order_increment_id: order.increment_id.clone(),
            item_id: item.id,
            handled: 0,
            failures: Vec::new(),
        };

        for handler in self.handlers.get(&kind).into_iter().flatten() {
            match handler.handle(event).await {
                Ok(()) => report.handled += 1,
                Err(e) => {
                    error!(
                        event = %kind,
                        handler = handler.name(),
                        order = %order.increment_id,
                        item_id = %item.id,
                        sku = item.sku.as_deref().unwrap_or_default(),
                        error_code = e.error_code(),
                        "Order edit handler failed: {}",
                        e
                    );
                    metrics::DISPATCH_FAILURES
                        .with_label_values(&[kind.as_ref()])
                        .inc();
                    report.failures.push(HandlerFailure {
                        handler: handler.name().to_string(),
                        error: e.to_string(),
                        error_code: e.error_code().to_string(),
                    });
                }
            }
        }

        info!(
            event = %kind,
            order = %order.increment_id,
            handled = report.handled,
            failed = report.failures.len(),
            "order edit event dispatched"
        );
        report
    }
}
