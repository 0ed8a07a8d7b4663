/*!
 * # Metrics Module
 *
 * Prometheus counters for the order-edit reconciliation paths. All counters live in a
 * crate-local registry so embedding hosts can merge them into their own exposition.
 */

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref STOCK_DEDUCTIONS: IntCounter = register_counter(
        "order_edit_stock_deductions_total",
        "Reservations placed for added or increased order items"
    );
    pub static ref STOCK_RETURNS: IntCounter = register_counter(
        "order_edit_stock_returns_total",
        "Quantities returned to sources for removed or decreased order items"
    );
    pub static ref STOCK_SKIPPED: IntCounter = register_counter(
        "order_edit_stock_skipped_total",
        "Reconciliations skipped because the product is not source-managed"
    );
    pub static ref DISPATCH_FAILURES: IntCounterVec = {
        let counter = IntCounterVec::new(
            Opts::new(
                "order_edit_dispatch_failures_total",
                "Edit event handler failures absorbed by the dispatcher",
            ),
            &["event"],
        )
        .expect("metric can be created");
        REGISTRY
            .register(Box::new(counter.clone()))
            .expect("metric can be registered");
        counter
    };
    pub static ref SHIPMENTS_REMOVED: IntCounter = register_counter(
        "order_edit_shipments_removed_total",
        "Shipments deleted while synchronizing edited orders"
    );
    pub static ref SHIPMENTS_CREATED: IntCounter = register_counter(
        "order_edit_shipments_created_total",
        "Shipments registered while synchronizing edited orders"
    );
}

fn register_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("metric can be created");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric can be registered");
    counter
}

/// Renders every counter in the Prometheus text format.
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
