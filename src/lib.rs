//! Order Edit Inventory
//!
//! Keeps stock reservations, source quantities and shipments consistent while an
//! already-placed order is edited.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod models;
pub mod repositories;
pub mod scenario;
pub mod services;

pub use config::{AppConfig, UpdateMode};
pub use errors::ServiceError;
pub use events::{DispatchReport, OrderEditEvent, OrderEditEventBus, OrderEditEventKind};
pub use services::{
    InMemoryAdapters, OrderEditRequest, OrderEditService, ServiceFactory, ShipmentManager,
    StockQtyManager,
};
