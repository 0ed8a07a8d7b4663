pub mod order;
pub mod order_item;
pub mod payment;
pub mod shipment;
pub mod stock;

pub use order::{Order, OrderEditDiff, OrderState};
pub use order_item::{OrderItem, ProductType};
pub use payment::Payment;
pub use shipment::{Shipment, ShipmentItem, DEFAULT_SOURCE_CODE};
pub use stock::{
    ItemToRefund, ItemToSell, SalesChannel, SalesChannelType, SalesEvent, SalesEventObjectType,
    SalesEventType,
};
