//! Remote collaborator traits and in-memory implementations.

pub mod bus;
pub mod cart;
pub mod catalog;
pub mod ledger;
pub mod payment;

pub use bus::{InMemoryNotificationBus, MessageHeaders, NotificationBus, PublishedMessage};
pub use cart::{Cart, CartItem, CartService, InMemoryCartService};
pub use catalog::{CatalogService, InMemoryCatalogService, Product};
pub use ledger::{CancellationReason, InMemoryOrderLedger, Order, OrderLedger, OrderStatus};
pub use payment::{ChargeRequest, InMemoryPaymentService, PaymentService, Transaction};
