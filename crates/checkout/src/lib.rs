//! Checkout orchestration.
//!
//! This crate turns a user's cart into a paid order by coordinating five
//! remote collaborators: the cart store, the catalog, the order ledger, the
//! payment processor and the notification bus.
//!
//! A checkout run follows these steps:
//! 1. Fetch the cart
//! 2. Price every line against the catalog, dropping unknown products
//! 3. Place the order
//! 4. Charge the payment (the cart is cleared once this succeeds)
//! 5. Publish the confirmation (best effort)
//! 6. Mark the order paid, retrying transient failures
//!
//! A failed charge cancels the placed order. A captured payment that cannot
//! be recorded in the ledger is reported as a partial failure carrying both
//! ids for reconciliation.

pub mod assembler;
pub mod checkout_flow;
pub mod compensation;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod notification;
pub mod orchestrator;
pub mod pricing;
pub mod request;
pub mod retry;
pub mod run;
pub mod services;
pub mod state;

pub use assembler::{OrderDraft, ShippingAddress, assemble};
pub use compensation::{CompensationManager, CompensationOutcome};
pub use config::CheckoutConfig;
pub use context::{CancelHandle, CancelOnDrop, CheckoutContext, TraceContext};
pub use error::{CheckoutError, ServiceError, ValidationError};
pub use events::CheckoutEvent;
pub use notification::{ConfirmationEmail, NotificationPublisher, PublishOutcome};
pub use orchestrator::{CheckoutOrchestrator, CheckoutOutcome, CheckoutReceipt};
pub use pricing::{PricedCart, PricedItem, PricingCalculator};
pub use request::{Address, CheckoutRequest, CreditCard};
pub use retry::{RetryExhausted, RetryPolicy};
pub use run::{CheckoutRun, SideEffect};
pub use services::{
    Cart, CartItem, CartService, CancellationReason, CatalogService, ChargeRequest,
    InMemoryCartService, InMemoryCatalogService, InMemoryNotificationBus, InMemoryOrderLedger,
    InMemoryPaymentService, MessageHeaders, NotificationBus, Order, OrderLedger, OrderStatus,
    PaymentService, Product, PublishedMessage, Transaction,
};
pub use state::{AbortReason, CheckoutState, PartialReason};
