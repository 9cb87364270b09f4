//! Events recorded by a checkout run.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, TransactionId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::{AbortReason, PartialReason};

/// Facts observed while a checkout run progresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CheckoutEvent {
    RunStarted(RunStartedData),
    CartFetched { item_count: usize },
    Priced(PricedData),
    OrderPlaced { order_id: OrderId },
    /// The cart-clear lane was handed off.
    CartClearDispatched,
    CartCleared,
    /// The run finished before the cart-clear lane; it keeps running.
    CartClearDetached,
    /// The cart was not cleared; non-critical.
    CartNotCleared { reason: String },
    PaymentCharged { transaction_id: TransactionId },
    PaymentFailed { error: String },
    /// No attempt acknowledged the charge and at least one timed out.
    PaymentUnconfirmed { attempts: u32, error: String },
    NotificationPublished,
    /// The confirmation was not accepted by the bus; non-critical.
    NotificationFailed { error: String },
    OrderMarkedPaid { attempts: u32 },
    MarkPaidFailed { attempts: u32, error: String },
    OrderCompensated,
    CompensationFailed { error: String },
    RunCompleted { completed_at: DateTime<Utc> },
    RunAborted(RunAbortedData),
    RunPartiallyCompleted(RunPartiallyCompletedData),
}

impl CheckoutEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            CheckoutEvent::RunStarted(_) => "RunStarted",
            CheckoutEvent::CartFetched { .. } => "CartFetched",
            CheckoutEvent::Priced(_) => "Priced",
            CheckoutEvent::OrderPlaced { .. } => "OrderPlaced",
            CheckoutEvent::CartClearDispatched => "CartClearDispatched",
            CheckoutEvent::CartCleared => "CartCleared",
            CheckoutEvent::CartClearDetached => "CartClearDetached",
            CheckoutEvent::CartNotCleared { .. } => "CartNotCleared",
            CheckoutEvent::PaymentCharged { .. } => "PaymentCharged",
            CheckoutEvent::PaymentFailed { .. } => "PaymentFailed",
            CheckoutEvent::PaymentUnconfirmed { .. } => "PaymentUnconfirmed",
            CheckoutEvent::NotificationPublished => "NotificationPublished",
            CheckoutEvent::NotificationFailed { .. } => "NotificationFailed",
            CheckoutEvent::OrderMarkedPaid { .. } => "OrderMarkedPaid",
            CheckoutEvent::MarkPaidFailed { .. } => "MarkPaidFailed",
            CheckoutEvent::OrderCompensated => "OrderCompensated",
            CheckoutEvent::CompensationFailed { .. } => "CompensationFailed",
            CheckoutEvent::RunCompleted { .. } => "RunCompleted",
            CheckoutEvent::RunAborted(_) => "RunAborted",
            CheckoutEvent::RunPartiallyCompleted(_) => "RunPartiallyCompleted",
        }
    }
}

/// Data for RunStarted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStartedData {
    pub run_id: Uuid,
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
}

/// Data for Priced event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedData {
    pub priced_items: usize,
    pub dropped_items: usize,
    pub total: Money,
}

/// Data for RunAborted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAbortedData {
    pub reason: AbortReason,
    pub detail: String,
    pub finished_at: DateTime<Utc>,
}

/// Data for RunPartiallyCompleted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPartiallyCompletedData {
    pub reason: PartialReason,
    pub detail: String,
    pub finished_at: DateTime<Utc>,
}

// Convenience constructors
impl CheckoutEvent {
    pub fn run_started(run_id: Uuid, user_id: UserId) -> Self {
        CheckoutEvent::RunStarted(RunStartedData {
            run_id,
            user_id,
            started_at: Utc::now(),
        })
    }

    pub fn priced(priced_items: usize, dropped_items: usize, total: Money) -> Self {
        CheckoutEvent::Priced(PricedData {
            priced_items,
            dropped_items,
            total,
        })
    }

    pub fn run_completed() -> Self {
        CheckoutEvent::RunCompleted {
            completed_at: Utc::now(),
        }
    }

    pub fn run_aborted(reason: AbortReason, detail: impl Into<String>) -> Self {
        CheckoutEvent::RunAborted(RunAbortedData {
            reason,
            detail: detail.into(),
            finished_at: Utc::now(),
        })
    }

    pub fn run_partially_completed(reason: PartialReason, detail: impl Into<String>) -> Self {
        CheckoutEvent::RunPartiallyCompleted(RunPartiallyCompletedData {
            reason,
            detail: detail.into(),
            finished_at: Utc::now(),
        })
    }
}
