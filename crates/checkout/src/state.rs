//! Checkout run state machine.

use serde::{Deserialize, Serialize};

/// Why a run stopped before any order existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbortReason {
    /// The cart was missing, empty, or held nothing purchasable.
    EmptyCart,
    /// The request failed validation.
    InvalidRequest,
    /// A collaborator was unreachable or returned an error.
    UpstreamFailure,
    /// The caller cancelled or the deadline passed.
    Cancelled,
}

impl AbortReason {
    /// Returns the label used in metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            AbortReason::EmptyCart => "empty_cart",
            AbortReason::InvalidRequest => "invalid_request",
            AbortReason::UpstreamFailure => "upstream_failure",
            AbortReason::Cancelled => "cancelled",
        }
    }
}

/// Why a run stopped after its order was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartialReason {
    /// The charge was declined or errored; the order was compensated.
    PaymentFailure,
    /// Money moved but the order could not be marked paid.
    BookkeepingFailure,
    /// The charge timed out and retries did not settle whether it captured.
    PaymentUnconfirmed,
    /// The caller cancelled before the charge; the order was compensated.
    Cancelled,
}

impl PartialReason {
    /// Returns the label used in metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            PartialReason::PaymentFailure => "payment_failure",
            PartialReason::BookkeepingFailure => "bookkeeping_failure",
            PartialReason::PaymentUnconfirmed => "payment_unconfirmed",
            PartialReason::Cancelled => "cancelled",
        }
    }
}

/// The state of a checkout run.
///
/// State transitions:
/// ```text
/// Start ──► CartFetched ──► Priced ──► OrderPlaced ──► CartCleared ──► PaymentCharged
///   │            │            │             │               │                │
///   └────────────┴────────────┴──► Aborted  └───────────────┴──► PartiallyCompleted
///
/// PaymentCharged ──► NotificationPublished ──► OrderMarkedPaid ──► Completed
///        │                    │
///        └────────────────────┴──► PartiallyCompleted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckoutState {
    #[default]
    Start,
    CartFetched,
    Priced,
    OrderPlaced,
    /// The cart-clear lane was dispatched.
    CartCleared,
    PaymentCharged,
    /// Publishing was attempted; the outcome is best-effort.
    NotificationPublished,
    OrderMarkedPaid,
    /// Terminal success.
    Completed,
    /// Terminal failure with no durable effects.
    Aborted(AbortReason),
    /// Terminal failure after the order was placed.
    PartiallyCompleted(PartialReason),
}

impl CheckoutState {
    /// Returns the next state on the success path, if any.
    pub fn next(&self) -> Option<CheckoutState> {
        use CheckoutState::*;
        match self {
            Start => Some(CartFetched),
            CartFetched => Some(Priced),
            Priced => Some(OrderPlaced),
            OrderPlaced => Some(CartCleared),
            CartCleared => Some(PaymentCharged),
            PaymentCharged => Some(NotificationPublished),
            NotificationPublished => Some(OrderMarkedPaid),
            OrderMarkedPaid => Some(Completed),
            Completed | Aborted(_) | PartiallyCompleted(_) => None,
        }
    }

    /// Returns true if `to` is a legal transition from this state.
    pub fn can_transition_to(&self, to: CheckoutState) -> bool {
        match to {
            CheckoutState::Aborted(_) => self.can_abort(),
            CheckoutState::PartiallyCompleted(_) => self.has_placed_order() && !self.is_terminal(),
            other => self.next() == Some(other),
        }
    }

    /// Returns true if the run can still end without durable effects.
    pub fn can_abort(&self) -> bool {
        matches!(
            self,
            CheckoutState::Start | CheckoutState::CartFetched | CheckoutState::Priced
        )
    }

    /// Returns true once an order exists in the ledger.
    pub fn has_placed_order(&self) -> bool {
        matches!(
            self,
            CheckoutState::OrderPlaced
                | CheckoutState::CartCleared
                | CheckoutState::PaymentCharged
                | CheckoutState::NotificationPublished
                | CheckoutState::OrderMarkedPaid
                | CheckoutState::Completed
                | CheckoutState::PartiallyCompleted(_)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutState::Completed
                | CheckoutState::Aborted(_)
                | CheckoutState::PartiallyCompleted(_)
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Start => "Start",
            CheckoutState::CartFetched => "CartFetched",
            CheckoutState::Priced => "Priced",
            CheckoutState::OrderPlaced => "OrderPlaced",
            CheckoutState::CartCleared => "CartCleared",
            CheckoutState::PaymentCharged => "PaymentCharged",
            CheckoutState::NotificationPublished => "NotificationPublished",
            CheckoutState::OrderMarkedPaid => "OrderMarkedPaid",
            CheckoutState::Completed => "Completed",
            CheckoutState::Aborted(_) => "Aborted",
            CheckoutState::PartiallyCompleted(_) => "PartiallyCompleted",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckoutState::Aborted(reason) => write!(f, "Aborted({})", reason.as_str()),
            CheckoutState::PartiallyCompleted(reason) => {
                write!(f, "PartiallyCompleted({})", reason.as_str())
            }
            other => write!(f, "{}", other.as_str()),
        }
    }
}
