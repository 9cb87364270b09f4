//! Checkout error types.

use common::{OrderId, TransactionId};
use thiserror::Error;

use crate::state::{AbortReason, CheckoutState, PartialReason};

/// Errors returned by remote collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The addressed entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The collaborator could not be reached or failed internally.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The collaborator refused the request (declined card, illegal transition).
    #[error("rejected: {0}")]
    Rejected(String),

    /// The call did not finish within its time limit.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },
}

impl ServiceError {
    /// Returns true if repeating the call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::Unavailable(_) | ServiceError::Timeout { .. }
        )
    }
}

/// Problems with the request itself. Raised before any side effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("user id must be non-zero")]
    InvalidUserId,

    #[error("invalid email address: {0:?}")]
    InvalidEmail(String),

    #[error("invalid payment card: {0}")]
    InvalidCard(&'static str),

    /// A line cost or the order total does not fit in `Money`.
    #[error("order amount out of range")]
    AmountOverflow,
}

/// Errors surfaced by a checkout run.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The request or cart was unusable; nothing was changed.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A collaborator failed before any money-moving step.
    #[error("step '{step}' failed: {source}")]
    Upstream {
        step: &'static str,
        source: ServiceError,
    },

    /// The charge was declined or errored; the order was cancelled in the ledger.
    #[error("payment for order {order_id} failed: {reason}")]
    PaymentFailure {
        order_id: OrderId,
        reason: ServiceError,
    },

    /// The payment was captured but the order could not be marked paid.
    ///
    /// Needs manual reconciliation of `order_id` against `transaction_id`.
    #[error(
        "order {order_id} charged by transaction {transaction_id} but not marked paid after {attempts} attempts: {reason}"
    )]
    PartialFailure {
        order_id: OrderId,
        transaction_id: TransactionId,
        attempts: u32,
        reason: ServiceError,
    },

    /// No charge attempt was acknowledged and at least one timed out.
    ///
    /// The money may have been captured. The order is left placed and needs
    /// reconciliation against the payment processor by `order_id`.
    #[error("payment for order {order_id} unconfirmed after {attempts} attempts: {reason}")]
    PaymentUnconfirmed {
        order_id: OrderId,
        attempts: u32,
        reason: ServiceError,
    },

    /// The caller cancelled or the deadline passed before the charge was issued.
    #[error("checkout cancelled before '{step}'")]
    Cancelled {
        step: &'static str,
        order_id: Option<OrderId>,
    },
}

impl CheckoutError {
    /// Returns a short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutError::Validation(_) => "validation",
            CheckoutError::Upstream { .. } => "upstream",
            CheckoutError::PaymentFailure { .. } => "payment_failure",
            CheckoutError::PartialFailure { .. } => "partial_failure",
            CheckoutError::PaymentUnconfirmed { .. } => "payment_unconfirmed",
            CheckoutError::Cancelled { .. } => "cancelled",
        }
    }

    /// Returns the terminal run state this error ends in.
    pub fn terminal_state(&self) -> CheckoutState {
        match self {
            CheckoutError::Validation(ValidationError::EmptyCart) => {
                CheckoutState::Aborted(AbortReason::EmptyCart)
            }
            CheckoutError::Validation(_) => CheckoutState::Aborted(AbortReason::InvalidRequest),
            CheckoutError::Upstream { .. } => CheckoutState::Aborted(AbortReason::UpstreamFailure),
            CheckoutError::Cancelled { order_id: None, .. } => {
                CheckoutState::Aborted(AbortReason::Cancelled)
            }
            CheckoutError::Cancelled {
                order_id: Some(_), ..
            } => CheckoutState::PartiallyCompleted(PartialReason::Cancelled),
            CheckoutError::PaymentFailure { .. } => {
                CheckoutState::PartiallyCompleted(PartialReason::PaymentFailure)
            }
            CheckoutError::PartialFailure { .. } => {
                CheckoutState::PartiallyCompleted(PartialReason::BookkeepingFailure)
            }
            CheckoutError::PaymentUnconfirmed { .. } => {
                CheckoutState::PartiallyCompleted(PartialReason::PaymentUnconfirmed)
            }
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
