//! Order ledger trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, TransactionId, UserId};
use serde::{Deserialize, Serialize};

use crate::assembler::OrderDraft;
use crate::error::ServiceError;

/// Lifecycle status of a ledger order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created by checkout, awaiting payment.
    Placed,
    /// Payment captured and recorded (terminal state).
    Paid,
    /// The charge failed; the order will never be paid (terminal state).
    PaymentFailed,
    /// Abandoned before payment (terminal state).
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Placed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "Placed",
            OrderStatus::Paid => "Paid",
            OrderStatus::PaymentFailed => "PaymentFailed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an order is being cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancellationReason {
    PaymentFailed,
    CheckoutCancelled,
}

impl CancellationReason {
    /// The status an order ends in for this reason.
    pub fn terminal_status(&self) -> OrderStatus {
        match self {
            CancellationReason::PaymentFailed => OrderStatus::PaymentFailed,
            CancellationReason::CheckoutCancelled => OrderStatus::Cancelled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationReason::PaymentFailed => "payment_failed",
            CancellationReason::CheckoutCancelled => "checkout_cancelled",
        }
    }
}

/// An order as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub draft: OrderDraft,
    pub status: OrderStatus,
    pub transaction_id: Option<TransactionId>,
    pub cancellation: Option<CancellationReason>,
    pub created_at: DateTime<Utc>,
}

/// Trait for order ledger operations.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Stores a new order and returns its id.
    async fn place_order(&self, draft: OrderDraft) -> Result<OrderId, ServiceError>;

    /// Records the payment of an order. Repeating with the same transaction is a no-op.
    async fn mark_order_paid(
        &self,
        user_id: UserId,
        order_id: &OrderId,
        transaction_id: &TransactionId,
    ) -> Result<(), ServiceError>;

    /// Moves an unpaid order to a terminal failed status. Repeating is a no-op.
    ///
    /// Fails with [`ServiceError::NotFound`] for an unknown order.
    async fn cancel_order(
        &self,
        order_id: &OrderId,
        reason: CancellationReason,
    ) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryLedgerState {
    orders: HashMap<OrderId, Order>,
    next_id: u32,
    fail_on_place: bool,
    fail_on_cancel: bool,
    mark_paid_failures: u32,
    mark_paid_calls: usize,
    cancel_calls: usize,
}

/// In-memory order ledger for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderLedger {
    state: Arc<RwLock<InMemoryLedgerState>>,
}

impl InMemoryOrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the ledger to reject new orders.
    pub fn set_fail_on_place(&self, fail: bool) {
        self.state.write().unwrap().fail_on_place = fail;
    }

    /// Configures the ledger to fail cancellations.
    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.state.write().unwrap().fail_on_cancel = fail;
    }

    /// Makes the next `times` mark-paid calls fail as unavailable.
    pub fn fail_mark_paid_times(&self, times: u32) {
        self.state.write().unwrap().mark_paid_failures = times;
    }

    /// Returns a copy of the stored order.
    pub fn order(&self, order_id: &OrderId) -> Option<Order> {
        self.state.read().unwrap().orders.get(order_id).cloned()
    }

    /// Returns how many orders were placed.
    pub fn order_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }

    /// Returns how many times `mark_order_paid` was called.
    pub fn mark_paid_calls(&self) -> usize {
        self.state.read().unwrap().mark_paid_calls
    }

    /// Returns how many times `cancel_order` was called.
    pub fn cancel_calls(&self) -> usize {
        self.state.read().unwrap().cancel_calls
    }
}

#[async_trait]
impl OrderLedger for InMemoryOrderLedger {
    async fn place_order(&self, draft: OrderDraft) -> Result<OrderId, ServiceError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_place {
            return Err(ServiceError::Unavailable("order ledger unreachable".to_string()));
        }

        state.next_id += 1;
        let order_id = OrderId::new(format!("ORD{}", state.next_id));
        state.orders.insert(
            order_id.clone(),
            Order {
                order_id: order_id.clone(),
                draft,
                status: OrderStatus::Placed,
                transaction_id: None,
                cancellation: None,
                created_at: Utc::now(),
            },
        );

        Ok(order_id)
    }

    async fn mark_order_paid(
        &self,
        user_id: UserId,
        order_id: &OrderId,
        transaction_id: &TransactionId,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.write().unwrap();
        state.mark_paid_calls += 1;

        if state.mark_paid_failures > 0 {
            state.mark_paid_failures -= 1;
            return Err(ServiceError::Unavailable("order ledger unreachable".to_string()));
        }

        let order = state
            .orders
            .get_mut(order_id)
            .filter(|order| order.draft.user_id == user_id)
            .ok_or_else(|| ServiceError::NotFound(order_id.to_string()))?;

        let status = order.status;
        match status {
            OrderStatus::Placed => {
                order.status = OrderStatus::Paid;
                order.transaction_id = Some(transaction_id.clone());
                Ok(())
            }
            OrderStatus::Paid if order.transaction_id.as_ref() == Some(transaction_id) => Ok(()),
            status => Err(ServiceError::Rejected(format!(
                "order {order_id} is {status}, cannot mark paid"
            ))),
        }
    }

    async fn cancel_order(
        &self,
        order_id: &OrderId,
        reason: CancellationReason,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.write().unwrap();
        state.cancel_calls += 1;

        if state.fail_on_cancel {
            return Err(ServiceError::Unavailable("order ledger unreachable".to_string()));
        }

        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| ServiceError::NotFound(order_id.to_string()))?;

        let status = order.status;
        match status {
            OrderStatus::Placed => {
                order.status = reason.terminal_status();
                order.cancellation = Some(reason);
                Ok(())
            }
            OrderStatus::PaymentFailed | OrderStatus::Cancelled => Ok(()),
            OrderStatus::Paid => Err(ServiceError::Rejected(format!(
                "order {order_id} is already paid"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;

    fn draft(user: u32) -> OrderDraft {
        OrderDraft {
            user_id: UserId::new(user),
            currency: "USD".to_string(),
            email: "buyer@example.com".to_string(),
            address: None,
            items: Vec::new(),
            total: Money::zero(),
        }
    }

    #[tokio::test]
    async fn test_sequential_order_ids() {
        let ledger = InMemoryOrderLedger::new();
        let first = ledger.place_order(draft(1)).await.unwrap();
        let second = ledger.place_order(draft(1)).await.unwrap();

        assert_eq!(first, OrderId::new("ORD1"));
        assert_eq!(second, OrderId::new("ORD2"));
        assert_eq!(ledger.order(&first).unwrap().status, OrderStatus::Placed);
    }

    #[tokio::test]
    async fn test_mark_paid_is_idempotent_per_transaction() {
        let ledger = InMemoryOrderLedger::new();
        let order_id = ledger.place_order(draft(1)).await.unwrap();
        let txn = TransactionId::new("TXN1");

        ledger.mark_order_paid(UserId::new(1), &order_id, &txn).await.unwrap();
        ledger.mark_order_paid(UserId::new(1), &order_id, &txn).await.unwrap();
        assert_eq!(ledger.order(&order_id).unwrap().status, OrderStatus::Paid);

        let other = TransactionId::new("TXN2");
        let result = ledger.mark_order_paid(UserId::new(1), &order_id, &other).await;
        assert!(matches!(result, Err(ServiceError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_mark_paid_checks_owner() {
        let ledger = InMemoryOrderLedger::new();
        let order_id = ledger.place_order(draft(1)).await.unwrap();
        let result = ledger
            .mark_order_paid(UserId::new(2), &order_id, &TransactionId::new("TXN1"))
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let ledger = InMemoryOrderLedger::new();
        let order_id = ledger.place_order(draft(1)).await.unwrap();

        ledger
            .cancel_order(&order_id, CancellationReason::PaymentFailed)
            .await
            .unwrap();
        ledger
            .cancel_order(&order_id, CancellationReason::PaymentFailed)
            .await
            .unwrap();

        let order = ledger.order(&order_id).unwrap();
        assert_eq!(order.status, OrderStatus::PaymentFailed);
        assert_eq!(order.cancellation, Some(CancellationReason::PaymentFailed));
    }

    #[tokio::test]
    async fn test_cancel_unknown_and_paid_orders() {
        let ledger = InMemoryOrderLedger::new();
        let result = ledger
            .cancel_order(&OrderId::new("ORD404"), CancellationReason::CheckoutCancelled)
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));

        let order_id = ledger.place_order(draft(1)).await.unwrap();
        ledger
            .mark_order_paid(UserId::new(1), &order_id, &TransactionId::new("TXN1"))
            .await
            .unwrap();
        let result = ledger
            .cancel_order(&order_id, CancellationReason::CheckoutCancelled)
            .await;
        assert!(matches!(result, Err(ServiceError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_transient_mark_paid_failures() {
        let ledger = InMemoryOrderLedger::new();
        let order_id = ledger.place_order(draft(1)).await.unwrap();
        let txn = TransactionId::new("TXN1");
        ledger.fail_mark_paid_times(2);

        assert!(ledger.mark_order_paid(UserId::new(1), &order_id, &txn).await.is_err());
        assert!(ledger.mark_order_paid(UserId::new(1), &order_id, &txn).await.is_err());
        assert!(ledger.mark_order_paid(UserId::new(1), &order_id, &txn).await.is_ok());
        assert_eq!(ledger.mark_paid_calls(), 3);
    }
}
