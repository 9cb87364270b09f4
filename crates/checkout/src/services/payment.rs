//! Payment service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Money, OrderId, TransactionId, UserId};

use crate::error::ServiceError;
use crate::request::CreditCard;

/// A request to capture money for an order.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub user_id: UserId,
    /// Idempotency key: one order is captured at most once.
    pub order_id: OrderId,
    pub amount: Money,
    pub card: CreditCard,
}

/// Trait for payment processing.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Captures `amount` and returns the transaction id.
    ///
    /// Charging the same order again returns the original transaction
    /// without capturing anything new.
    async fn charge(&self, request: ChargeRequest) -> Result<TransactionId, ServiceError>;
}

/// A captured payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub user_id: UserId,
    pub amount: Money,
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    transactions: HashMap<OrderId, Transaction>,
    next_id: u32,
    decline: bool,
    unavailable: bool,
    charge_calls: usize,
}

/// In-memory payment processor for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentService {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the processor to decline every card.
    pub fn set_decline(&self, decline: bool) {
        self.state.write().unwrap().decline = decline;
    }

    /// Configures the processor to be unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Returns the number of captured transactions.
    pub fn captured_count(&self) -> usize {
        self.state.read().unwrap().transactions.len()
    }

    /// Returns how many charges were attempted, including repeats.
    pub fn charge_calls(&self) -> usize {
        self.state.read().unwrap().charge_calls
    }

    /// Returns the transaction captured for an order.
    pub fn transaction_for(&self, order_id: &OrderId) -> Option<Transaction> {
        self.state.read().unwrap().transactions.get(order_id).cloned()
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn charge(&self, request: ChargeRequest) -> Result<TransactionId, ServiceError> {
        let mut state = self.state.write().unwrap();
        state.charge_calls += 1;

        if state.unavailable {
            return Err(ServiceError::Unavailable("payment processor unreachable".to_string()));
        }

        if let Some(existing) = state.transactions.get(&request.order_id) {
            return Ok(existing.transaction_id.clone());
        }

        if state.decline {
            return Err(ServiceError::Rejected(format!(
                "card ending {} declined",
                request.card.last_four()
            )));
        }

        state.next_id += 1;
        let transaction_id = TransactionId::new(format!("TXN{}", state.next_id));
        state.transactions.insert(
            request.order_id,
            Transaction {
                transaction_id: transaction_id.clone(),
                user_id: request.user_id,
                amount: request.amount,
            },
        );

        Ok(transaction_id)
    }
}
