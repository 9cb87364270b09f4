//! In-memory record of one checkout run.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, TransactionId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::CheckoutEvent;
use crate::state::CheckoutState;

/// A durable side effect a run has committed in some collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SideEffect {
    OrderPlaced,
    CartCleared,
    PaymentCaptured,
    NotificationPublished,
    OrderMarkedPaid,
    OrderCancelled,
}

/// The orchestrator's record of one execution.
///
/// Built by applying [`CheckoutEvent`]s in order. Lives for a single request
/// and is never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutRun {
    run_id: Option<Uuid>,
    user_id: Option<UserId>,
    state: CheckoutState,
    order_id: Option<OrderId>,
    transaction_id: Option<TransactionId>,
    total: Money,
    dropped_items: usize,
    effects: Vec<SideEffect>,
    failure: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    history: Vec<CheckoutEvent>,
}

impl CheckoutRun {
    /// Applies an event, updating state. Pure and infallible.
    pub fn apply(&mut self, event: CheckoutEvent) {
        match &event {
            CheckoutEvent::RunStarted(data) => {
                self.run_id = Some(data.run_id);
                self.user_id = Some(data.user_id);
                self.started_at = Some(data.started_at);
                self.state = CheckoutState::Start;
            }
            CheckoutEvent::CartFetched { .. } => {
                self.transition(CheckoutState::CartFetched);
            }
            CheckoutEvent::Priced(data) => {
                self.total = data.total;
                self.dropped_items = data.dropped_items;
                self.transition(CheckoutState::Priced);
            }
            CheckoutEvent::OrderPlaced { order_id } => {
                self.order_id = Some(order_id.clone());
                self.effects.push(SideEffect::OrderPlaced);
                self.transition(CheckoutState::OrderPlaced);
            }
            CheckoutEvent::CartClearDispatched => {
                self.transition(CheckoutState::CartCleared);
            }
            CheckoutEvent::CartCleared => {
                self.effects.push(SideEffect::CartCleared);
            }
            CheckoutEvent::CartClearDetached | CheckoutEvent::CartNotCleared { .. } => {
                // Non-critical, state unchanged
            }
            CheckoutEvent::PaymentCharged { transaction_id } => {
                self.transaction_id = Some(transaction_id.clone());
                self.effects.push(SideEffect::PaymentCaptured);
                self.transition(CheckoutState::PaymentCharged);
            }
            CheckoutEvent::PaymentFailed { error }
            | CheckoutEvent::PaymentUnconfirmed { error, .. } => {
                self.failure = Some(error.clone());
            }
            CheckoutEvent::NotificationPublished => {
                self.effects.push(SideEffect::NotificationPublished);
                self.transition(CheckoutState::NotificationPublished);
            }
            CheckoutEvent::NotificationFailed { .. } => {
                self.transition(CheckoutState::NotificationPublished);
            }
            CheckoutEvent::OrderMarkedPaid { .. } => {
                self.effects.push(SideEffect::OrderMarkedPaid);
                self.transition(CheckoutState::OrderMarkedPaid);
            }
            CheckoutEvent::MarkPaidFailed { error, .. } => {
                self.failure = Some(error.clone());
            }
            CheckoutEvent::OrderCompensated => {
                self.effects.push(SideEffect::OrderCancelled);
            }
            CheckoutEvent::CompensationFailed { .. } => {}
            CheckoutEvent::RunCompleted { completed_at } => {
                self.finished_at = Some(*completed_at);
                self.transition(CheckoutState::Completed);
            }
            CheckoutEvent::RunAborted(data) => {
                self.failure = Some(data.detail.clone());
                self.finished_at = Some(data.finished_at);
                self.transition(CheckoutState::Aborted(data.reason));
            }
            CheckoutEvent::RunPartiallyCompleted(data) => {
                self.failure = Some(data.detail.clone());
                self.finished_at = Some(data.finished_at);
                self.transition(CheckoutState::PartiallyCompleted(data.reason));
            }
        }
        self.history.push(event);
    }

    fn transition(&mut self, to: CheckoutState) {
        if !self.state.can_transition_to(to) {
            tracing::warn!(from = %self.state, to = %to, "unexpected checkout state transition");
        }
        self.state = to;
    }
}

// Query methods
impl CheckoutRun {
    /// Returns the run id, set once the run has started.
    pub fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    /// Returns the user the run checks out for.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Returns the current state.
    pub fn state(&self) -> CheckoutState {
        self.state
    }

    /// Returns the ledger order id once the order is placed.
    pub fn order_id(&self) -> Option<&OrderId> {
        self.order_id.as_ref()
    }

    /// Returns the payment transaction id once the charge is captured.
    pub fn transaction_id(&self) -> Option<&TransactionId> {
        self.transaction_id.as_ref()
    }

    /// Total as priced; zero before pricing.
    pub fn total(&self) -> Money {
        self.total
    }

    /// Returns how many cart lines were dropped during pricing.
    pub fn dropped_items(&self) -> usize {
        self.dropped_items
    }

    /// Side effects committed so far, in commit order.
    pub fn effects(&self) -> &[SideEffect] {
        &self.effects
    }

    /// Returns true if `effect` was committed.
    pub fn has_committed(&self, effect: SideEffect) -> bool {
        self.effects.contains(&effect)
    }

    /// Last failure detail, if any.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Returns when the run started.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns when the run reached a terminal state.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Returns every applied event, oldest first.
    pub fn history(&self) -> &[CheckoutEvent] {
        &self.history
    }

    /// Event type names in the order they were applied.
    pub fn event_types(&self) -> Vec<&'static str> {
        self.history.iter().map(CheckoutEvent::event_type).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AbortReason, PartialReason};

    fn started() -> CheckoutRun {
        let mut run = CheckoutRun::default();
        run.apply(CheckoutEvent::run_started(Uuid::new_v4(), UserId::new(1)));
        run
    }

    #[test]
    fn test_default_run() {
        let run = CheckoutRun::default();
        assert!(run.run_id().is_none());
        assert_eq!(run.state(), CheckoutState::Start);
        assert!(run.effects().is_empty());
    }

    #[test]
    fn test_full_lifecycle() {
        let mut run = started();

        run.apply(CheckoutEvent::CartFetched { item_count: 2 });
        run.apply(CheckoutEvent::priced(2, 0, Money::from_dollars(25)));
        assert_eq!(run.state(), CheckoutState::Priced);
        assert_eq!(run.total(), Money::from_dollars(25));

        run.apply(CheckoutEvent::OrderPlaced {
            order_id: OrderId::new("ORD1"),
        });
        run.apply(CheckoutEvent::CartClearDispatched);
        assert_eq!(run.state(), CheckoutState::CartCleared);
        assert!(!run.has_committed(SideEffect::CartCleared));

        run.apply(CheckoutEvent::PaymentCharged {
            transaction_id: TransactionId::new("TXN1"),
        });
        run.apply(CheckoutEvent::NotificationPublished);
        run.apply(CheckoutEvent::OrderMarkedPaid { attempts: 1 });
        run.apply(CheckoutEvent::CartCleared);
        run.apply(CheckoutEvent::run_completed());

        assert_eq!(run.state(), CheckoutState::Completed);
        assert_eq!(run.order_id(), Some(&OrderId::new("ORD1")));
        assert_eq!(run.transaction_id(), Some(&TransactionId::new("TXN1")));
        assert_eq!(
            run.effects(),
            &[
                SideEffect::OrderPlaced,
                SideEffect::PaymentCaptured,
                SideEffect::NotificationPublished,
                SideEffect::OrderMarkedPaid,
                SideEffect::CartCleared,
            ]
        );
        assert!(run.finished_at().is_some());
        assert_eq!(run.history().len(), 10);
    }

    #[test]
    fn test_notification_failure_still_advances() {
        let mut run = started();
        run.apply(CheckoutEvent::NotificationFailed {
            error: "bus down".to_string(),
        });
        assert_eq!(run.state(), CheckoutState::NotificationPublished);
        assert!(!run.has_committed(SideEffect::NotificationPublished));
    }

    #[test]
    fn test_abort_records_reason() {
        let mut run = started();
        run.apply(CheckoutEvent::run_aborted(AbortReason::EmptyCart, "cart is empty"));
        assert_eq!(run.state(), CheckoutState::Aborted(AbortReason::EmptyCart));
        assert_eq!(run.failure(), Some("cart is empty"));
        assert!(run.state().is_terminal());
    }

    #[test]
    fn test_payment_failure_with_compensation() {
        let mut run = started();
        run.apply(CheckoutEvent::OrderPlaced {
            order_id: OrderId::new("ORD1"),
        });
        run.apply(CheckoutEvent::PaymentFailed {
            error: "declined".to_string(),
        });
        run.apply(CheckoutEvent::OrderCompensated);
        run.apply(CheckoutEvent::run_partially_completed(
            PartialReason::PaymentFailure,
            "declined",
        ));

        assert_eq!(
            run.state(),
            CheckoutState::PartiallyCompleted(PartialReason::PaymentFailure)
        );
        assert!(run.transaction_id().is_none());
        assert_eq!(
            run.effects(),
            &[SideEffect::OrderPlaced, SideEffect::OrderCancelled]
        );
        assert_eq!(
            run.event_types(),
            vec![
                "RunStarted",
                "OrderPlaced",
                "PaymentFailed",
                "OrderCompensated",
                "RunPartiallyCompleted"
            ]
        );
    }
}
