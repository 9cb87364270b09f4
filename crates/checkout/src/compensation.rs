//! Compensation of a placed order when a later step fails.

use std::sync::Arc;
use std::time::Duration;

use common::OrderId;

use crate::checkout_flow;
use crate::context::bounded;
use crate::error::ServiceError;
use crate::retry::{RetryPolicy, retry};
use crate::services::ledger::{CancellationReason, OrderLedger};

/// Result of compensating an order. Compensation itself never fails the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompensationOutcome {
    /// The order is now (or already was) in a terminal failed status.
    Cancelled,
    /// The ledger does not know the order.
    UnknownOrder,
    /// The ledger could not be updated; needs manual follow-up.
    Failed(String),
}

/// Moves placed orders to a terminal failed status.
///
/// Safe to call repeatedly for the same order.
pub struct CompensationManager<L: OrderLedger> {
    ledger: Arc<L>,
    call_timeout: Duration,
    retry: RetryPolicy,
}

impl<L: OrderLedger> CompensationManager<L> {
    pub fn new(ledger: Arc<L>, call_timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            ledger,
            call_timeout,
            retry,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn compensate(
        &self,
        order_id: &OrderId,
        reason: CancellationReason,
    ) -> CompensationOutcome {
        metrics::counter!("checkout_compensations_total", "reason" => reason.as_str())
            .increment(1);

        let ledger = &self.ledger;
        let timeout = self.call_timeout;
        let result = retry(&self.retry, checkout_flow::STEP_COMPENSATE, move |_| {
            bounded(
                checkout_flow::STEP_COMPENSATE,
                timeout,
                ledger.cancel_order(order_id, reason),
            )
        })
        .await;

        match result {
            Ok(((), attempts)) => {
                tracing::warn!(%order_id, reason = reason.as_str(), attempts, "order compensated");
                CompensationOutcome::Cancelled
            }
            Err(exhausted) => match exhausted.last_error {
                ServiceError::NotFound(_) => {
                    tracing::warn!(%order_id, "compensation skipped, order unknown to ledger");
                    CompensationOutcome::UnknownOrder
                }
                err => {
                    tracing::error!(
                        %order_id,
                        reason = reason.as_str(),
                        attempts = exhausted.attempts,
                        error = %err,
                        "compensation failed, order needs manual cancellation"
                    );
                    CompensationOutcome::Failed(err.to_string())
                }
            },
        }
    }
}
