//! Checkout orchestrator driving one purchase across the collaborators.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use common::{OrderId, TransactionId};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::assembler::assemble;
use crate::checkout_flow;
use crate::compensation::{CompensationManager, CompensationOutcome};
use crate::config::CheckoutConfig;
use crate::context::{CheckoutContext, bounded};
use crate::error::{CheckoutError, Result, ServiceError, ValidationError};
use crate::events::CheckoutEvent;
use crate::notification::{NotificationPublisher, PublishOutcome};
use crate::pricing::PricingCalculator;
use crate::request::CheckoutRequest;
use crate::retry::retry;
use crate::run::CheckoutRun;
use crate::services::bus::NotificationBus;
use crate::services::cart::CartService;
use crate::services::catalog::CatalogService;
use crate::services::ledger::{CancellationReason, OrderLedger};
use crate::services::payment::{ChargeRequest, PaymentService};
use crate::state::{CheckoutState, PartialReason};

/// Ids handed back to the caller of a completed checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub transaction_id: TransactionId,
}

/// The run record together with what the caller is told.
#[derive(Debug)]
pub struct CheckoutOutcome {
    pub run: CheckoutRun,
    pub result: Result<CheckoutReceipt>,
}

/// What the cart-clear lane reports back. `None` means it never ran.
type CartLane = JoinHandle<Option<std::result::Result<(), ServiceError>>>;

/// Orchestrates checkout runs.
///
/// A run fetches the cart, prices it, places the order, then charges,
/// notifies and marks the order paid. The cart is cleared on a separate lane
/// once the charge succeeded. Failures after the order exists are compensated
/// by cancelling the order in the ledger.
pub struct CheckoutOrchestrator<C, K, L, P, N>
where
    C: CartService + 'static,
    K: CatalogService,
    L: OrderLedger,
    P: PaymentService,
    N: NotificationBus,
{
    cart: Arc<C>,
    pricing: PricingCalculator<K>,
    ledger: Arc<L>,
    payment: P,
    notifications: NotificationPublisher<N>,
    compensation: CompensationManager<L>,
    config: CheckoutConfig,
}

impl<C, K, L, P, N> CheckoutOrchestrator<C, K, L, P, N>
where
    C: CartService + 'static,
    K: CatalogService,
    L: OrderLedger,
    P: PaymentService,
    N: NotificationBus,
{
    /// Creates a new orchestrator over the given collaborators.
    pub fn new(cart: C, catalog: K, ledger: L, payment: P, bus: N, config: CheckoutConfig) -> Self {
        let ledger = Arc::new(ledger);
        let pricing = PricingCalculator::new(Arc::new(catalog), config.call_timeout);
        let notifications = NotificationPublisher::new(
            Arc::new(bus),
            config.notification_topic.clone(),
            config.notification_sender.clone(),
            config.call_timeout,
        );
        let compensation = CompensationManager::new(
            Arc::clone(&ledger),
            config.call_timeout,
            config.mark_paid_retry.clone(),
        );
        Self {
            cart: Arc::new(cart),
            pricing,
            ledger,
            payment,
            notifications,
            compensation,
            config,
        }
    }

    /// Returns the configuration this orchestrator was built with.
    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Runs a checkout and returns only what the caller needs.
    pub async fn checkout(
        &self,
        request: CheckoutRequest,
        ctx: &CheckoutContext,
    ) -> Result<CheckoutReceipt> {
        self.execute(request, ctx).await.result
    }

    /// Runs a checkout and returns the full run record alongside the result.
    #[tracing::instrument(
        skip(self, request, ctx),
        fields(user_id = %request.user_id, trace_id = %ctx.trace().trace_id())
    )]
    pub async fn execute(&self, request: CheckoutRequest, ctx: &CheckoutContext) -> CheckoutOutcome {
        metrics::counter!("checkout_runs_total").increment(1);
        let run_start = std::time::Instant::now();

        let run_id = Uuid::new_v4();
        let mut run = CheckoutRun::default();
        run.apply(CheckoutEvent::run_started(run_id, request.user_id));

        let result = self.drive(run_id, &request, ctx, &mut run).await;

        match &result {
            Ok(receipt) => {
                run.apply(CheckoutEvent::run_completed());
                metrics::counter!("checkout_completed").increment(1);
                tracing::info!(
                    order_id = %receipt.order_id,
                    transaction_id = %receipt.transaction_id,
                    "checkout completed"
                );
            }
            Err(err) => self.finish_failed(&mut run, err),
        }

        metrics::histogram!("checkout_duration_seconds").record(run_start.elapsed().as_secs_f64());
        CheckoutOutcome { run, result }
    }

    fn finish_failed(&self, run: &mut CheckoutRun, err: &CheckoutError) {
        match err.terminal_state() {
            CheckoutState::PartiallyCompleted(reason) => {
                run.apply(CheckoutEvent::run_partially_completed(reason, err.to_string()));
                metrics::counter!("checkout_partial", "reason" => reason.as_str()).increment(1);
                if matches!(
                    reason,
                    PartialReason::BookkeepingFailure | PartialReason::PaymentUnconfirmed
                ) {
                    tracing::error!(error = %err, "checkout needs reconciliation");
                } else {
                    tracing::warn!(error = %err, "checkout failed after order placement");
                }
            }
            CheckoutState::Aborted(reason) => {
                run.apply(CheckoutEvent::run_aborted(reason, err.to_string()));
                metrics::counter!("checkout_aborted", "reason" => reason.as_str()).increment(1);
                tracing::warn!(error = %err, kind = err.kind(), "checkout aborted");
            }
            other => {
                tracing::error!(state = %other, error = %err, "checkout error without terminal state");
            }
        }
    }

    async fn drive(
        &self,
        run_id: Uuid,
        request: &CheckoutRequest,
        ctx: &CheckoutContext,
        run: &mut CheckoutRun,
    ) -> Result<CheckoutReceipt> {
        request.validate()?;
        let user_id = request.user_id;
        let call_timeout = self.config.call_timeout;

        // 1. Fetch the cart
        let cart = self
            .guarded(ctx, checkout_flow::STEP_FETCH_CART, async {
                bounded(
                    checkout_flow::STEP_FETCH_CART,
                    call_timeout,
                    self.cart.get_cart(user_id),
                )
                .await
                .map_err(|source| CheckoutError::Upstream {
                    step: checkout_flow::STEP_FETCH_CART,
                    source,
                })
            })
            .await?
            .filter(|cart| !cart.items.is_empty())
            .ok_or(ValidationError::EmptyCart)?;
        run.apply(CheckoutEvent::CartFetched {
            item_count: cart.items.len(),
        });
        tracing::info!(step = checkout_flow::STEP_FETCH_CART, lines = cart.items.len(), "cart fetched");

        // 2. Price it against the live catalog
        let priced = self
            .guarded(ctx, checkout_flow::STEP_PRICE_CART, self.pricing.price(&cart))
            .await?;
        if priced.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        run.apply(CheckoutEvent::priced(
            priced.items.len(),
            priced.dropped.len(),
            priced.total,
        ));
        tracing::info!(step = checkout_flow::STEP_PRICE_CART, total = %priced.total, "cart priced");

        // 3. Place the order. Once issued this call is not interrupted.
        if ctx.is_cancelled() {
            return Err(CheckoutError::Cancelled {
                step: checkout_flow::STEP_PLACE_ORDER,
                order_id: None,
            });
        }
        let draft = assemble(request, &priced, &self.config.currency);
        let total = draft.total;
        let order_id = bounded(
            checkout_flow::STEP_PLACE_ORDER,
            call_timeout,
            self.ledger.place_order(draft),
        )
        .await
        .map_err(|source| CheckoutError::Upstream {
            step: checkout_flow::STEP_PLACE_ORDER,
            source,
        })?;
        run.apply(CheckoutEvent::OrderPlaced {
            order_id: order_id.clone(),
        });
        tracing::info!(step = checkout_flow::STEP_PLACE_ORDER, %order_id, "order placed");

        // 4. Cart clear runs on its own lane, released by a successful charge
        let (go, lane) = self.dispatch_cart_clear(user_id);
        run.apply(CheckoutEvent::CartClearDispatched);

        if ctx.is_cancelled() {
            drop(go);
            self.compensate(run, &order_id, CancellationReason::CheckoutCancelled)
                .await;
            self.join_cart_lane(lane, run).await;
            return Err(CheckoutError::Cancelled {
                step: checkout_flow::STEP_CHARGE_PAYMENT,
                order_id: Some(order_id),
            });
        }

        // 5. Charge. Re-issuing is safe since the charge is keyed by order id.
        let charge = ChargeRequest {
            user_id,
            order_id: order_id.clone(),
            amount: total,
            card: request.credit_card.clone(),
        };
        let payment = &self.payment;
        let charge_ref = &charge;
        let timed_out_flag = AtomicBool::new(false);
        let timed_out = &timed_out_flag;
        let charged = retry(
            &self.config.charge_retry,
            checkout_flow::STEP_CHARGE_PAYMENT,
            move |_| {
                let charge = charge_ref.clone();
                async move {
                    let result = bounded(
                        checkout_flow::STEP_CHARGE_PAYMENT,
                        call_timeout,
                        payment.charge(charge),
                    )
                    .await;
                    if matches!(result, Err(ServiceError::Timeout { .. })) {
                        timed_out.store(true, Ordering::Relaxed);
                    }
                    result
                }
            },
        )
        .await;

        let transaction_id = match charged {
            Ok((transaction_id, _)) => transaction_id,
            Err(exhausted) => {
                let attempts = exhausted.attempts;
                let reason = exhausted.last_error;
                drop(go);
                if reason.is_transient() && timed_out_flag.load(Ordering::Relaxed) {
                    // An attempt may have captured without acknowledging. The
                    // order stays placed and the cart stays full until reconciled.
                    run.apply(CheckoutEvent::PaymentUnconfirmed {
                        attempts,
                        error: reason.to_string(),
                    });
                    self.join_cart_lane(lane, run).await;
                    return Err(CheckoutError::PaymentUnconfirmed {
                        order_id,
                        attempts,
                        reason,
                    });
                }
                run.apply(CheckoutEvent::PaymentFailed {
                    error: reason.to_string(),
                });
                self.compensate(run, &order_id, CancellationReason::PaymentFailed)
                    .await;
                self.join_cart_lane(lane, run).await;
                return Err(CheckoutError::PaymentFailure { order_id, reason });
            }
        };
        run.apply(CheckoutEvent::PaymentCharged {
            transaction_id: transaction_id.clone(),
        });
        tracing::info!(step = checkout_flow::STEP_CHARGE_PAYMENT, %transaction_id, "payment charged");
        // The lane may already have finished if its task panicked
        let _ = go.send(());

        // 6. Confirmation, best effort
        match self
            .notifications
            .publish_confirmation(run_id, &request.email, &order_id, total, ctx)
            .await
        {
            PublishOutcome::Published => run.apply(CheckoutEvent::NotificationPublished),
            PublishOutcome::Failed(error) => run.apply(CheckoutEvent::NotificationFailed { error }),
        }

        // 7. Mark paid
        let ledger = self.ledger.as_ref();
        let order_ref = &order_id;
        let transaction_ref = &transaction_id;
        let marked = retry(
            &self.config.mark_paid_retry,
            checkout_flow::STEP_MARK_PAID,
            move |_| {
                bounded(
                    checkout_flow::STEP_MARK_PAID,
                    call_timeout,
                    ledger.mark_order_paid(user_id, order_ref, transaction_ref),
                )
            },
        )
        .await;

        match marked {
            Ok(((), attempts)) => {
                run.apply(CheckoutEvent::OrderMarkedPaid { attempts });
                tracing::info!(step = checkout_flow::STEP_MARK_PAID, attempts, "order marked paid");
            }
            Err(exhausted) => {
                run.apply(CheckoutEvent::MarkPaidFailed {
                    attempts: exhausted.attempts,
                    error: exhausted.last_error.to_string(),
                });
                self.settle_cart_lane(lane, run).await;
                return Err(CheckoutError::PartialFailure {
                    order_id,
                    transaction_id,
                    attempts: exhausted.attempts,
                    reason: exhausted.last_error,
                });
            }
        }

        self.settle_cart_lane(lane, run).await;

        Ok(CheckoutReceipt {
            order_id,
            transaction_id,
        })
    }

    /// Races a pre-order call against cancellation of the run.
    async fn guarded<T, F>(&self, ctx: &CheckoutContext, step: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            () = ctx.done() => Err(CheckoutError::Cancelled { step, order_id: None }),
            result = call => result,
        }
    }

    fn dispatch_cart_clear(&self, user_id: common::UserId) -> (oneshot::Sender<()>, CartLane) {
        let (go, released) = oneshot::channel::<()>();
        let cart = Arc::clone(&self.cart);
        let call_timeout = self.config.call_timeout;

        let lane = tokio::spawn(
            async move {
                // Dropped sender means the charge never succeeded
                released.await.ok()?;
                let result = bounded(
                    checkout_flow::STEP_CLEAR_CART,
                    call_timeout,
                    cart.empty_cart(user_id),
                )
                .await;
                match &result {
                    Ok(()) => tracing::info!(step = checkout_flow::STEP_CLEAR_CART, "cart cleared"),
                    Err(e) => {
                        metrics::counter!(
                            "checkout_noncritical_failures_total",
                            "step" => checkout_flow::STEP_CLEAR_CART
                        )
                        .increment(1);
                        tracing::warn!(error = %e, "cart not cleared");
                    }
                }
                Some(result)
            }
            .instrument(tracing::Span::current()),
        );
        (go, lane)
    }

    /// Waits for a lane whose go signal was dropped. It finishes at once.
    async fn join_cart_lane(&self, lane: CartLane, run: &mut CheckoutRun) {
        Self::record_cart_lane(lane.await, run);
    }

    /// Waits up to `cart_clear_grace` for a released lane, then detaches it.
    ///
    /// A detached lane keeps running and logs its own outcome.
    async fn settle_cart_lane(&self, mut lane: CartLane, run: &mut CheckoutRun) {
        match tokio::time::timeout(self.config.cart_clear_grace, &mut lane).await {
            Ok(joined) => Self::record_cart_lane(joined, run),
            Err(_) => {
                tracing::debug!(
                    step = checkout_flow::STEP_CLEAR_CART,
                    grace_ms = self.config.cart_clear_grace.as_millis() as u64,
                    "cart clear still running, detached"
                );
                run.apply(CheckoutEvent::CartClearDetached);
            }
        }
    }

    fn record_cart_lane(
        joined: std::result::Result<
            Option<std::result::Result<(), ServiceError>>,
            tokio::task::JoinError,
        >,
        run: &mut CheckoutRun,
    ) {
        match joined {
            Ok(Some(Ok(()))) => run.apply(CheckoutEvent::CartCleared),
            Ok(Some(Err(e))) => run.apply(CheckoutEvent::CartNotCleared {
                reason: e.to_string(),
            }),
            Ok(None) => {
                tracing::debug!(step = checkout_flow::STEP_CLEAR_CART, "cart kept, charge not captured");
                run.apply(CheckoutEvent::CartNotCleared {
                    reason: "charge not captured".to_string(),
                });
            }
            Err(join_err) => {
                metrics::counter!(
                    "checkout_noncritical_failures_total",
                    "step" => checkout_flow::STEP_CLEAR_CART
                )
                .increment(1);
                tracing::warn!(error = %join_err, "cart clear lane failed");
                run.apply(CheckoutEvent::CartNotCleared {
                    reason: join_err.to_string(),
                });
            }
        }
    }

    async fn compensate(&self, run: &mut CheckoutRun, order_id: &OrderId, reason: CancellationReason) {
        match self.compensation.compensate(order_id, reason).await {
            CompensationOutcome::Cancelled => run.apply(CheckoutEvent::OrderCompensated),
            CompensationOutcome::UnknownOrder => run.apply(CheckoutEvent::CompensationFailed {
                error: format!("order {order_id} unknown to ledger"),
            }),
            CompensationOutcome::Failed(error) => {
                run.apply(CheckoutEvent::CompensationFailed { error })
            }
        }
    }
}
