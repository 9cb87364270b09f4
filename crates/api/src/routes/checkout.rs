//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use checkout::context::TRACEPARENT_HEADER;
use checkout::{
    Address, CheckoutContext, CheckoutOrchestrator, CheckoutRequest, CreditCard,
    InMemoryCartService, InMemoryCatalogService, InMemoryNotificationBus, InMemoryOrderLedger,
    InMemoryPaymentService, TraceContext,
};
use common::UserId;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Orchestrator wired to the in-memory collaborators.
pub type InMemoryOrchestrator = CheckoutOrchestrator<
    InMemoryCartService,
    InMemoryCatalogService,
    InMemoryOrderLedger,
    InMemoryPaymentService,
    InMemoryNotificationBus,
>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: InMemoryOrchestrator,
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub user_id: u32,
    pub email: String,
    pub address: Option<AddressBody>,
    pub credit_card: CreditCardBody,
}

#[derive(Debug, Deserialize)]
pub struct AddressBody {
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: String,
}

#[derive(Deserialize)]
pub struct CreditCardBody {
    pub credit_card_number: String,
    pub credit_card_cvv: String,
    pub credit_card_expiration_year: i32,
    pub credit_card_expiration_month: u32,
}

impl std::fmt::Debug for CreditCardBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditCardBody").finish_non_exhaustive()
    }
}

impl From<CheckoutBody> for CheckoutRequest {
    fn from(body: CheckoutBody) -> Self {
        CheckoutRequest {
            user_id: UserId::new(body.user_id),
            email: body.email,
            address: body.address.map(|a| Address {
                street_address: a.street_address,
                city: a.city,
                state: a.state,
                country: a.country,
                zip_code: a.zip_code,
            }),
            credit_card: CreditCard {
                number: body.credit_card.credit_card_number,
                cvv: body.credit_card.credit_card_cvv,
                expiration_year: body.credit_card.credit_card_expiration_year,
                expiration_month: body.credit_card.credit_card_expiration_month,
            },
        }
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub transaction_id: String,
}

/// POST /checkout: runs a checkout for the user's current cart.
///
/// The run executes on its own task. If the client goes away the run is
/// cancelled and compensates instead of being dropped mid-flight.
pub async fn place(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CheckoutBody>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let Json(body) = payload?;
    let trace = headers
        .get(TRACEPARENT_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(TraceContext::from_traceparent)
        .unwrap_or_default();

    let (mut ctx, handle) = CheckoutContext::new(trace);
    if let Some(deadline) = state.orchestrator.config().deadline {
        ctx = ctx.with_timeout(deadline);
    }
    let guard = handle.cancel_on_drop();

    let request = CheckoutRequest::from(body);
    let task_state = Arc::clone(&state);
    let run = tokio::spawn(async move { task_state.orchestrator.checkout(request, &ctx).await });

    let result = run
        .await
        .map_err(|e| ApiError::Internal(format!("checkout task failed: {e}")))?;
    guard.disarm();

    let receipt = result?;
    Ok(Json(CheckoutResponse {
        order_id: receipt.order_id.to_string(),
        transaction_id: receipt.transaction_id.to_string(),
    }))
}
