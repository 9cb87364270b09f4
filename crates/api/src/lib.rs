//! HTTP API server for checkout orchestration.
//!
//! Exposes `POST /checkout` over in-memory collaborators, with structured
//! logging (tracing) and Prometheus metrics.
//!
//! Carts have no HTTP surface. The binary seeds one demo cart with
//! [`seed_demo_cart`] so a first `POST /checkout` for [`DEMO_USER_ID`]
//! succeeds; later runs for that user find the cart cleared.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::{
    CheckoutConfig, CheckoutOrchestrator, InMemoryCartService, InMemoryCatalogService,
    InMemoryNotificationBus, InMemoryOrderLedger, InMemoryPaymentService,
};
use common::{Money, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::checkout::AppState;

/// User whose cart [`seed_demo_cart`] fills.
pub const DEMO_USER_ID: u32 = 1;

/// Handles to the in-memory collaborators behind the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct Collaborators {
    pub cart: InMemoryCartService,
    pub catalog: InMemoryCatalogService,
    pub ledger: InMemoryOrderLedger,
    pub payment: InMemoryPaymentService,
    pub bus: InMemoryNotificationBus,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/checkout", post(routes::checkout::place))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over fresh in-memory collaborators.
///
/// The catalog is seeded with a few demo products.
pub fn create_default_state(config: CheckoutConfig) -> (Arc<AppState>, Collaborators) {
    let collaborators = Collaborators::default();
    seed_catalog(&collaborators.catalog);

    let orchestrator = CheckoutOrchestrator::new(
        collaborators.cart.clone(),
        collaborators.catalog.clone(),
        collaborators.ledger.clone(),
        collaborators.payment.clone(),
        collaborators.bus.clone(),
        config,
    );

    (Arc::new(AppState { orchestrator }), collaborators)
}

/// Puts a couple of catalog products in the demo user's cart.
pub fn seed_demo_cart(cart: &InMemoryCartService) {
    let user_id = UserId::new(DEMO_USER_ID);
    cart.add_item(user_id, "NOTEBOOK", 2);
    cart.add_item(user_id, "TOTE", 1);
}

fn seed_catalog(catalog: &InMemoryCatalogService) {
    catalog.add_product("NOTEBOOK", "Dot Grid Notebook", Money::from_cents(1299));
    catalog.add_product("MUG", "Enamel Mug", Money::from_cents(1500));
    catalog.add_product("TOTE", "Canvas Tote", Money::from_cents(2450));
}
