//! Checkout flow constants.

/// Currency every checkout order is placed in.
pub const CURRENCY: &str = "USD";

/// Step name: Fetch the user's cart.
pub const STEP_FETCH_CART: &str = "fetch_cart";

/// Step name: Price cart lines against the catalog.
pub const STEP_PRICE_CART: &str = "price_cart";

/// Step name: Look up one product in the catalog.
pub const STEP_LOOKUP_PRODUCT: &str = "lookup_product";

/// Step name: Submit the order draft to the ledger.
pub const STEP_PLACE_ORDER: &str = "place_order";

/// Step name: Empty the user's cart.
pub const STEP_CLEAR_CART: &str = "clear_cart";

/// Step name: Charge the payment instrument.
pub const STEP_CHARGE_PAYMENT: &str = "charge_payment";

/// Step name: Publish the purchase confirmation.
pub const STEP_PUBLISH_NOTIFICATION: &str = "publish_notification";

/// Step name: Mark the order paid in the ledger.
pub const STEP_MARK_PAID: &str = "mark_order_paid";

/// Step name: Cancel the order in the ledger.
pub const STEP_COMPENSATE: &str = "cancel_order";

/// Default topic for purchase confirmations.
pub const DEFAULT_NOTIFICATION_TOPIC: &str = "email";

/// Default sender address for purchase confirmations.
pub const DEFAULT_NOTIFICATION_SENDER: &str = "from@example.com";
