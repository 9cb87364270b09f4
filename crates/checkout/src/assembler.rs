//! Translation of a priced cart into an order ledger request.

use common::{Money, UserId};
use serde::{Deserialize, Serialize};

use crate::pricing::{PricedCart, PricedItem};
use crate::request::{Address, CheckoutRequest};

/// Shipping address in the shape the order ledger stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: i32,
}

impl From<&Address> for ShippingAddress {
    fn from(address: &Address) -> Self {
        Self {
            street_address: address.street_address.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            country: address.country.clone(),
            zip_code: parse_zip_code(&address.zip_code),
        }
    }
}

/// An order as submitted to the ledger, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub user_id: UserId,
    pub currency: String,
    pub email: String,
    pub address: Option<ShippingAddress>,
    pub items: Vec<PricedItem>,
    pub total: Money,
}

/// Builds the ledger request for a priced cart. Pure; never fails.
pub fn assemble(request: &CheckoutRequest, priced: &PricedCart, currency: &str) -> OrderDraft {
    OrderDraft {
        user_id: request.user_id,
        currency: currency.to_string(),
        email: request.email.clone(),
        address: request.address.as_ref().map(ShippingAddress::from),
        items: priced.items.clone(),
        total: priced.total,
    }
}

/// Postal codes are stored as integers; anything unparsable becomes zero.
fn parse_zip_code(raw: &str) -> i32 {
    raw.parse().unwrap_or(0)
}
