//! Checkout request and its validation.

use common::UserId;

use crate::error::ValidationError;

/// Free-text shipping address as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Address {
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: String,
}

/// Payment card details. Never logged in clear.
#[derive(Clone, PartialEq, Eq)]
pub struct CreditCard {
    pub number: String,
    pub cvv: String,
    pub expiration_year: i32,
    pub expiration_month: u32,
}

impl CreditCard {
    /// Returns the last four digits of the card number.
    pub fn last_four(&self) -> &str {
        let len = self.number.len();
        self.number.get(len.saturating_sub(4)..).unwrap_or("")
    }
}

impl std::fmt::Debug for CreditCard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditCard")
            .field("number", &format_args!("****{}", self.last_four()))
            .field("cvv", &"***")
            .field("expiration_year", &self.expiration_year)
            .field("expiration_month", &self.expiration_month)
            .finish()
    }
}

/// Everything one checkout run needs from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub email: String,
    pub address: Option<Address>,
    pub credit_card: CreditCard,
}

impl CheckoutRequest {
    /// Rejects requests that cannot possibly succeed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.user_id.is_valid() {
            return Err(ValidationError::InvalidUserId);
        }

        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ValidationError::InvalidEmail(self.email.clone()));
        }

        let card = &self.credit_card;
        if card.number.is_empty() || !card.number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidCard("card number must be digits"));
        }
        if !(1..=12).contains(&card.expiration_month) {
            return Err(ValidationError::InvalidCard("expiration month out of range"));
        }
        if card.cvv.is_empty() {
            return Err(ValidationError::InvalidCard("missing cvv"));
        }

        Ok(())
    }
}
