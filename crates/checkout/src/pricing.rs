//! Pricing of cart lines against live catalog prices.

use std::sync::Arc;
use std::time::Duration;

use common::{Money, ProductId};
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::checkout_flow;
use crate::context::bounded;
use crate::error::{CheckoutError, Result, ValidationError};
use crate::services::cart::{Cart, CartItem};
use crate::services::catalog::CatalogService;

/// A cart line resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price per unit as observed when the cart was priced.
    pub unit_price: Money,
    /// `unit_price × quantity`.
    pub cost: Money,
}

impl PricedItem {
    /// Creates a priced line. Fails if the line cost does not fit in `Money`.
    pub fn new(
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> std::result::Result<Self, ValidationError> {
        let cost = unit_price
            .checked_multiply(quantity)
            .ok_or(ValidationError::AmountOverflow)?;
        Ok(Self {
            product_id,
            quantity,
            unit_price,
            cost,
        })
    }
}

/// Result of pricing a cart.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PricedCart {
    /// Resolved lines, in cart order.
    pub items: Vec<PricedItem>,
    /// Products that no longer exist in the catalog.
    pub dropped: Vec<ProductId>,
    /// Sum of `items` line costs.
    pub total: Money,
}

impl PricedCart {
    /// Builds a priced cart, computing the total from the kept lines.
    ///
    /// Fails if the total does not fit in `Money`.
    pub fn from_lines(
        lines: Vec<std::result::Result<PricedItem, ProductId>>,
    ) -> std::result::Result<Self, ValidationError> {
        let mut items = Vec::with_capacity(lines.len());
        let mut dropped = Vec::new();
        for line in lines {
            match line {
                Ok(item) => items.push(item),
                Err(product_id) => dropped.push(product_id),
            }
        }
        let total = Money::checked_sum(items.iter().map(|item| item.cost))
            .ok_or(ValidationError::AmountOverflow)?;
        Ok(Self {
            items,
            dropped,
            total,
        })
    }

    /// Returns true if no line survived pricing.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Resolves cart lines to current prices.
///
/// Lookups for all lines are issued concurrently. A product that does not
/// exist drops its line; any other lookup error fails the whole pricing.
/// Amounts that overflow fail with `ValidationError::AmountOverflow`.
pub struct PricingCalculator<K: CatalogService> {
    catalog: Arc<K>,
    call_timeout: Duration,
}

impl<K: CatalogService> PricingCalculator<K> {
    pub fn new(catalog: Arc<K>, call_timeout: Duration) -> Self {
        Self {
            catalog,
            call_timeout,
        }
    }

    #[tracing::instrument(skip(self, cart), fields(user_id = %cart.user_id, lines = cart.items.len()))]
    pub async fn price(&self, cart: &Cart) -> Result<PricedCart> {
        let lookups = cart.items.iter().map(|line| self.price_line(line));
        let lines = try_join_all(lookups).await?;
        let priced = PricedCart::from_lines(lines).inspect_err(|e| {
            tracing::warn!(error = %e, "cart total out of range");
        })?;

        if !priced.dropped.is_empty() {
            metrics::counter!("checkout_dropped_items_total")
                .increment(priced.dropped.len() as u64);
            tracing::info!(dropped = ?priced.dropped, "dropped cart lines for unknown products");
        }

        Ok(priced)
    }

    /// Inner `Err` means the product is gone and the line is dropped.
    async fn price_line(&self, line: &CartItem) -> Result<std::result::Result<PricedItem, ProductId>> {
        let product = bounded(
            checkout_flow::STEP_LOOKUP_PRODUCT,
            self.call_timeout,
            self.catalog.get_product(&line.product_id),
        )
        .await
        .map_err(|source| {
            tracing::warn!(product_id = %line.product_id, error = %source, "catalog lookup failed");
            CheckoutError::Upstream {
                step: checkout_flow::STEP_PRICE_CART,
                source,
            }
        })?;

        match product {
            Some(product) => {
                let item = PricedItem::new(line.product_id.clone(), line.quantity, product.price)?;
                Ok(Ok(item))
            }
            None => Ok(Err(line.product_id.clone())),
        }
    }
}
