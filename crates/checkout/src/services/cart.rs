//! Cart service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{ProductId, UserId};

use crate::error::ServiceError;

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A user's cart as fetched at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    pub user_id: UserId,
    pub items: Vec<CartItem>,
}

/// Trait for cart store operations.
#[async_trait]
pub trait CartService: Send + Sync {
    /// Returns the user's cart, or `None` if the user has none.
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>, ServiceError>;

    /// Removes every line from the user's cart.
    async fn empty_cart(&self, user_id: UserId) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<UserId, Vec<CartItem>>,
    fail_on_get: bool,
    fail_on_empty: bool,
    get_calls: usize,
    empty_calls: usize,
}

/// In-memory cart store for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartService {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a line, merging quantities for a product already in the cart.
    pub fn add_item(&self, user_id: UserId, product_id: impl Into<ProductId>, quantity: u32) {
        let product_id = product_id.into();
        let mut state = self.state.write().unwrap();
        let items = state.carts.entry(user_id).or_default();
        match items.iter_mut().find(|item| item.product_id == product_id) {
            Some(item) => item.quantity += quantity,
            None => items.push(CartItem::new(product_id, quantity)),
        }
    }

    /// Configures the service to fail cart reads.
    pub fn set_fail_on_get(&self, fail: bool) {
        self.state.write().unwrap().fail_on_get = fail;
    }

    /// Configures the service to fail cart clearing.
    pub fn set_fail_on_empty(&self, fail: bool) {
        self.state.write().unwrap().fail_on_empty = fail;
    }

    /// Returns the number of lines in the user's cart.
    pub fn item_count(&self, user_id: UserId) -> usize {
        self.state
            .read()
            .unwrap()
            .carts
            .get(&user_id)
            .map_or(0, Vec::len)
    }

    /// Returns how many times `get_cart` was called.
    pub fn get_calls(&self) -> usize {
        self.state.read().unwrap().get_calls
    }

    /// Returns how many times `empty_cart` was called.
    pub fn empty_calls(&self) -> usize {
        self.state.read().unwrap().empty_calls
    }
}

#[async_trait]
impl CartService for InMemoryCartService {
    async fn get_cart(&self, user_id: UserId) -> Result<Option<Cart>, ServiceError> {
        let mut state = self.state.write().unwrap();
        state.get_calls += 1;

        if state.fail_on_get {
            return Err(ServiceError::Unavailable("cart store unreachable".to_string()));
        }

        Ok(state.carts.get(&user_id).map(|items| Cart {
            user_id,
            items: items.clone(),
        }))
    }

    async fn empty_cart(&self, user_id: UserId) -> Result<(), ServiceError> {
        let mut state = self.state.write().unwrap();
        state.empty_calls += 1;

        if state.fail_on_empty {
            return Err(ServiceError::Unavailable("cart store unreachable".to_string()));
        }

        state.carts.remove(&user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_get_and_empty() {
        let service = InMemoryCartService::new();
        let user = UserId::new(1);

        service.add_item(user, "A", 1);
        service.add_item(user, "A", 2);
        service.add_item(user, "B", 1);

        let cart = service.get_cart(user).await.unwrap().unwrap();
        assert_eq!(cart.items, vec![CartItem::new("A", 3), CartItem::new("B", 1)]);

        service.empty_cart(user).await.unwrap();
        assert!(service.get_cart(user).await.unwrap().is_none());
        assert_eq!(service.item_count(user), 0);
    }

    #[tokio::test]
    async fn test_missing_cart_is_none() {
        let service = InMemoryCartService::new();
        assert!(service.get_cart(UserId::new(5)).await.unwrap().is_none());
        assert_eq!(service.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_switches() {
        let service = InMemoryCartService::new();
        let user = UserId::new(1);
        service.add_item(user, "A", 1);

        service.set_fail_on_get(true);
        assert!(service.get_cart(user).await.is_err());

        service.set_fail_on_empty(true);
        assert!(service.empty_cart(user).await.is_err());
        assert_eq!(service.item_count(user), 1);
        assert_eq!(service.empty_calls(), 1);
    }
}
