//! Catalog service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{Money, ProductId};

use crate::error::ServiceError;

/// A catalog product with its current price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
}

/// Trait for catalog lookups.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Returns the product, or `None` if it does not exist.
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    products: HashMap<ProductId, Product>,
    latency: HashMap<ProductId, Duration>,
    unavailable: bool,
    lookups: usize,
}

/// In-memory catalog for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogService {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryCatalogService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub fn add_product(&self, id: impl Into<ProductId>, name: impl Into<String>, price: Money) {
        let id = id.into();
        let product = Product {
            id: id.clone(),
            name: name.into(),
            price,
        };
        self.state.write().unwrap().products.insert(id, product);
    }

    /// Removes a product so later lookups report it as missing.
    pub fn remove_product(&self, id: &ProductId) {
        self.state.write().unwrap().products.remove(id);
    }

    /// Configures every lookup to fail as if the catalog were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Delays lookups of one product.
    pub fn set_latency(&self, id: impl Into<ProductId>, latency: Duration) {
        self.state.write().unwrap().latency.insert(id.into(), latency);
    }

    /// Returns how many product lookups were made.
    pub fn lookup_count(&self) -> usize {
        self.state.read().unwrap().lookups
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalogService {
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>, ServiceError> {
        let latency = {
            let mut state = self.state.write().unwrap();
            state.lookups += 1;
            state.latency.get(product_id).copied()
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let state = self.state.read().unwrap();
        if state.unavailable {
            return Err(ServiceError::Unavailable("catalog unreachable".to_string()));
        }
        Ok(state.products.get(product_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_existing_and_missing() {
        let catalog = InMemoryCatalogService::new();
        catalog.add_product("A", "Widget", Money::from_cents(1000));

        let product = catalog.get_product(&"A".into()).await.unwrap().unwrap();
        assert_eq!(product.price, Money::from_cents(1000));
        assert!(catalog.get_product(&"B".into()).await.unwrap().is_none());
        assert_eq!(catalog.lookup_count(), 2);

        catalog.remove_product(&"A".into());
        assert!(catalog.get_product(&"A".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let catalog = InMemoryCatalogService::new();
        catalog.set_unavailable(true);
        assert!(catalog.get_product(&"A".into()).await.is_err());
    }
}
