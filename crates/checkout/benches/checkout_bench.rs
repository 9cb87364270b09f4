use std::sync::Arc;
use std::time::Duration;

use checkout::{
    Address, Cart, CartItem, CheckoutConfig, CheckoutContext, CheckoutOrchestrator,
    CheckoutRequest, CreditCard, InMemoryCartService, InMemoryCatalogService,
    InMemoryNotificationBus, InMemoryOrderLedger, InMemoryPaymentService, PricingCalculator,
};
use common::{Money, UserId};
use criterion::{Criterion, criterion_group, criterion_main};

fn request(user_id: u32) -> CheckoutRequest {
    CheckoutRequest {
        user_id: UserId::new(user_id),
        email: "bench@example.com".to_string(),
        address: Some(Address {
            street_address: "1 Bench Way".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            country: "US".to_string(),
            zip_code: "62701".to_string(),
        }),
        credit_card: CreditCard {
            number: "4111111111111111".to_string(),
            cvv: "123".to_string(),
            expiration_year: 2035,
            expiration_month: 12,
        },
    }
}

fn seeded_catalog(products: usize) -> InMemoryCatalogService {
    let catalog = InMemoryCatalogService::new();
    for i in 0..products {
        catalog.add_product(
            format!("SKU-{i}"),
            format!("Product {i}"),
            Money::from_cents(100 + i as i64),
        );
    }
    catalog
}

fn bench_pricing(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let pricing = PricingCalculator::new(Arc::new(seeded_catalog(50)), Duration::from_secs(1));
    let cart = Cart {
        user_id: UserId::new(1),
        items: (0..50)
            .map(|i| CartItem::new(format!("SKU-{i}"), 2))
            .collect(),
    };

    c.bench_function("checkout/price_50_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                pricing.price(&cart).await.unwrap();
            });
        });
    });
}

fn bench_full_checkout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cart = InMemoryCartService::new();
    let orchestrator = CheckoutOrchestrator::new(
        cart.clone(),
        seeded_catalog(10),
        InMemoryOrderLedger::new(),
        InMemoryPaymentService::new(),
        InMemoryNotificationBus::new(),
        CheckoutConfig::default(),
    );
    let mut next_user = 0u32;

    c.bench_function("checkout/full_run_5_lines", |b| {
        b.iter(|| {
            next_user += 1;
            for i in 0..5 {
                cart.add_item(UserId::new(next_user), format!("SKU-{i}"), 1);
            }
            rt.block_on(async {
                orchestrator
                    .checkout(request(next_user), &CheckoutContext::background())
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_pricing, bench_full_checkout);
criterion_main!(benches);
