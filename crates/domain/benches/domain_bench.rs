use std::sync::Arc;

use chrono::Duration;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{CartService, CatalogService, CustomerService, NewAddress, OrderService};
use model::{ActorContext, AddressType, Cart, Customer, Money, Product};
use store::MemoryStore;

struct Seeded {
    carts: CartService<MemoryStore>,
    orders: OrderService<MemoryStore>,
    product: Product,
    customer: Customer,
    actor: ActorContext,
}

async fn seed(stock: u32) -> Seeded {
    let store = Arc::new(MemoryStore::new());
    let catalog = CatalogService::new(Arc::clone(&store));
    let customers = CustomerService::new(Arc::clone(&store));
    let carts = CartService::new(Arc::clone(&store), Duration::hours(2));
    let orders = OrderService::new(Arc::clone(&store));

    let admin = ActorContext::admin();
    let product = catalog
        .create_product("Bench Widget".into(), Money::from_major(500), stock, &admin)
        .await
        .unwrap();
    let customer = customers
        .create_customer("Bench".into(), "bench@example.com".into(), &admin)
        .await
        .unwrap();
    let actor = ActorContext::customer(customer.id);
    customers
        .add_address(
            customer.id,
            NewAddress {
                line1: "1 Main St".into(),
                line2: None,
                city: "Springfield".into(),
                region: None,
                postal_code: "12345".into(),
                country: "US".into(),
                kind: AddressType::Shipping,
                is_default: true,
            },
            &actor,
        )
        .await
        .unwrap();

    Seeded {
        carts,
        orders,
        product,
        customer,
        actor,
    }
}

async fn fill_cart(s: &Seeded) -> Cart {
    let cart = s.carts.active_cart(s.customer.id, &s.actor).await.unwrap();
    s.carts
        .add_product(cart.id, s.product.id, 1, &s.actor)
        .await
        .unwrap()
}

fn bench_add_to_cart(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let s = rt.block_on(seed(u32::MAX));
    let cart = rt.block_on(async { s.carts.active_cart(s.customer.id, &s.actor).await.unwrap() });

    c.bench_function("domain/add_to_cart", |b| {
        b.iter(|| {
            rt.block_on(async {
                s.carts
                    .add_product(cart.id, s.product.id, 1, &s.actor)
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_checkout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let s = rt.block_on(seed(u32::MAX));

    c.bench_function("domain/checkout", |b| {
        b.iter(|| {
            rt.block_on(async {
                let cart = fill_cart(&s).await;
                s.orders
                    .create_order_from_cart(cart.id, &s.actor)
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_add_to_cart, bench_checkout);
criterion_main!(benches);
