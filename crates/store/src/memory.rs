use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{
    Address, AddressType, AuditRecord, Cart, CartId, CartStatus, Customer, CustomerId, Order,
    OrderId, Payment, Product, ProductId, Shipment, StatusChange,
};
use tokio::sync::RwLock;

use crate::store::{CheckoutCommit, Store};
use crate::{Result, StoreError};

#[derive(Default)]
struct State {
    products: HashMap<ProductId, Product>,
    customers: HashMap<CustomerId, Customer>,
    addresses: Vec<Address>,
    carts: HashMap<CartId, Cart>,
    orders: HashMap<OrderId, Order>,
    payments: Vec<Payment>,
    history: Vec<StatusChange>,
    shipments: Vec<Shipment>,
    audit: Vec<AuditRecord>,
}

/// In-memory store for tests and standalone runs.
///
/// The whole state sits behind one `RwLock`, so every commit unit is a
/// single critical section and therefore trivially atomic: validations run
/// under the write lock before any mutation is applied.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of audit records, for tests.
    pub async fn audit_count(&self) -> usize {
        self.state.read().await.audit.len()
    }
}

fn not_found(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

/// Rejects a status flip when a concurrent commit already moved the order
/// past the state the change was validated against.
fn guard_status(existing: &Order, change: &StatusChange) -> Result<()> {
    if let Some(expected) = change.from {
        if existing.status != expected {
            return Err(StoreError::StatusConflict {
                order: existing.id,
                expected,
            });
        }
    }
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_product(&self, product: &Product) -> Result<()> {
        self.state
            .write()
            .await
            .products
            .insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        let mut products: Vec<_> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let mut state = self.state.write().await;
        match state.products.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(())
            }
            None => Err(not_found("product", product.id)),
        }
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        self.state
            .write()
            .await
            .customers
            .insert(customer.id, customer.clone());
        Ok(())
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.state.read().await.customers.get(&id).cloned())
    }

    async fn insert_address(&self, address: &Address) -> Result<()> {
        let mut state = self.state.write().await;
        if address.is_default {
            for existing in state
                .addresses
                .iter_mut()
                .filter(|a| a.customer_id == address.customer_id && a.kind == address.kind)
            {
                existing.is_default = false;
            }
        }
        state.addresses.push(address.clone());
        Ok(())
    }

    async fn addresses_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Address>> {
        Ok(self
            .state
            .read()
            .await
            .addresses
            .iter()
            .filter(|a| a.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn default_shipping_address(&self, customer_id: CustomerId) -> Result<Option<Address>> {
        Ok(self
            .state
            .read()
            .await
            .addresses
            .iter()
            .find(|a| {
                a.customer_id == customer_id && a.kind == AddressType::Shipping && a.is_default
            })
            .cloned())
    }

    async fn insert_cart(&self, cart: &Cart) -> Result<()> {
        self.state.write().await.carts.insert(cart.id, cart.clone());
        Ok(())
    }

    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>> {
        Ok(self.state.read().await.carts.get(&id).cloned())
    }

    async fn update_cart(&self, cart: &Cart) -> Result<()> {
        let mut state = self.state.write().await;
        match state.carts.get_mut(&cart.id) {
            Some(existing) => {
                *existing = cart.clone();
                Ok(())
            }
            None => Err(not_found("cart", cart.id)),
        }
    }

    async fn active_cart(&self, customer_id: CustomerId) -> Result<Option<Cart>> {
        Ok(self
            .state
            .read()
            .await
            .carts
            .values()
            .find(|c| c.customer_id == customer_id && c.status == CartStatus::New)
            .cloned())
    }

    async fn expired_carts(&self, now: DateTime<Utc>) -> Result<Vec<Cart>> {
        Ok(self
            .state
            .read()
            .await
            .carts
            .values()
            .filter(|c| c.status == CartStatus::New && c.expires_at < now)
            .cloned()
            .collect())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state.orders.values().cloned().collect();
        orders.sort_by_key(|o| o.order_date);
        Ok(orders)
    }

    async fn orders_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.order_date);
        Ok(orders)
    }

    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        Ok(self
            .state
            .read()
            .await
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn history_for_order(&self, order_id: OrderId) -> Result<Vec<StatusChange>> {
        Ok(self
            .state
            .read()
            .await
            .history
            .iter()
            .filter(|h| h.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn shipment_for_order(&self, order_id: OrderId) -> Result<Option<Shipment>> {
        Ok(self
            .state
            .read()
            .await
            .shipments
            .iter()
            .find(|s| s.order_id == order_id)
            .cloned())
    }

    async fn commit_checkout(&self, commit: CheckoutCommit) -> Result<()> {
        let mut state = self.state.write().await;

        // Validate everything before mutating anything.
        for (product_id, quantity) in &commit.stock_decrements {
            let product = state
                .products
                .get(product_id)
                .ok_or_else(|| not_found("product", product_id))?;
            if product.stock < *quantity {
                return Err(StoreError::StockConflict(*product_id));
            }
        }
        if !state.carts.contains_key(&commit.cart_id) {
            return Err(not_found("cart", commit.cart_id));
        }

        for (product_id, quantity) in &commit.stock_decrements {
            if let Some(product) = state.products.get_mut(product_id) {
                product.stock -= quantity;
            }
        }
        state.orders.insert(commit.order.id, commit.order);
        state.history.push(commit.initial_change);
        if let Some(cart) = state.carts.get_mut(&commit.cart_id) {
            cart.status = CartStatus::CheckedOut;
            cart.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn commit_status_change(&self, order: &Order, change: &StatusChange) -> Result<()> {
        let mut state = self.state.write().await;
        let existing = state
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| not_found("order", order.id))?;
        guard_status(existing, change)?;
        *existing = order.clone();
        state.history.push(change.clone());
        Ok(())
    }

    async fn commit_payment(
        &self,
        payment: &Payment,
        status_change: Option<(&Order, &StatusChange)>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some((order, change)) = status_change {
            let existing = state
                .orders
                .get_mut(&order.id)
                .ok_or_else(|| not_found("order", order.id))?;
            guard_status(existing, change)?;
            *existing = order.clone();
            state.history.push(change.clone());
        }
        state.payments.push(payment.clone());
        Ok(())
    }

    async fn commit_shipment(
        &self,
        shipment: &Shipment,
        order: &Order,
        change: &StatusChange,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let existing = state
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| not_found("order", order.id))?;
        guard_status(existing, change)?;
        *existing = order.clone();
        state.shipments.push(shipment.clone());
        state.history.push(change.clone());
        Ok(())
    }

    async fn commit_delivery(
        &self,
        shipment: &Shipment,
        order: &Order,
        change: &StatusChange,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let existing_order = state
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| not_found("order", order.id))?;
        guard_status(existing_order, change)?;
        *existing_order = order.clone();
        let existing_shipment = state
            .shipments
            .iter_mut()
            .find(|s| s.id == shipment.id)
            .ok_or_else(|| not_found("shipment", shipment.id))?;
        *existing_shipment = shipment.clone();
        state.history.push(change.clone());
        Ok(())
    }

    async fn append_audit(&self, record: &AuditRecord) -> Result<()> {
        self.state.write().await.audit.push(record.clone());
        Ok(())
    }

    async fn audit_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditRecord>> {
        Ok(self
            .state
            .read()
            .await
            .audit
            .iter()
            .filter(|r| r.entity_type == entity_type && r.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use model::{AddressId, Money, OrderStatus};

    fn address(customer_id: CustomerId, kind: AddressType, is_default: bool) -> Address {
        Address {
            id: AddressId::new(),
            customer_id,
            line1: "1 Main St".into(),
            line2: None,
            city: "Springfield".into(),
            region: None,
            postal_code: "12345".into(),
            country: "US".into(),
            kind,
            is_default,
        }
    }

    fn checkout_fixture(store_stock: u32, ordered: u32) -> (MemoryStore, Product, Cart) {
        let store = MemoryStore::new();
        let product = Product::new("Widget", Money::from_major(500), store_stock);
        let mut cart = Cart::new(CustomerId::new(), Utc::now(), Duration::hours(2));
        cart.upsert_item(product.id, ordered);
        (store, product, cart)
    }

    fn order_for(cart: &Cart, product: &Product, quantity: u32) -> Order {
        let item = model::OrderItem::capture(product, quantity);
        let subtotal = item.line_total;
        Order {
            id: OrderId::new(),
            customer_id: cart.customer_id,
            cart_id: cart.id,
            status: OrderStatus::New,
            order_date: Utc::now(),
            subtotal,
            vat_total: subtotal.vat(),
            total: subtotal + subtotal.vat(),
            items: vec![item],
            shipping_address: model::AddressSnapshot {
                line1: "1 Main St".into(),
                line2: None,
                city: "Springfield".into(),
                region: None,
                postal_code: "12345".into(),
                country: "US".into(),
            },
        }
    }

    #[tokio::test]
    async fn default_shipping_address_ignores_billing_and_non_default() {
        let store = MemoryStore::new();
        let customer = CustomerId::new();
        store
            .insert_address(&address(customer, AddressType::Billing, true))
            .await
            .unwrap();
        store
            .insert_address(&address(customer, AddressType::Shipping, false))
            .await
            .unwrap();
        assert!(
            store
                .default_shipping_address(customer)
                .await
                .unwrap()
                .is_none()
        );

        store
            .insert_address(&address(customer, AddressType::Shipping, true))
            .await
            .unwrap();
        assert!(
            store
                .default_shipping_address(customer)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn inserting_new_default_clears_previous_same_kind_default() {
        let store = MemoryStore::new();
        let customer = CustomerId::new();
        let first = address(customer, AddressType::Shipping, true);
        store.insert_address(&first).await.unwrap();
        let second = address(customer, AddressType::Shipping, true);
        store.insert_address(&second).await.unwrap();

        let current = store
            .default_shipping_address(customer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.id, second.id);
        let defaults: usize = store
            .addresses_for_customer(customer)
            .await
            .unwrap()
            .iter()
            .filter(|a| a.is_default)
            .count();
        assert_eq!(defaults, 1);
    }

    #[tokio::test]
    async fn commit_checkout_applies_everything() {
        let (store, product, cart) = checkout_fixture(10, 2);
        store.insert_product(&product).await.unwrap();
        store.insert_cart(&cart).await.unwrap();

        let order = order_for(&cart, &product, 2);
        let order_id = order.id;
        store
            .commit_checkout(CheckoutCommit {
                initial_change: StatusChange::new(order_id, None, OrderStatus::New),
                stock_decrements: vec![(product.id, 2)],
                cart_id: cart.id,
                order,
            })
            .await
            .unwrap();

        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 8);
        assert_eq!(
            store.get_cart(cart.id).await.unwrap().unwrap().status,
            CartStatus::CheckedOut
        );
        assert!(store.get_order(order_id).await.unwrap().is_some());
        assert_eq!(store.history_for_order(order_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn commit_checkout_rolls_back_on_stock_conflict() {
        let (store, product, cart) = checkout_fixture(1, 2);
        store.insert_product(&product).await.unwrap();
        store.insert_cart(&cart).await.unwrap();

        let order = order_for(&cart, &product, 2);
        let order_id = order.id;
        let err = store
            .commit_checkout(CheckoutCommit {
                initial_change: StatusChange::new(order_id, None, OrderStatus::New),
                stock_decrements: vec![(product.id, 2)],
                cart_id: cart.id,
                order,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::StockConflict(id) if id == product.id));
        // Nothing was applied.
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 1);
        assert!(store.get_order(order_id).await.unwrap().is_none());
        assert_eq!(
            store.get_cart(cart.id).await.unwrap().unwrap().status,
            CartStatus::New
        );
        assert!(store.history_for_order(order_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_flip_is_guarded_against_concurrent_commits() {
        let (store, product, cart) = checkout_fixture(10, 1);
        store.insert_product(&product).await.unwrap();
        store.insert_cart(&cart).await.unwrap();
        let mut order = order_for(&cart, &product, 1);
        let order_id = order.id;
        store
            .commit_checkout(CheckoutCommit {
                initial_change: StatusChange::new(order_id, None, OrderStatus::New),
                stock_decrements: vec![(product.id, 1)],
                cart_id: cart.id,
                order: order.clone(),
            })
            .await
            .unwrap();

        order.status = OrderStatus::Paid;
        let winner = StatusChange::new(order_id, Some(OrderStatus::New), OrderStatus::Paid);
        store.commit_status_change(&order, &winner).await.unwrap();

        // A flip validated against the pre-payment state misses the guard.
        let stale = StatusChange::new(order_id, Some(OrderStatus::New), OrderStatus::Paid);
        let err = store
            .commit_status_change(&order, &stale)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::StatusConflict { expected: OrderStatus::New, .. }
        ));
        assert_eq!(store.history_for_order(order_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn active_cart_skips_checked_out_and_expired() {
        let store = MemoryStore::new();
        let customer = CustomerId::new();
        let mut cart = Cart::new(customer, Utc::now(), Duration::hours(2));
        cart.status = CartStatus::Expired;
        store.insert_cart(&cart).await.unwrap();
        assert!(store.active_cart(customer).await.unwrap().is_none());

        let live = Cart::new(customer, Utc::now(), Duration::hours(2));
        store.insert_cart(&live).await.unwrap();
        assert_eq!(store.active_cart(customer).await.unwrap().unwrap().id, live.id);
    }

    #[tokio::test]
    async fn expired_carts_filters_by_status_and_deadline() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let stale = Cart::new(CustomerId::new(), now - Duration::hours(3), Duration::hours(2));
        let fresh = Cart::new(CustomerId::new(), now, Duration::hours(2));
        let mut done = Cart::new(CustomerId::new(), now - Duration::hours(3), Duration::hours(2));
        done.status = CartStatus::CheckedOut;
        for cart in [&stale, &fresh, &done] {
            store.insert_cart(cart).await.unwrap();
        }

        let expired = store.expired_carts(now).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, stale.id);
    }

    #[tokio::test]
    async fn update_of_missing_rows_reports_not_found() {
        let store = MemoryStore::new();
        let product = Product::new("Ghost", Money::from_major(1), 0);
        let err = store.update_product(&product).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "product", .. }));
    }

    #[tokio::test]
    async fn audit_filtering() {
        let store = MemoryStore::new();
        let record = AuditRecord::new(
            "system",
            "CREATE_CART",
            "Cart",
            "abc",
            serde_json::json!({}),
        );
        store.append_audit(&record).await.unwrap();
        assert_eq!(store.audit_for_entity("Cart", "abc").await.unwrap().len(), 1);
        assert!(store.audit_for_entity("Order", "abc").await.unwrap().is_empty());
    }
}
