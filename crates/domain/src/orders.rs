//! Checkout and the order state machine.

use std::sync::Arc;

use chrono::Utc;
use model::{
    ActorContext, AddressSnapshot, CartId, CustomerId, Money, Order, OrderId, OrderItem,
    OrderStatus, Payment, Shipment, StatusChange,
};
use serde::Serialize;
use serde_json::json;
use store::{CheckoutCommit, Store, StoreError};

use crate::audit::AuditRecorder;
use crate::error::DomainError;

/// An order together with its append-only side records.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub payments: Vec<Payment>,
    pub history: Vec<StatusChange>,
    pub shipment: Option<Shipment>,
}

/// Validates a status flip against the transition table and applies it.
///
/// Every status change in the system, including the ones driven by payments
/// and shipping, goes through here.
pub(crate) fn transition(
    order: &mut Order,
    to: OrderStatus,
) -> Result<StatusChange, DomainError> {
    let from = order.status;
    if !from.can_transition_to(to) {
        return Err(DomainError::InvalidTransition { from, to });
    }
    order.status = to;
    Ok(StatusChange::new(order.id, Some(from), to))
}

/// Checkout, status transitions, and order queries.
pub struct OrderService<S> {
    store: Arc<S>,
    audit: AuditRecorder<S>,
}

impl<S> Clone for OrderService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            audit: self.audit.clone(),
        }
    }
}

impl<S: Store> OrderService<S> {
    pub fn new(store: Arc<S>) -> Self {
        let audit = AuditRecorder::new(Arc::clone(&store));
        Self { store, audit }
    }

    /// Converts an active cart into an order.
    ///
    /// Prices and the shipping address are frozen at this moment; stock is
    /// decremented and the cart marked checked-out in the same atomic
    /// commit, so a concurrent checkout over the same product can never
    /// oversell.
    #[tracing::instrument(skip(self, actor))]
    pub async fn create_order_from_cart(
        &self,
        cart_id: CartId,
        actor: &ActorContext,
    ) -> Result<Order, DomainError> {
        let cart = self
            .store
            .get_cart(cart_id)
            .await?
            .ok_or_else(|| DomainError::not_found("cart", cart_id))?;
        if !actor.can_access(cart.customer_id) {
            return Err(DomainError::Forbidden);
        }
        if cart.is_empty() {
            return Err(DomainError::EmptyCart);
        }
        if !cart.is_active() {
            return Err(DomainError::CartNotActive(cart.status));
        }
        let address = self
            .store
            .default_shipping_address(cart.customer_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found("default shipping address", cart.customer_id)
            })?;

        let mut items = Vec::with_capacity(cart.items.len());
        let mut stock_decrements = Vec::with_capacity(cart.items.len());
        let mut subtotal = Money::zero();
        for line in &cart.items {
            let product = self
                .store
                .get_product(line.product_id)
                .await?
                .ok_or_else(|| DomainError::not_found("product", line.product_id))?;
            if product.stock < line.quantity {
                return Err(DomainError::InsufficientStock {
                    product: product.name,
                });
            }
            let item = OrderItem::capture(&product, line.quantity);
            subtotal += item.line_total;
            items.push(item);
            stock_decrements.push((line.product_id, line.quantity));
        }

        let vat_total = subtotal.vat();
        let order = Order {
            id: OrderId::new(),
            customer_id: cart.customer_id,
            cart_id: cart.id,
            status: OrderStatus::New,
            order_date: Utc::now(),
            subtotal,
            vat_total,
            total: subtotal + vat_total,
            items,
            shipping_address: AddressSnapshot::from(&address),
        };
        let order_id = order.id;
        let total = order.total;

        let result = self
            .store
            .commit_checkout(CheckoutCommit {
                initial_change: StatusChange::new(order_id, None, OrderStatus::New),
                stock_decrements,
                cart_id: cart.id,
                order: order.clone(),
            })
            .await;
        match result {
            Ok(()) => {}
            // Another checkout won the race between our stock read and the
            // commit's conditional decrement.
            Err(StoreError::StockConflict(product_id)) => {
                let product = self
                    .store
                    .get_product(product_id)
                    .await?
                    .map(|p| p.name)
                    .unwrap_or_else(|| product_id.to_string());
                return Err(DomainError::InsufficientStock { product });
            }
            Err(other) => return Err(other.into()),
        }

        metrics::counter!("orders_created_total").increment(1);
        self.audit
            .record(
                actor,
                "CREATE_ORDER",
                "order",
                order_id,
                json!({ "cart_id": cart.id, "total": total }),
            )
            .await;
        Ok(order)
    }

    /// Applies an explicit status transition.
    #[tracing::instrument(skip(self, actor))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        to: OrderStatus,
        actor: &ActorContext,
    ) -> Result<Order, DomainError> {
        let mut order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))?;
        if !actor.can_access(order.customer_id) {
            return Err(DomainError::Forbidden);
        }
        let change = transition(&mut order, to)?;
        self.store.commit_status_change(&order, &change).await?;
        self.audit
            .record(
                actor,
                "UPDATE_ORDER_STATUS",
                "order",
                order_id,
                json!({ "from": change.from, "to": change.to }),
            )
            .await;
        Ok(order)
    }

    /// Returns an order with its payments, history, and shipment.
    #[tracing::instrument(skip(self, actor))]
    pub async fn get_order(
        &self,
        order_id: OrderId,
        actor: &ActorContext,
    ) -> Result<OrderDetails, DomainError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))?;
        if !actor.can_access(order.customer_id) {
            return Err(DomainError::Forbidden);
        }
        let payments = self.store.payments_for_order(order_id).await?;
        let history = self.store.history_for_order(order_id).await?;
        let shipment = self.store.shipment_for_order(order_id).await?;
        Ok(OrderDetails {
            order,
            payments,
            history,
            shipment,
        })
    }

    /// Lists every order in the system. Admin only.
    #[tracing::instrument(skip(self, actor))]
    pub async fn list_orders(&self, actor: &ActorContext) -> Result<Vec<Order>, DomainError> {
        if !actor.is_admin() {
            return Err(DomainError::Forbidden);
        }
        Ok(self.store.list_orders().await?)
    }

    /// Lists one customer's orders. Owner or admin.
    #[tracing::instrument(skip(self, actor))]
    pub async fn orders_for_customer(
        &self,
        customer_id: CustomerId,
        actor: &ActorContext,
    ) -> Result<Vec<Order>, DomainError> {
        if !actor.can_access(customer_id) {
            return Err(DomainError::Forbidden);
        }
        Ok(self.store.orders_for_customer(customer_id).await?)
    }
}
