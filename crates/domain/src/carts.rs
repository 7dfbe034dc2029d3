//! Cart management: the mutable pre-checkout basket and its expiry sweep.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use model::{ActorContext, Cart, CartId, CartStatus, CustomerId, Money, ProductId};
use serde::Serialize;
use serde_json::json;
use store::Store;

use crate::audit::AuditRecorder;
use crate::error::DomainError;

/// Live price estimate for a cart. Nothing here is frozen; the numbers can
/// change with every catalog edit until checkout snapshots them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartTotals {
    pub subtotal: Money,
    pub vat: Money,
    pub total: Money,
}

/// Manages carts: lookup-or-create, line mutations, live totals, expiry.
pub struct CartService<S> {
    store: Arc<S>,
    audit: AuditRecorder<S>,
    ttl: Duration,
}

impl<S> Clone for CartService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            audit: self.audit.clone(),
            ttl: self.ttl,
        }
    }
}

impl<S: Store> CartService<S> {
    pub fn new(store: Arc<S>, ttl: Duration) -> Self {
        let audit = AuditRecorder::new(Arc::clone(&store));
        Self { store, audit, ttl }
    }

    /// Returns the customer's active cart, creating one if none exists.
    #[tracing::instrument(skip(self, actor))]
    pub async fn active_cart(
        &self,
        customer_id: CustomerId,
        actor: &ActorContext,
    ) -> Result<Cart, DomainError> {
        if !actor.can_access(customer_id) {
            return Err(DomainError::Forbidden);
        }
        self.store
            .get_customer(customer_id)
            .await?
            .ok_or_else(|| DomainError::not_found("customer", customer_id))?;

        if let Some(cart) = self.store.active_cart(customer_id).await? {
            return Ok(cart);
        }

        let cart = Cart::new(customer_id, Utc::now(), self.ttl);
        self.store.insert_cart(&cart).await?;
        self.audit
            .record(
                actor,
                "CREATE_CART",
                "cart",
                cart.id,
                json!({ "customer_id": customer_id }),
            )
            .await;
        Ok(cart)
    }

    /// Adds `quantity` of a product to the cart, merging with an existing
    /// line. The resulting line quantity must not exceed live stock.
    #[tracing::instrument(skip(self, actor))]
    pub async fn add_product(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
        actor: &ActorContext,
    ) -> Result<Cart, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        let mut cart = self.active_cart_for_update(cart_id, actor).await?;
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", product_id))?;
        if cart.quantity_of(product_id) + quantity > product.stock {
            return Err(DomainError::InsufficientStock {
                product: product.name,
            });
        }

        cart.upsert_item(product_id, quantity);
        cart.updated_at = Utc::now();
        self.store.update_cart(&cart).await?;
        self.audit
            .record(
                actor,
                "ADD_CART_ITEM",
                "cart",
                cart.id,
                json!({ "product_id": product_id, "quantity": quantity }),
            )
            .await;
        Ok(cart)
    }

    /// Removes a product's line entirely.
    #[tracing::instrument(skip(self, actor))]
    pub async fn remove_product(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        actor: &ActorContext,
    ) -> Result<Cart, DomainError> {
        let mut cart = self.active_cart_for_update(cart_id, actor).await?;
        if !cart.remove_item(product_id) {
            return Err(DomainError::not_found("cart item", product_id));
        }
        cart.updated_at = Utc::now();
        self.store.update_cart(&cart).await?;
        self.audit
            .record(
                actor,
                "REMOVE_CART_ITEM",
                "cart",
                cart.id,
                json!({ "product_id": product_id }),
            )
            .await;
        Ok(cart)
    }

    /// Decrements a product's line by one, removing it at zero.
    #[tracing::instrument(skip(self, actor))]
    pub async fn decrement_product(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        actor: &ActorContext,
    ) -> Result<Cart, DomainError> {
        let mut cart = self.active_cart_for_update(cart_id, actor).await?;
        if !cart.decrement_item(product_id) {
            return Err(DomainError::not_found("cart item", product_id));
        }
        cart.updated_at = Utc::now();
        self.store.update_cart(&cart).await?;
        self.audit
            .record(
                actor,
                "DECREMENT_CART_ITEM",
                "cart",
                cart.id,
                json!({ "product_id": product_id }),
            )
            .await;
        Ok(cart)
    }

    /// Empties the cart without touching its status.
    #[tracing::instrument(skip(self, actor))]
    pub async fn clear(
        &self,
        cart_id: CartId,
        actor: &ActorContext,
    ) -> Result<Cart, DomainError> {
        let mut cart = self.active_cart_for_update(cart_id, actor).await?;
        cart.items.clear();
        cart.updated_at = Utc::now();
        self.store.update_cart(&cart).await?;
        self.audit
            .record(actor, "CLEAR_CART", "cart", cart.id, json!({}))
            .await;
        Ok(cart)
    }

    /// Returns a cart with its live price estimate.
    #[tracing::instrument(skip(self, actor))]
    pub async fn get_cart(
        &self,
        cart_id: CartId,
        actor: &ActorContext,
    ) -> Result<(Cart, CartTotals), DomainError> {
        let cart = self
            .store
            .get_cart(cart_id)
            .await?
            .ok_or_else(|| DomainError::not_found("cart", cart_id))?;
        if !actor.can_access(cart.customer_id) {
            return Err(DomainError::Forbidden);
        }

        let mut subtotal = Money::zero();
        for line in &cart.items {
            let product = self
                .store
                .get_product(line.product_id)
                .await?
                .ok_or_else(|| DomainError::not_found("product", line.product_id))?;
            subtotal += product.price.times(line.quantity);
        }
        let vat = subtotal.vat();
        let totals = CartTotals {
            subtotal,
            vat,
            total: subtotal + vat,
        };
        Ok((cart, totals))
    }

    /// Marks every active cart past its deadline as expired.
    ///
    /// Returns the number of carts expired. Each expiry gets an audit record
    /// attributed to the system actor.
    #[tracing::instrument(skip(self))]
    pub async fn expire_carts(&self, now: DateTime<Utc>) -> Result<usize, DomainError> {
        let system = ActorContext::system();
        let expired = self.store.expired_carts(now).await?;
        let count = expired.len();
        for mut cart in expired {
            cart.status = CartStatus::Expired;
            cart.updated_at = now;
            self.store.update_cart(&cart).await?;
            self.audit
                .record(
                    &system,
                    "EXPIRE_CART",
                    "cart",
                    cart.id,
                    json!({ "expires_at": cart.expires_at }),
                )
                .await;
        }
        if count > 0 {
            metrics::counter!("carts_expired_total").increment(count as u64);
            tracing::info!(count, "expired stale carts");
        }
        Ok(count)
    }

    /// Drives [`expire_carts`](Self::expire_carts) on a fixed interval.
    /// Intended to be spawned as a background task; never returns.
    pub async fn run_expiry_sweep(self, every: std::time::Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(error) = self.expire_carts(Utc::now()).await {
                tracing::warn!(%error, "cart expiry sweep failed");
            }
        }
    }

    /// Shared prologue of the mutating operations: the cart must exist,
    /// belong to the actor, and still be in `New`.
    async fn active_cart_for_update(
        &self,
        cart_id: CartId,
        actor: &ActorContext,
    ) -> Result<Cart, DomainError> {
        let cart = self
            .store
            .get_cart(cart_id)
            .await?
            .ok_or_else(|| DomainError::not_found("cart", cart_id))?;
        if !actor.can_access(cart.customer_id) {
            return Err(DomainError::Forbidden);
        }
        if !cart.is_active() {
            return Err(DomainError::CartNotActive(cart.status));
        }
        Ok(cart)
    }
}
