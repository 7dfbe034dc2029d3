//! Shipping and delivery. Admin-only operations.

use std::sync::Arc;

use chrono::Utc;
use model::{ActorContext, Order, OrderId, OrderStatus, Shipment, ShipmentId};
use serde::Serialize;
use serde_json::json;
use store::Store;
use uuid::Uuid;

use crate::audit::AuditRecorder;
use crate::error::DomainError;
use crate::orders::transition;

#[derive(Debug, Clone, Serialize)]
pub struct ShippingOutcome {
    pub shipment: Shipment,
    pub order: Order,
}

/// Ships paid orders and marks shipped orders delivered.
pub struct ShippingService<S> {
    store: Arc<S>,
    audit: AuditRecorder<S>,
}

impl<S> Clone for ShippingService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            audit: self.audit.clone(),
        }
    }
}

impl<S: Store> ShippingService<S> {
    pub fn new(store: Arc<S>) -> Self {
        let audit = AuditRecorder::new(Arc::clone(&store));
        Self { store, audit }
    }

    /// Creates the order's shipment and moves it `Paid -> Shipped`.
    #[tracing::instrument(skip(self, actor))]
    pub async fn ship_order(
        &self,
        order_id: OrderId,
        carrier: String,
        actor: &ActorContext,
    ) -> Result<ShippingOutcome, DomainError> {
        if !actor.is_admin() {
            return Err(DomainError::Forbidden);
        }
        let mut order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))?;
        if order.status != OrderStatus::Paid {
            return Err(DomainError::NotPaid(order.status));
        }

        let shipment = Shipment {
            id: ShipmentId::new(),
            order_id,
            carrier,
            tracking_number: format!("TRK-{}", Uuid::new_v4().simple()),
            shipped_at: Utc::now(),
            delivered_at: None,
        };
        let change = transition(&mut order, OrderStatus::Shipped)?;
        self.store
            .commit_shipment(&shipment, &order, &change)
            .await?;

        metrics::counter!("orders_shipped_total").increment(1);
        self.audit
            .record(
                actor,
                "SHIP_ORDER",
                "order",
                order_id,
                json!({
                    "carrier": &shipment.carrier,
                    "tracking_number": &shipment.tracking_number,
                }),
            )
            .await;
        Ok(ShippingOutcome { shipment, order })
    }

    /// Stamps the shipment delivered and moves the order
    /// `Shipped -> Delivered`.
    #[tracing::instrument(skip(self, actor))]
    pub async fn deliver_order(
        &self,
        order_id: OrderId,
        actor: &ActorContext,
    ) -> Result<ShippingOutcome, DomainError> {
        if !actor.is_admin() {
            return Err(DomainError::Forbidden);
        }
        let mut order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))?;
        if order.status != OrderStatus::Shipped {
            return Err(DomainError::NotShipped(order.status));
        }
        // A shipped order without a shipment row is an internal
        // inconsistency, surfaced as a not-found.
        let mut shipment = self
            .store
            .shipment_for_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("shipment", order_id))?;

        shipment.delivered_at = Some(Utc::now());
        let change = transition(&mut order, OrderStatus::Delivered)?;
        self.store
            .commit_delivery(&shipment, &order, &change)
            .await?;

        metrics::counter!("orders_delivered_total").increment(1);
        self.audit
            .record(
                actor,
                "DELIVER_ORDER",
                "order",
                order_id,
                json!({ "tracking_number": &shipment.tracking_number }),
            )
            .await;
        Ok(ShippingOutcome { shipment, order })
    }
}
