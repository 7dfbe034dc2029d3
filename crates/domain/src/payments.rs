//! Payment attempts against orders.

use std::sync::Arc;

use chrono::Utc;
use model::{
    ActorContext, Money, Order, OrderId, OrderStatus, Payment, PaymentId, PaymentMethod,
    PaymentStatus,
};
use serde::Serialize;
use serde_json::json;
use store::Store;

use crate::audit::AuditRecorder;
use crate::error::DomainError;
use crate::orders::transition;

/// Result of one payment attempt: the appended payment row and the order as
/// it stands afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub order: Order,
}

/// Records payment attempts and flips paid orders through the state machine.
pub struct PaymentService<S> {
    store: Arc<S>,
    audit: AuditRecorder<S>,
}

impl<S> Clone for PaymentService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            audit: self.audit.clone(),
        }
    }
}

impl<S: Store> PaymentService<S> {
    pub fn new(store: Arc<S>) -> Self {
        let audit = AuditRecorder::new(Arc::clone(&store));
        Self { store, audit }
    }

    /// Attempts to pay an order.
    ///
    /// Every attempt appends a payment row. `amount >= order.total` makes
    /// the attempt succeed and moves the order `New -> Paid`; a short amount
    /// records a failure and leaves the order untouched. Overpayment is
    /// accepted as-is, no change is tracked.
    #[tracing::instrument(skip(self, actor))]
    pub async fn pay_order(
        &self,
        order_id: OrderId,
        amount: Money,
        method: PaymentMethod,
        txn_ref: String,
        actor: &ActorContext,
    ) -> Result<PaymentOutcome, DomainError> {
        let mut order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))?;
        if !actor.can_access(order.customer_id) {
            return Err(DomainError::Forbidden);
        }
        // Any attempt against an already-paid (or later) order is rejected
        // before a row is written.
        if !order.status.can_transition_to(OrderStatus::Paid) {
            return Err(DomainError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Paid,
            });
        }

        let succeeded = amount >= order.total;
        let payment = Payment {
            id: PaymentId::new(),
            order_id,
            method,
            amount,
            status: if succeeded {
                PaymentStatus::Succeeded
            } else {
                PaymentStatus::Failed
            },
            txn_ref,
            created_at: Utc::now(),
        };

        if succeeded {
            let change = transition(&mut order, OrderStatus::Paid)?;
            self.store
                .commit_payment(&payment, Some((&order, &change)))
                .await?;
            metrics::counter!("payments_succeeded_total").increment(1);
        } else {
            self.store.commit_payment(&payment, None).await?;
            metrics::counter!("payments_failed_total").increment(1);
        }

        self.audit
            .record(
                actor,
                "PAY_ORDER",
                "order",
                order_id,
                json!({ "amount": amount, "status": payment.status }),
            )
            .await;
        Ok(PaymentOutcome { payment, order })
    }
}
