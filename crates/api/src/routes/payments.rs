//! Payment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::PaymentOutcome;
use model::{Money, OrderId, PaymentMethod};
use serde::Deserialize;
use store::Store;

use crate::AppState;
use crate::auth::Actor;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct PayRequest {
    pub amount: Money,
    pub method: PaymentMethod,
    pub txn_ref: String,
}

/// POST /payments/{order_id}/pay — records a payment attempt.
#[tracing::instrument(skip(state, actor, req))]
pub async fn pay<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<OrderId>,
    Actor(actor): Actor,
    Json(req): Json<PayRequest>,
) -> Result<Json<PaymentOutcome>, ApiError> {
    let outcome = state
        .payments
        .pay_order(order_id, req.amount, req.method, req.txn_ref, &actor)
        .await?;
    Ok(Json(outcome))
}
