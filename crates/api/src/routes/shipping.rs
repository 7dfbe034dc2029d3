//! Shipping endpoints (admin only).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::ShippingOutcome;
use model::OrderId;
use serde::Deserialize;
use store::Store;

use crate::AppState;
use crate::auth::Actor;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct ShipRequest {
    pub carrier: String,
}

/// POST /shipping/orders/{id}/ship — ships a paid order.
#[tracing::instrument(skip(state, actor, req))]
pub async fn ship<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<OrderId>,
    Actor(actor): Actor,
    Json(req): Json<ShipRequest>,
) -> Result<Json<ShippingOutcome>, ApiError> {
    let outcome = state
        .shipping
        .ship_order(order_id, req.carrier, &actor)
        .await?;
    Ok(Json(outcome))
}

/// POST /shipping/orders/{id}/deliver — marks a shipped order delivered.
#[tracing::instrument(skip(state, actor))]
pub async fn deliver<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<OrderId>,
    Actor(actor): Actor,
) -> Result<Json<ShippingOutcome>, ApiError> {
    let outcome = state.shipping.deliver_order(order_id, &actor).await?;
    Ok(Json(outcome))
}
