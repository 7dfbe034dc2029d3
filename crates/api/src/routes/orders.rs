//! Checkout and order query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::OrderDetails;
use model::{CartId, CustomerId, Order, OrderId, OrderStatus};
use serde::Deserialize;
use store::Store;

use crate::AppState;
use crate::auth::Actor;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// POST /orders/from-cart/{cart_id} — converts an active cart into an order.
#[tracing::instrument(skip(state, actor))]
pub async fn create_from_cart<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(cart_id): Path<CartId>,
    Actor(actor): Actor,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state.orders.create_order_from_cart(cart_id, &actor).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders/{id} — the order with payments, history, and shipment.
#[tracing::instrument(skip(state, actor))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<OrderId>,
    Actor(actor): Actor,
) -> Result<Json<OrderDetails>, ApiError> {
    let details = state.orders.get_order(order_id, &actor).await?;
    Ok(Json(details))
}

/// GET /orders — every order in the system (admin).
#[tracing::instrument(skip(state, actor))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Actor(actor): Actor,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = state.orders.list_orders(&actor).await?;
    Ok(Json(orders))
}

/// GET /orders/customer/{customer_id} — one customer's orders.
#[tracing::instrument(skip(state, actor))]
pub async fn list_for_customer<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(customer_id): Path<CustomerId>,
    Actor(actor): Actor,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = state.orders.orders_for_customer(customer_id, &actor).await?;
    Ok(Json(orders))
}

/// PUT /orders/{id}/status — explicit status transition.
#[tracing::instrument(skip(state, actor, req))]
pub async fn update_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<OrderId>,
    Actor(actor): Actor,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .orders
        .update_status(order_id, req.status, &actor)
        .await?;
    Ok(Json(order))
}
