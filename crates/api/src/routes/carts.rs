//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::CartTotals;
use model::{Cart, CartId, CustomerId, ProductId};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::AppState;
use crate::auth::Actor;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub cart: Cart,
    pub totals: CartTotals,
}

/// POST /carts/customer/{customer_id} — returns the customer's active cart,
/// creating one if needed.
#[tracing::instrument(skip(state, actor))]
pub async fn get_or_create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(customer_id): Path<CustomerId>,
    Actor(actor): Actor,
) -> Result<Json<Cart>, ApiError> {
    let cart = state.carts.active_cart(customer_id, &actor).await?;
    Ok(Json(cart))
}

/// GET /carts/{cart_id} — the cart with its live price estimate.
#[tracing::instrument(skip(state, actor))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(cart_id): Path<CartId>,
    Actor(actor): Actor,
) -> Result<Json<CartResponse>, ApiError> {
    let (cart, totals) = state.carts.get_cart(cart_id, &actor).await?;
    Ok(Json(CartResponse { cart, totals }))
}

/// POST /carts/{cart_id}/items — adds a product to the cart.
#[tracing::instrument(skip(state, actor, req))]
pub async fn add_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(cart_id): Path<CartId>,
    Actor(actor): Actor,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .carts
        .add_product(cart_id, req.product_id, req.quantity, &actor)
        .await?;
    Ok(Json(cart))
}

/// DELETE /carts/{cart_id}/items/{product_id} — removes a line.
#[tracing::instrument(skip(state, actor))]
pub async fn remove_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path((cart_id, product_id)): Path<(CartId, ProductId)>,
    Actor(actor): Actor,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .carts
        .remove_product(cart_id, product_id, &actor)
        .await?;
    Ok(Json(cart))
}

/// POST /carts/{cart_id}/items/{product_id}/decrement — lowers a line by one.
#[tracing::instrument(skip(state, actor))]
pub async fn decrement_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path((cart_id, product_id)): Path<(CartId, ProductId)>,
    Actor(actor): Actor,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .carts
        .decrement_product(cart_id, product_id, &actor)
        .await?;
    Ok(Json(cart))
}

/// POST /carts/{cart_id}/clear — empties the cart.
#[tracing::instrument(skip(state, actor))]
pub async fn clear<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(cart_id): Path<CartId>,
    Actor(actor): Actor,
) -> Result<Json<Cart>, ApiError> {
    let cart = state.carts.clear(cart_id, &actor).await?;
    Ok(Json(cart))
}
