//! Customer and address-book endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::NewAddress;
use model::{Address, Customer, CustomerId};
use serde::Deserialize;
use store::Store;

use crate::AppState;
use crate::auth::Actor;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub email: String,
}

/// POST /customers — registers a customer.
#[tracing::instrument(skip(state, actor, req))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Actor(actor): Actor,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let customer = state
        .customers
        .create_customer(req.name, req.email, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// POST /customers/{id}/addresses — adds an address-book entry.
#[tracing::instrument(skip(state, actor, req))]
pub async fn add_address<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(customer_id): Path<CustomerId>,
    Actor(actor): Actor,
    Json(req): Json<NewAddress>,
) -> Result<(StatusCode, Json<Address>), ApiError> {
    let address = state
        .customers
        .add_address(customer_id, req, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// GET /customers/{id}/addresses
#[tracing::instrument(skip(state, actor))]
pub async fn list_addresses<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(customer_id): Path<CustomerId>,
    Actor(actor): Actor,
) -> Result<Json<Vec<Address>>, ApiError> {
    Ok(Json(
        state.customers.list_addresses(customer_id, &actor).await?,
    ))
}
